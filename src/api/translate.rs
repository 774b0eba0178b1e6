use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{debug, event, instrument, Level};

use super::state::AppState;

fn plain_text(body: impl Into<Bytes>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body.into(),
    )
        .into_response()
}

/// Translate a plaintext body.
///
/// Always answers 200: on any failure the caller gets its own bytes back.
#[instrument(skip_all, fields(bytes = body.len()))]
pub async fn translate(State(state): State<AppState>, body: Bytes) -> Response {
    let text = match std::str::from_utf8(&body) {
        Ok(text) => text.to_string(),
        Err(err) => {
            event!(
                Level::WARN,
                message = "Body is not valid UTF-8, returning it unchanged",
                err = %err
            );
            return plain_text(body);
        }
    };

    if text.trim().is_empty() {
        debug!("Empty text received, returning as-is");
        return plain_text(body);
    }

    let Some(translator) = state.translator.clone() else {
        event!(
            Level::WARN,
            message = "No API key configured, returning original text"
        );
        return plain_text(body);
    };

    let submission = state
        .queue
        .submit(move || async move { translator.translate(&text).await });
    debug!(
        "Queued translation ({} pending)",
        state.queue.status().queue_length
    );

    match submission.await {
        Ok(translated) => plain_text(translated),
        Err(err) => {
            event!(
                Level::WARN,
                message = "Translation failed, falling back to original text",
                err = %err,
                err_type = err.error_type(),
                upstream_status = ?err.upstream_status()
            );
            plain_text(body)
        }
    }
}
