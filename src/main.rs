use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use translation_proxy::api;
use translation_proxy::cli;
use translation_proxy::dispatch::DispatchQueue;
use translation_proxy::translator::{AnthropicTranslator, Translator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "translation_proxy=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse args and env vars
    let settings = cli::Cli::parse().into_settings()?;
    let socket_address = settings.socket_address();

    let translator: Option<Arc<dyn Translator>> = if settings.translator.has_api_key() {
        Some(Arc::new(AnthropicTranslator::new(settings.translator.clone())?))
    } else {
        warn!("No API key configured, every request will return its original text");
        None
    };

    // One queue for the whole process, shared by every handler
    let queue: DispatchQueue<String> = DispatchQueue::start(settings.dispatch.clone());
    let api = api::api(api::AppState::new(&settings, queue.clone(), translator));

    info!(
        "Starting translation proxy on {} (max tokens {})",
        socket_address, settings.translator.max_tokens
    );
    axum::Server::bind(&socket_address)
        .serve(api.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    queue.shutdown();
    info!("Process terminated");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, shutting down gracefully");
}
