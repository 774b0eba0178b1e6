use axum::extract::State;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::state::AppState;
use crate::dispatch::QueueStatus;
use crate::settings::{APP_NAME, APP_VERSION, SERVICE_NAME};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootResponse {
    pub status: String,
    pub service: String,
    pub message: String,
    pub port: u16,
    pub max_tokens: u32,
    pub timestamp: String,
    #[serde(rename = "hasClaudeKey")]
    pub has_api_key: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    #[serde(rename = "hasClaudeKey")]
    pub has_api_key: bool,
    pub max_tokens: u32,
}

#[derive(Serialize, Deserialize)]
pub struct AboutResponse {
    name: String,
    version: String,
}

impl Default for AboutResponse {
    fn default() -> Self {
        Self {
            name: APP_NAME.to_string(),
            version: APP_VERSION.to_string(),
        }
    }
}

pub async fn root(State(state): State<AppState>) -> axum::Json<RootResponse> {
    debug!("Root endpoint hit");
    axum::Json(RootResponse {
        status: "ok".to_string(),
        service: SERVICE_NAME.to_string(),
        message: "Translation proxy is running".to_string(),
        port: state.info.port,
        max_tokens: state.info.max_tokens,
        timestamp: Utc::now().to_rfc3339(),
        has_api_key: state.has_api_key(),
    })
}

pub async fn health(State(state): State<AppState>) -> axum::Json<HealthResponse> {
    axum::Json(HealthResponse {
        status: "ok".to_string(),
        message: "Health check passed".to_string(),
        has_api_key: state.has_api_key(),
        max_tokens: state.info.max_tokens,
    })
}

#[instrument]
pub async fn about() -> axum::Json<AboutResponse> {
    axum::Json(AboutResponse::default())
}

#[instrument(skip(state), level = "debug")]
pub async fn queue_status(State(state): State<AppState>) -> axum::Json<QueueStatus> {
    axum::Json(state.queue.status())
}
