use std::sync::Arc;

use crate::dispatch::DispatchQueue;
use crate::settings::Settings;
use crate::translator::Translator;

/// Static facts about this instance reported by the info endpoints
#[derive(Clone, Debug)]
pub struct ServiceInfo {
    pub port: u16,
    pub max_tokens: u32,
    pub body_limit_bytes: usize,
}

/// Shared by every handler. The queue is the single dispatch queue for the process.
#[derive(Clone)]
pub struct AppState {
    pub queue: DispatchQueue<String>,
    /// None when no API key is configured
    pub translator: Option<Arc<dyn Translator>>,
    pub info: Arc<ServiceInfo>,
}

impl AppState {
    pub fn new(
        settings: &Settings,
        queue: DispatchQueue<String>,
        translator: Option<Arc<dyn Translator>>,
    ) -> Self {
        Self {
            queue,
            translator,
            info: Arc::new(ServiceInfo {
                port: settings.listen_port,
                max_tokens: settings.translator.max_tokens,
                body_limit_bytes: settings.body_limit_bytes,
            }),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.translator.is_some()
    }
}
