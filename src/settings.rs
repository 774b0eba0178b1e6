//! Translation proxy application settings
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use url::Url;

use crate::config_error;
use crate::error::Result;

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Reported by the root endpoint; health checks key on it
pub const SERVICE_NAME: &str = "ego-translation-proxy-enhanced";

pub const STANDARD_PORT_HTTP: u16 = 3000;
pub const DEFAULT_PORT_HTTP: &str = "3000";

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_MAX_TOKENS: &str = "8000";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub const MAX_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);
pub const MAX_PAUSE: Duration = Duration::from_secs(60 * 60);

/// Admission-control settings for the dispatch queue
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Max dispatch starts in any trailing window
    pub max_per_window: usize,
    /// Length of the trailing window
    pub window: Duration,
    /// Added to every computed back-pressure wait
    pub safety_margin: Duration,
    /// Fixed pause after each dispatch completes
    pub dispatch_delay: Duration,
    /// 0 means unbounded
    pub max_pending: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            max_per_window: 4,
            window: Duration::from_secs(60),
            safety_margin: Duration::from_millis(1000),
            dispatch_delay: Duration::from_millis(2000),
            max_pending: 0,
        }
    }
}

impl DispatchSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_per_window == 0 {
            return Err(config_error!("max-per-window must be at least 1"));
        }
        if self.window.is_zero() {
            return Err(config_error!("window must be longer than zero"));
        }
        if self.window > MAX_WINDOW {
            return Err(config_error!("window must not exceed {:?}", MAX_WINDOW));
        }
        if self.safety_margin > MAX_PAUSE || self.dispatch_delay > MAX_PAUSE {
            return Err(config_error!(
                "safety margin and dispatch delay must not exceed {:?}",
                MAX_PAUSE
            ));
        }
        Ok(())
    }
}

/// Upstream translation API settings
#[derive(Clone, Debug)]
pub struct TranslatorSettings {
    pub api_url: Url,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl TranslatorSettings {
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    // Server listen address
    pub listen_address: IpAddr,

    // HTTP API listen port
    pub listen_port: u16,

    // Max accepted body on the translate endpoint
    pub body_limit_bytes: usize,

    pub translator: TranslatorSettings,

    pub dispatch: DispatchSettings,
}

impl Settings {
    pub fn socket_address(&self) -> SocketAddr {
        SocketAddr::from((self.listen_address, self.listen_port))
    }
}
