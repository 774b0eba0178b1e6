//! CLI for this application
//!
use std::net::IpAddr;
use std::time::Duration;

use url::Url;

use crate::config_error;
use crate::error::Result;
use crate::settings;

#[derive(Clone, Debug, clap::Parser)]
#[command(name = settings::APP_NAME, version = settings::APP_VERSION)]
pub struct Cli {
    // Server listen address
    #[clap(
        long,
        default_value = "0.0.0.0",
        env("PROXY_LISTEN_ADDRESS"),
        help = "IP Address to listen on"
    )]
    pub listen_address: String,

    // HTTP API listen port
    #[clap(
        long,
        default_value = settings::DEFAULT_PORT_HTTP,
        env("PROXY_LISTEN_PORT"),
        help = "Port to bind the HTTP API server to"
    )]
    pub listen_port: u16,

    // Upstream credentials: without a key every request falls back to the original text
    #[clap(
        long,
        env("CLAUDE_API_KEY"),
        hide_env_values = true,
        help = "API key for the upstream translation API"
    )]
    pub api_key: Option<String>,

    #[clap(
        long,
        default_value = settings::DEFAULT_API_URL,
        env("PROXY_API_URL"),
        help = "Upstream messages endpoint"
    )]
    pub api_url: Url,

    #[clap(
        long,
        default_value = settings::DEFAULT_MODEL,
        env("PROXY_MODEL"),
        help = "Model requested from the upstream API"
    )]
    pub model: String,

    #[clap(
        long,
        default_value = settings::DEFAULT_MAX_TOKENS,
        env("PROXY_MAX_TOKENS"),
        help = "Max output tokens per translation"
    )]
    pub max_tokens: u32,

    #[clap(
        long,
        default_value = "60",
        env("PROXY_UPSTREAM_TIMEOUT_SECONDS"),
        help = "Timeout for a single upstream call"
    )]
    pub upstream_timeout_seconds: u64,

    // Rate limit settings: max dispatches (over window)
    #[clap(
        long,
        default_value = "4",
        env("PROXY_MAX_PER_WINDOW"),
        help = "Max upstream calls started per window"
    )]
    pub max_per_window: usize,

    // Rate limit settings: trailing window in seconds
    #[clap(
        long,
        default_value = "60",
        env("PROXY_WINDOW_SECONDS"),
        help = "Length of the trailing rate window in seconds"
    )]
    pub window_seconds: u64,

    #[clap(
        long,
        default_value = "1000",
        env("PROXY_SAFETY_MARGIN_MS"),
        help = "Extra milliseconds added to every rate-limit wait"
    )]
    pub safety_margin_ms: u64,

    #[clap(
        long,
        default_value = "2000",
        env("PROXY_DISPATCH_DELAY_MS"),
        help = "Pause in milliseconds after each upstream call"
    )]
    pub dispatch_delay_ms: u64,

    #[clap(
        long,
        default_value = "0",
        env("PROXY_MAX_PENDING"),
        help = "Max queued translations (0 = unbounded)"
    )]
    pub max_pending: usize,

    #[clap(
        long,
        default_value = "1048576",
        env("PROXY_BODY_LIMIT_BYTES"),
        help = "Max request body accepted by /translate"
    )]
    pub body_limit_bytes: usize,
}

impl Cli {
    pub fn into_settings(self) -> Result<settings::Settings> {
        let listen_address: IpAddr = self.listen_address.parse()?;
        if self.max_tokens == 0 {
            return Err(config_error!("max-tokens must be at least 1"));
        }
        let dispatch = settings::DispatchSettings {
            max_per_window: self.max_per_window,
            window: Duration::from_secs(self.window_seconds),
            safety_margin: Duration::from_millis(self.safety_margin_ms),
            dispatch_delay: Duration::from_millis(self.dispatch_delay_ms),
            max_pending: self.max_pending,
        };
        dispatch.validate()?;

        Ok(settings::Settings {
            listen_address,
            listen_port: self.listen_port,
            body_limit_bytes: self.body_limit_bytes,
            translator: settings::TranslatorSettings {
                api_url: self.api_url,
                api_key: self.api_key,
                model: self.model,
                max_tokens: self.max_tokens,
                timeout: Duration::from_secs(self.upstream_timeout_seconds),
            },
            dispatch,
        })
    }
}
