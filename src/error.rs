use std::fmt;

use reqwest::StatusCode;

/// Main error type for the translation proxy
#[derive(Debug)]
pub enum ProxyError {
    /// Configuration or CLI argument errors
    Config(String),

    /// The upstream translation API failed or answered with a non-2xx status
    Upstream {
        status: Option<u16>,
        message: String,
    },

    /// A queued operation failed without an upstream status (panic, malformed response)
    Operation(String),

    /// The pending queue reached its configured bound
    QueueFull(usize),

    /// The dispatch loop has shut down
    DispatcherClosed,

    /// The upstream answered 2xx with a body we could not decode
    Serialization(serde_json::Error),
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ProxyError::Upstream {
                status: Some(status),
                message,
            } => write!(f, "Upstream error ({}): {}", status, message),
            ProxyError::Upstream {
                status: None,
                message,
            } => write!(f, "Upstream error: {}", message),
            ProxyError::Operation(msg) => write!(f, "Operation failed: {}", msg),
            ProxyError::QueueFull(bound) => {
                write!(f, "Dispatch queue is full ({} pending)", bound)
            }
            ProxyError::DispatcherClosed => write!(f, "Dispatch queue is closed"),
            ProxyError::Serialization(err) => write!(f, "Serialization error: {}", err),
        }
    }
}

impl std::error::Error for ProxyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProxyError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

// Convenient type alias for Results using our error type
pub type Result<T> = std::result::Result<T, ProxyError>;

impl ProxyError {
    /// Get the error type identifier
    pub fn error_type(&self) -> &'static str {
        match self {
            ProxyError::Config(_) => "configuration_error",
            ProxyError::Upstream { .. } => "upstream_error",
            ProxyError::Operation(_) => "operation_error",
            ProxyError::QueueFull(_) => "queue_full",
            ProxyError::DispatcherClosed => "dispatcher_closed",
            ProxyError::Serialization(_) => "serialization_error",
        }
    }

    /// Upstream status code, if the failure carried one
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            ProxyError::Upstream { status, .. } => *status,
            _ => None,
        }
    }

    /// True when the upstream API answered 429.
    /// The dispatch queue does not act on this; it is surfaced for logging.
    pub fn is_upstream_rate_limited(&self) -> bool {
        self.upstream_status() == Some(StatusCode::TOO_MANY_REQUESTS.as_u16())
    }
}

// Conversions from common error types
impl From<serde_json::Error> for ProxyError {
    fn from(err: serde_json::Error) -> Self {
        ProxyError::Serialization(err)
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        ProxyError::Upstream {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl From<std::net::AddrParseError> for ProxyError {
    fn from(err: std::net::AddrParseError) -> Self {
        ProxyError::Config(format!("Invalid ip address: {}", err))
    }
}

// Helper macros for common error construction patterns
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::ProxyError::Config($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::ProxyError::Config(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! operation_error {
    ($msg:expr) => {
        $crate::error::ProxyError::Operation($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::ProxyError::Operation(format!($fmt, $($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let config_err = ProxyError::Config("Invalid port".to_string());
        assert_eq!(config_err.to_string(), "Configuration error: Invalid port");

        let upstream = ProxyError::Upstream {
            status: Some(529),
            message: "overloaded".to_string(),
        };
        assert_eq!(upstream.to_string(), "Upstream error (529): overloaded");

        let bad_json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ProxyError = bad_json.into();
        assert!(err.to_string().starts_with("Serialization error"));
        assert_eq!(err.error_type(), "serialization_error");
    }

    #[test]
    fn test_error_conversion() {
        let addr_err = "not-an-ip".parse::<std::net::IpAddr>().unwrap_err();
        let proxy_err: ProxyError = addr_err.into();
        assert!(matches!(proxy_err, ProxyError::Config(_)));
    }

    #[test]
    fn test_upstream_rate_limited() {
        let err = ProxyError::Upstream {
            status: Some(429),
            message: "slow down".to_string(),
        };
        assert!(err.is_upstream_rate_limited());
        assert_eq!(err.upstream_status(), Some(429));

        let err = ProxyError::Upstream {
            status: None,
            message: "connection reset".to_string(),
        };
        assert!(!err.is_upstream_rate_limited());
        assert!(!ProxyError::DispatcherClosed.is_upstream_rate_limited());
    }

    #[test]
    fn test_macros() {
        let err = config_error!("Port {} is invalid", 65536);
        assert_eq!(
            err.to_string(),
            "Configuration error: Port 65536 is invalid"
        );

        let err = operation_error!("operation panicked");
        assert_eq!(err.to_string(), "Operation failed: operation panicked");
        assert_eq!(err.error_type(), "operation_error");
    }
}
