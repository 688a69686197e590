use std::fmt;
use thiserror::Error;

/// Main error type for the gatemon proxy subsystem
#[derive(Error, Debug)]
pub enum GatemonError {
    /// Descriptor string does not carry the vless:// scheme
    #[error("Invalid scheme: {uri}")]
    InvalidScheme { uri: String },

    /// Descriptor server address is empty after parsing
    #[error("Invalid address in descriptor: {uri}")]
    InvalidAddress { uri: String },

    /// Descriptor port segment is not a valid port number
    #[error("Invalid port {port:?} in descriptor")]
    InvalidPort { port: String },

    /// Engine binary missing or failed its version probe
    #[error("Proxy engine unavailable: {binary}: {message}")]
    EngineUnavailable { binary: String, message: String },

    /// Engine process exited during the startup grace period
    #[error("Proxy engine failed to start for {tag}: {detail}")]
    EngineStartFailed { tag: String, detail: String },

    /// Entry failed its liveness test and never entered service
    #[error("Proxy unreachable: {url}: {message}")]
    ProxyUnreachable { url: String, message: String },

    /// Runtime connection/timeout/proxy failure, retryable
    #[error("Transport failure via {proxy}: {message}")]
    Transport { proxy: String, message: String },

    /// Pool exhausted, no replacement proxy left
    #[error("No proxy available")]
    NoProxyAvailable,

    /// Configuration related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// File system errors (config files, cookie jar)
    #[error("File system error: {message}")]
    FileSystem { message: String },

    /// Cookie jar load/save errors
    #[error("Cookie store error: {message}")]
    Cookie { message: String },

    /// Chat notification API reported failure
    #[error("Notification error: {message}")]
    Notification { message: String },

    /// Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl GatemonError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a file system error
    pub fn file_system<S: Into<String>>(message: S) -> Self {
        Self::FileSystem {
            message: message.into(),
        }
    }

    /// Create a cookie store error
    pub fn cookie<S: Into<String>>(message: S) -> Self {
        Self::Cookie {
            message: message.into(),
        }
    }

    /// Create a transport failure
    pub fn transport<P: Into<String>, S: Into<String>>(proxy: P, message: S) -> Self {
        Self::Transport {
            proxy: proxy.into(),
            message: message.into(),
        }
    }

    /// Create a notification error
    pub fn notification<S: Into<String>>(message: S) -> Self {
        Self::Notification {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if the error is retryable. Only transport-layer failures are;
    /// parse, setup and HTTP-level errors surface to the caller immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatemonError::Transport { .. })
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            GatemonError::Config { .. } => ErrorSeverity::Critical,
            GatemonError::NoProxyAvailable => ErrorSeverity::High,
            GatemonError::FileSystem { .. } => ErrorSeverity::High,
            GatemonError::Internal { .. } => ErrorSeverity::High,
            GatemonError::EngineUnavailable { .. } => ErrorSeverity::Medium,
            GatemonError::EngineStartFailed { .. } => ErrorSeverity::Medium,
            GatemonError::Transport { .. } => ErrorSeverity::Medium,
            GatemonError::Notification { .. } => ErrorSeverity::Medium,
            GatemonError::InvalidScheme { .. } => ErrorSeverity::Low,
            GatemonError::InvalidAddress { .. } => ErrorSeverity::Low,
            GatemonError::InvalidPort { .. } => ErrorSeverity::Low,
            GatemonError::ProxyUnreachable { .. } => ErrorSeverity::Low,
            GatemonError::Cookie { .. } => ErrorSeverity::Low,
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Low => write!(f, "LOW"),
            ErrorSeverity::Medium => write!(f, "MEDIUM"),
            ErrorSeverity::High => write!(f, "HIGH"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Result type alias for gatemon operations
pub type GatemonResult<T> = Result<T, GatemonError>;

/// Convert from std::io::Error to GatemonError
impl From<std::io::Error> for GatemonError {
    fn from(err: std::io::Error) -> Self {
        GatemonError::file_system(format!("IO error: {}", err))
    }
}

/// Convert from reqwest::Error to GatemonError
impl From<reqwest::Error> for GatemonError {
    fn from(err: reqwest::Error) -> Self {
        let proxy = "-".to_string();
        if err.is_timeout() {
            GatemonError::Transport {
                proxy,
                message: format!("request timed out: {}", err),
            }
        } else if err.is_connect() {
            GatemonError::Transport {
                proxy,
                message: format!("connection error: {}", err),
            }
        } else {
            GatemonError::Transport {
                proxy,
                message: err.to_string(),
            }
        }
    }
}

/// Convert from serde_json::Error to GatemonError
impl From<serde_json::Error> for GatemonError {
    fn from(err: serde_json::Error) -> Self {
        GatemonError::internal(format!("JSON error: {}", err))
    }
}

/// Convert from toml::de::Error to GatemonError
impl From<toml::de::Error> for GatemonError {
    fn from(err: toml::de::Error) -> Self {
        GatemonError::config(format!("TOML parsing error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(GatemonError::transport("socks5://127.0.0.1:10800", "refused").is_retryable());
        assert!(!GatemonError::NoProxyAvailable.is_retryable());
        assert!(!GatemonError::InvalidScheme {
            uri: "http://x".into()
        }
        .is_retryable());
        assert!(!GatemonError::config("bad").is_retryable());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(
            GatemonError::config("x").severity() > GatemonError::transport("p", "m").severity()
        );
        assert_eq!(
            GatemonError::NoProxyAvailable.severity(),
            ErrorSeverity::High
        );
    }
}
