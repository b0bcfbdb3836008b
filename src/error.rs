//! Error types for tutorchat

use thiserror::Error;

/// Startup problems. Fatal: no session is created while one of these stands.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("No API key configured for provider '{provider}'. Set {env_var} or add it to {config_hint}.")]
    MissingApiKey {
        provider: String,
        env_var: &'static str,
        config_hint: String,
    },

    #[error("Unknown model provider '{0}' (expected google or openai)")]
    UnknownProvider(String),

    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// A failed model call, with a coarse classification
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct ModelError {
    pub kind: ModelErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelErrorKind {
    /// Connection failures and timeouts
    Network,
    /// 401 / 403
    Auth,
    /// 429, quota exhausted
    RateLimit,
    /// 5xx
    Server,
    /// Other 4xx
    InvalidRequest,
    /// 2xx with a body we could not use
    MalformedResponse,
}

impl std::fmt::Display for ModelErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ModelErrorKind::Network => "network error",
            ModelErrorKind::Auth => "authentication failed",
            ModelErrorKind::RateLimit => "rate limited",
            ModelErrorKind::Server => "provider error",
            ModelErrorKind::InvalidRequest => "invalid request",
            ModelErrorKind::MalformedResponse => "malformed response",
        };
        f.write_str(label)
    }
}

impl ModelError {
    pub fn new(kind: ModelErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ModelErrorKind::Network, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ModelErrorKind::MalformedResponse, message)
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => ModelErrorKind::Auth,
            429 => ModelErrorKind::RateLimit,
            500..=599 => ModelErrorKind::Server,
            _ => ModelErrorKind::InvalidRequest,
        };
        Self::new(kind, message)
    }

    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network(format!("request timed out: {}", err))
        } else if err.is_connect() {
            Self::network(format!("connection failed: {}", err))
        } else if err.is_decode() {
            Self::malformed(err.to_string())
        } else {
            Self::network(err.to_string())
        }
    }
}
