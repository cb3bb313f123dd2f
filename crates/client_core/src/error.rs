use shared::error::ApiError;
use thiserror::Error;

/// Why a single page fetch did not produce items. Every variant is terminal
/// for the attempt; nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network failure: {0}")]
    Network(String),
    #[error(transparent)]
    Rejected(#[from] ApiError),
}

impl FetchError {
    pub(crate) fn network<E: std::fmt::Display>(err: E) -> Self {
        Self::Network(err.to_string())
    }

    /// Text shown to the shopper, e.g. "Error loading products" for transport failures.
    pub fn user_message(&self, noun: &str) -> String {
        match self {
            FetchError::Network(_) => format!("Error loading {noun}"),
            FetchError::Rejected(err) => err.message.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid api url '{url}': {reason}")]
    InvalidApiUrl { url: String, reason: String },
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
    #[error("failed to build http client: {0}")]
    HttpClient(String),
}
