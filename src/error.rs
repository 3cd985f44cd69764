use crate::provider::Provider;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{provider} API key is not configured")]
    MissingApiKey { provider: Provider },

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("message is empty")]
    EmptyMessage,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: Provider,
        status: u16,
        message: String,
    },

    #[error("{provider} returned a response without content")]
    EmptyResponse { provider: Provider },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("memory storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
