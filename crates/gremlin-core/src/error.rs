use thiserror::Error;

/// Errors raised while decoding inbound data or loading configuration.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Failed to decode request: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
