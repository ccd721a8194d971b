use thiserror::Error;

#[derive(Error, Debug)]
pub enum NavError {
    #[error("Hierarchy fetch failed for {key}: {message}")]
    Fetch { key: String, message: String },

    #[error("Operation not supported by this source: {0}")]
    Unsupported(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, NavError>;
