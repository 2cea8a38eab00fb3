//! Error types for wab-core

use thiserror::Error;

/// Main error type for wab-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type alias for wab-core
pub type Result<T> = std::result::Result<T, Error>;
