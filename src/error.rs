//! Error types for Voice Mirror
//!
//! Silence, short windows and missing voices are ordinary outcomes and never
//! show up here. Only bad configuration and failing collaborators do.

use thiserror::Error;

/// Result type alias for Voice Mirror operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Voice Mirror
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device or audio file error
    #[error("audio error: {0}")]
    Audio(String),

    /// Voice catalog error
    #[error("catalog error: {0}")]
    Catalog(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
