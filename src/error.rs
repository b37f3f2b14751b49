//! Error types for anki-voice

use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single AnkiConnect request.
///
/// Every variant is logged once by the gateway and then handed back to the
/// caller, which leaves its own state untouched.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Peer answered with a non-2xx status
    #[error("request returned non-success status code of: {0}")]
    Transport(u16),

    /// Peer answered, but `result` was null or false
    #[error("AnkiConnect returned failure status: {0}")]
    Application(String),

    /// Malformed body, refused connection, timeout, ...
    #[error("{0}")]
    Unknown(String),
}

/// Fatal startup configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed command configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed settings file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("missing the command (key): {0}")]
    MissingCommand(&'static str),

    #[error("phrase {phrase:?} is configured for both {first} and {second}")]
    DuplicatePhrase {
        phrase: String,
        first: &'static str,
        second: &'static str,
    },

    #[error("empty phrase configured for {0}")]
    EmptyPhrase(&'static str),

    #[error("unsupported audio input: {0}")]
    InvalidAudio(String),
}
