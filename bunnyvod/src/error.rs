//! Error types for a single download attempt.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Could not find {0} in the embed page")]
    Extraction(&'static str),

    #[error("No video qualities found in the playlist")]
    ManifestEmpty,

    #[error("{stage} request returned HTTP {status}")]
    Status { stage: &'static str, status: u16 },

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    #[error("Download failed: {0}")]
    Fetch(String),

    #[error("Download cancelled by user.")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Cancelled => 0,
            Error::ManifestEmpty => 2,
            _ => 1,
        }
    }
}

/// Rejected quality selection. Never fatal, the prompt just asks again.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidChoice {
    #[error("Please enter a valid number.")]
    NotANumber,

    #[error("Invalid choice. Please select a number from the list.")]
    OutOfRange,
}

pub type Result<T> = std::result::Result<T, Error>;
