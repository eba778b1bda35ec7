//! Error types for the reader core

use crate::model::VerseKey;
use slowcore::storage::StorageError;
use thiserror::Error;

/// Failure talking to the content API.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status} for {url}")]
    Status { status: u16, url: String },
}

impl ApiError {
    /// A short sentence suitable for a status bar.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Http(e) if e.is_connect() || e.is_request() => {
                "Connection error. Please check your internet connection and try again.".into()
            }
            ApiError::Http(e) if e.is_timeout() => {
                "The request timed out. The server might be slow right now.".into()
            }
            ApiError::Http(e) if e.is_decode() => {
                "Received an unexpected response format from the server.".into()
            }
            ApiError::Http(_) => "A network error occurred. Please try again later.".into(),
            ApiError::Status { status, .. } => format!("The server answered with status {status}."),
        }
    }
}

/// Failure reading or writing the persistent cache.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("cache payload error: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

impl From<std::io::Error> for CacheError {
    fn from(e: std::io::Error) -> Self {
        CacheError::Storage(StorageError::Io(e))
    }
}

/// Failure loading or starting verse audio.
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("verse {0} has no recitation")]
    MissingAudio(VerseKey),
    #[error("audio download failed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("audio decode failed: {0}")]
    Decode(String),
    #[error("audio output unavailable: {0}")]
    Output(String),
}
