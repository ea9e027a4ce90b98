use http::header::InvalidHeaderValue;
use std::io::Error as IoError;
use thiserror::Error;

/// Error type throughout the cookies-manager stack
///
/// None of these can happen while a request is being rewritten, they only
/// surface when loading a configuration or starting the server.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Io: {0}")]
    Io(#[from] IoError),
    /// Error from deserializing the json configuration
    #[error("Json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] InvalidHeaderValue),
}
