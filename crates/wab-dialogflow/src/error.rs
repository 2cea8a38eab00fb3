//! Error types for wab-dialogflow

use thiserror::Error;

/// wab-dialogflow error type
#[derive(Error, Debug)]
pub enum DialogflowError {
    #[error("Invalid service account credentials: {0}")]
    Credentials(String),

    #[error("Token exchange failed: {0}")]
    Auth(String),

    #[error("Invalid endpoint: {0}")]
    Endpoint(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Dialogflow API error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("Invalid Dialogflow response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for DialogflowError {
    fn from(err: reqwest::Error) -> Self {
        DialogflowError::Http(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, DialogflowError>;
