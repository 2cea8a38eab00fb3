//! Error types for wab-whatsapp

use thiserror::Error;

/// Fulfillment entries that cannot be turned into outbound parts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    #[error("Fulfillment message {index} has an empty text list")]
    EmptyText { index: usize },

    #[error("Fulfillment message {index} has a malformed payload: {reason}")]
    MalformedPayload { index: usize, reason: String },
}

/// wab-whatsapp error type
#[derive(Error, Debug)]
pub enum WhatsAppError {
    #[error("No message received")]
    MissingBody,

    #[error("No sender in webhook payload")]
    MissingSender,

    #[error("Webhook signature verification failed")]
    SignatureVerificationFailed,

    #[error("Dialogflow error: {0}")]
    Dialogflow(#[from] wab_dialogflow::DialogflowError),

    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error("TwiML rendering failed: {0}")]
    Render(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, WhatsAppError>;
