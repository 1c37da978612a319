//! Error types for pn-whatsapp

use thiserror::Error;

/// pn-whatsapp error type
///
/// Only surfaces while building the client or inside a single send; the
/// [`pn_core::Notifier`] implementation folds it into `SendStatus::Failed`.
#[derive(Error, Debug)]
pub enum WhatsAppError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Invalid response body: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for WhatsAppError {
    fn from(err: reqwest::Error) -> Self {
        WhatsAppError::Http(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, WhatsAppError>;
