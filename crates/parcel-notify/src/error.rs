//! Run-level error type (parcel-notify)

use std::fmt;

use pn_graph::GraphError;
use pn_whatsapp::WhatsAppError;

/// Every way a run can stop early.
///
/// Each kind maps to a fixed process exit code (sysexits values).
#[derive(Debug)]
pub enum JobError {
    /// Missing or invalid configuration
    Config(String),
    /// Token exchange rejected by the identity provider
    Auth(String),
    /// Folder segment or CSV attachment absent
    NotFound(String),
    /// No qualifying report message today
    NoMatch(String),
    /// Non-success HTTP status or transport failure
    Network(String),
    /// Local file read/write failure
    Io(String),
    /// Downloaded report unreadable as a whole
    Records(String),
}

impl JobError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 78,
            Self::Auth(_) => 77,
            Self::NotFound(_) => 66,
            Self::NoMatch(_) => 65,
            Self::Network(_) => 69,
            Self::Io(_) => 74,
            Self::Records(_) => 65,
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "Configuration error: {}", e),
            Self::Auth(e) => write!(f, "Authentication error: {}", e),
            Self::NotFound(e) => write!(f, "Not found: {}", e),
            Self::NoMatch(e) => write!(f, "No matching message: {}", e),
            Self::Network(e) => write!(f, "Network error: {}", e),
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Records(e) => write!(f, "Record error: {}", e),
        }
    }
}

impl std::error::Error for JobError {}

impl From<GraphError> for JobError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::Auth(detail) => Self::Auth(detail),
            GraphError::NotFound(what) => Self::NotFound(what),
            GraphError::Api { .. } | GraphError::Http(_) | GraphError::Json(_) => {
                Self::Network(e.to_string())
            }
            GraphError::TokenStore(_) | GraphError::Io(_) => Self::Io(e.to_string()),
        }
    }
}

impl From<pn_core::Error> for JobError {
    fn from(e: pn_core::Error) -> Self {
        match e {
            pn_core::Error::Config(_)
            | pn_core::Error::MissingConfig(_)
            | pn_core::Error::Toml(_) => Self::Config(e.to_string()),
            pn_core::Error::Csv(_) | pn_core::Error::Io(_) => Self::Records(e.to_string()),
        }
    }
}

impl From<WhatsAppError> for JobError {
    fn from(e: WhatsAppError) -> Self {
        Self::Network(e.to_string())
    }
}

/// Result 型エイリアス
pub type Result<T> = std::result::Result<T, JobError>;
