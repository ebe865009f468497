//! Unified error handling for the anthias-fleet crate
//!
//! Each module keeps its own error type; this module wraps them in a single
//! [`Error`] for code that crosses module boundaries (the CLI, the status
//! server) and classifies them for handling.
//!
//! # Architecture
//!
//! - [`FleetErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use anthias_fleet::error::{Error, FleetErrorTrait};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         println!("Will retry on next cycle: {}", err.user_message());
//!     } else {
//!         eprintln!("Fatal error: {}", err);
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

// Re-export domain-specific errors for convenience
pub use crate::actions::ActionError;
pub use crate::client::{ApiError, CommunicationError};
pub use crate::poller::RefreshError;

/// Common trait for all anthias-fleet error types
pub trait FleetErrorTrait: std::error::Error {
    /// Whether retrying later can succeed without operator action
    fn is_recoverable(&self) -> bool;

    /// Short description for user-facing messages
    fn user_message(&self) -> String;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Credentials rejected; needs re-authorization
    Authentication,
    /// Transport, timeout or HTTP status errors
    Network,
    /// Configuration errors
    Config,
    /// Rejected command arguments
    Validation,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Network => "network",
            Self::Config => "config",
            Self::Validation => "validation",
            Self::Other => "other",
        }
    }
}

// ============================================================================
// Domain error classification
// ============================================================================

impl FleetErrorTrait for ApiError {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Authentication { .. } => false,
            Self::Communication(CommunicationError::InvalidUrl(_)) => false,
            Self::Communication(_) => true,
        }
    }

    fn user_message(&self) -> String {
        match self {
            Self::Authentication { message, .. } => message.clone(),
            Self::Communication(CommunicationError::Timeout) => {
                "Fleet Manager did not respond in time".to_string()
            }
            Self::Communication(CommunicationError::Status { status, .. }) => {
                format!("Fleet Manager returned HTTP {status}")
            }
            Self::Communication(CommunicationError::Transport(_)) => {
                "Cannot connect to Fleet Manager".to_string()
            }
            Self::Communication(CommunicationError::Decode(_)) => {
                "Unexpected response from Fleet Manager".to_string()
            }
            Self::Communication(CommunicationError::InvalidUrl(url)) => {
                format!("Invalid Fleet Manager URL: {url}")
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication { .. } => ErrorCategory::Authentication,
            Self::Communication(CommunicationError::InvalidUrl(_)) => ErrorCategory::Config,
            Self::Communication(_) => ErrorCategory::Network,
        }
    }
}

impl FleetErrorTrait for RefreshError {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::AuthFailed(_) | Self::Stopped => false,
            Self::UpdateFailed(e) => e.is_recoverable(),
        }
    }

    fn user_message(&self) -> String {
        match self {
            Self::AuthFailed(e) | Self::UpdateFailed(e) => e.user_message(),
            Self::Stopped => "Polling has stopped".to_string(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::AuthFailed(_) => ErrorCategory::Authentication,
            Self::UpdateFailed(e) => e.category(),
            Self::Stopped => ErrorCategory::Other,
        }
    }
}

impl FleetErrorTrait for ActionError {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Api(e) => e.is_recoverable(),
            Self::Invalid { .. } | Self::UnknownFleet(_) => false,
        }
    }

    fn user_message(&self) -> String {
        match self {
            Self::Api(e) => e.user_message(),
            other => other.to_string(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Api(e) => e.category(),
            Self::Invalid { .. } => ErrorCategory::Validation,
            Self::UnknownFleet(_) => ErrorCategory::Config,
        }
    }
}

// ============================================================================
// Unified Error
// ============================================================================

/// Unified error type for the anthias-fleet crate
#[derive(Error, Debug)]
pub enum Error {
    /// Fleet Manager API errors
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Refresh cycle errors
    #[error(transparent)]
    Refresh(#[from] RefreshError),

    /// Command errors
    #[error(transparent)]
    Action(#[from] ActionError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl FleetErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Api(e) => e.is_recoverable(),
            Self::Refresh(e) => e.is_recoverable(),
            Self::Action(e) => e.is_recoverable(),
            Self::Io(_) => true,
            Self::Json(_) => false,
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }

    fn user_message(&self) -> String {
        match self {
            Self::Api(e) => e.user_message(),
            Self::Refresh(e) => e.user_message(),
            Self::Action(e) => e.user_message(),
            Self::Io(e) => format!("I/O error: {e}"),
            Self::Json(e) => format!("Invalid JSON: {e}"),
            Self::Config(msg) => format!("Configuration error: {msg}"),
            Self::Other { context, .. } => context.clone(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Api(e) => e.category(),
            Self::Refresh(e) => e.category(),
            Self::Action(e) => e.category(),
            Self::Io(_) => ErrorCategory::Other,
            Self::Json(_) => ErrorCategory::Validation,
            Self::Config(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// The Fleet Manager error underneath, if any
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(e) => Some(e),
            Self::Refresh(RefreshError::AuthFailed(e) | RefreshError::UpdateFailed(e)) => Some(e),
            Self::Action(ActionError::Api(e)) => Some(e),
            _ => None,
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: format!("{err:#}"),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
