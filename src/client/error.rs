//! Error types for the Fleet Manager transport client

use std::sync::Arc;

use thiserror::Error;

/// Result type for Fleet Manager API calls
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by every Fleet Manager call
///
/// The split matters to callers: an [`ApiError::Authentication`] cannot be
/// fixed by retrying and needs new credentials, while an
/// [`ApiError::Communication`] may be transient.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    /// Credentials rejected (HTTP 401/403, or 400 on token exchange)
    #[error("Authentication failed: {message}")]
    Authentication {
        message: String,
        status: Option<u16>,
    },

    /// Any other transport or HTTP failure
    #[error("Error communicating with Fleet Manager: {0}")]
    Communication(#[from] CommunicationError),
}

/// Underlying cause of a communication failure
#[derive(Error, Debug, Clone)]
pub enum CommunicationError {
    /// Request exceeded its timeout
    #[error("request timed out")]
    Timeout,

    /// Non-2xx status other than 401/403
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection-level failure
    #[error("transport error: {0}")]
    Transport(#[source] Arc<reqwest::Error>),

    /// Response body could not be decoded
    #[error("invalid response body: {0}")]
    Decode(String),

    /// Base URL or path could not be turned into a request URL
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl CommunicationError {
    pub fn transport(err: reqwest::Error) -> Self {
        Self::Transport(Arc::new(err))
    }
}

impl ApiError {
    /// Create an authentication error without a status code
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
            status: None,
        }
    }

    /// Create an authentication error for an HTTP status
    pub fn auth_status(status: u16) -> Self {
        let message = match status {
            401 => "Invalid or expired token",
            403 => "Permission denied",
            _ => "Invalid credentials",
        };
        Self::Authentication {
            message: message.to_string(),
            status: Some(status),
        }
    }

    /// Create a decode error
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Communication(CommunicationError::Decode(reason.into()))
    }

    /// Whether the error requires new credentials
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Whether the error was a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Communication(CommunicationError::Timeout))
    }

    /// HTTP status associated with the failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } => *status,
            Self::Communication(CommunicationError::Status { status, .. }) => Some(*status),
            Self::Communication(_) => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Communication(CommunicationError::Timeout)
        } else if err.is_decode() {
            Self::Communication(CommunicationError::Decode(err.to_string()))
        } else {
            Self::Communication(CommunicationError::transport(err))
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Communication(CommunicationError::Decode(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_status_messages() {
        let err = ApiError::auth_status(401);
        assert!(err.is_auth());
        assert_eq!(err.status(), Some(401));
        assert!(err.to_string().contains("Invalid or expired token"));

        let err = ApiError::auth_status(403);
        assert!(err.to_string().contains("Permission denied"));
    }

    #[test]
    fn test_communication_error_display() {
        let err: ApiError = CommunicationError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        }
        .into();

        assert!(!err.is_auth());
        assert_eq!(err.status(), Some(502));
        assert!(err.to_string().contains("502"));
        assert!(err.to_string().contains("bad gateway"));
    }

    #[test]
    fn test_timeout_detection() {
        let err = ApiError::Communication(CommunicationError::Timeout);
        assert!(err.is_timeout());
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_json_error_maps_to_decode() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: ApiError = json_err.into();
        assert!(matches!(
            err,
            ApiError::Communication(CommunicationError::Decode(_))
        ));
    }
}
