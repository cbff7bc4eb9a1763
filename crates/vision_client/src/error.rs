//! Error types for VisionAI API operations

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("API key required: generate one with generate_key() or set it explicitly")]
    MissingCredential,

    #[error("API key generation failed: {0}")]
    KeyGeneration(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode {endpoint} response: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VisionError {
    /// Create an API error from an HTTP status and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// True when the failure is about credentials (missing locally or rejected by the server)
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        match self {
            Self::MissingCredential => true,
            Self::Api { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }

    /// HTTP status carried by the error, if any
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, VisionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_errors() {
        assert!(VisionError::MissingCredential.is_auth_error());
        assert!(VisionError::api(401, "Invalid API key").is_auth_error());
        assert!(VisionError::api(403, "IP address not allowed").is_auth_error());
        assert!(!VisionError::api(500, "boom").is_auth_error());
        assert!(!VisionError::KeyGeneration("nope".into()).is_auth_error());
    }

    #[test]
    fn test_api_error_display() {
        let err = VisionError::api(404, "Not Found");
        assert_eq!(err.to_string(), "API error: 404 - Not Found");
        assert_eq!(err.status(), Some(404));
    }
}
