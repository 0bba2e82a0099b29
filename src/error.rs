//! Error handling and custom error types
//!
//! `ApiError` is the tagged result of a single provider call; `Error` covers
//! everything around it (input validation, configuration, local I/O).

use std::fmt;
use thiserror::Error;

/// Coarse classification of an [`ApiError`], used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TransportError,
    HttpError,
    ParseError,
    MissingUploadUrl,
    MissingFileUri,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::TransportError => "TransportError",
            ErrorKind::HttpError => "HttpError",
            ErrorKind::ParseError => "ParseError",
            ErrorKind::MissingUploadUrl => "MissingUploadUrl",
            ErrorKind::MissingFileUri => "MissingFileUri",
        };
        f.write_str(name)
    }
}

/// Failure of a request against the generative AI provider.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Network level failure: timeout, DNS, refused connection.
    #[error("transport error: {cause}")]
    Transport {
        #[source]
        cause: reqwest::Error,
    },

    #[error("provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("failed to parse provider response: {message}")]
    Parse { message: String, raw: String },

    #[error("upload initiation response carried no upload URL")]
    MissingUploadUrl,

    #[error("upload response carried no file URI")]
    MissingFileUri { raw: String },
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Transport { .. } => ErrorKind::TransportError,
            ApiError::Http { .. } => ErrorKind::HttpError,
            ApiError::Parse { .. } => ErrorKind::ParseError,
            ApiError::MissingUploadUrl => ErrorKind::MissingUploadUrl,
            ApiError::MissingFileUri { .. } => ErrorKind::MissingFileUri,
        }
    }

    /// Whether a caller-side retry has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Transport { .. } => true,
            ApiError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The request URL carries the API key, so it is stripped before the
    /// error can reach a log line.
    pub(crate) fn transport(cause: reqwest::Error) -> Self {
        ApiError::Transport {
            cause: cause.without_url(),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{}: {}", .0.kind(), .0)]
    Api(#[from] ApiError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_retryability() {
        let too_many = ApiError::Http {
            status: 429,
            body: String::new(),
        };
        let server = ApiError::Http {
            status: 503,
            body: String::new(),
        };
        let bad_request = ApiError::Http {
            status: 400,
            body: String::new(),
        };

        assert!(too_many.is_retryable());
        assert!(server.is_retryable());
        assert!(!bad_request.is_retryable());
        assert_eq!(bad_request.status_code(), Some(400));
    }

    #[test]
    fn test_protocol_errors_are_not_retryable() {
        assert!(!ApiError::MissingUploadUrl.is_retryable());
        assert!(!ApiError::MissingFileUri { raw: "{}".into() }.is_retryable());
        assert!(!ApiError::Parse {
            message: "eof".into(),
            raw: "<html>".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_api_error_display_includes_kind() {
        let err = Error::from(ApiError::Http {
            status: 500,
            body: "boom".to_string(),
        });
        let rendered = err.to_string();
        assert!(rendered.starts_with("HttpError"));
        assert!(rendered.contains("500"));
        assert!(rendered.contains("boom"));
    }
}
