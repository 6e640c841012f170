//! Error handling.

use std::error::Error as StdError;

use anyhow::Error as AnyError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use displaydoc::Display;
use serde::Serialize;

use hatch::error::HatchError;

pub type ServerResult<T> = Result<T, ServerError>;

/// An error.
#[derive(Debug, Display)]
pub enum ServerError {
    // Generic responses
    /// The URL you requested was not found.
    NotFound,

    /// Unauthorized.
    Unauthorized,

    /// You are not allowed to upload files.
    Forbidden,

    /// The server encountered an internal error or misconfiguration.
    InternalServerError,

    /// The request body is too large.
    PayloadTooLarge,

    // Specialized responses
    /// The requested upload does not exist.
    NoSuchUpload,

    /// Unsupported file type "{mime}".
    UnsupportedFileType { mime: String },

    /// Asset "{name}" is too large ({size} bytes).
    AssetTooLarge { name: String, size: u64 },

    /// Database error: {0}
    DatabaseError(AnyError),

    /// Storage error: {0}
    StorageError(AnyError),

    /// Scratch I/O error: {0}
    ScratchIoError(AnyError),

    /// Asset probe error: {0}
    AssetProbeError(AnyError),

    /// General request error: {0}
    RequestError(AnyError),

    /// Error from the common components.
    HatchError(HatchError),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    code: u16,
    error: String,
    message: String,
}

impl ServerError {
    pub fn database_error(error: impl StdError + Send + Sync + 'static) -> Self {
        Self::DatabaseError(AnyError::new(error))
    }

    pub fn storage_error(error: impl StdError + Send + Sync + 'static) -> Self {
        Self::StorageError(AnyError::new(error))
    }

    pub fn scratch_error(error: impl StdError + Send + Sync + 'static) -> Self {
        Self::ScratchIoError(AnyError::new(error))
    }

    pub fn request_error(error: impl StdError + Send + Sync + 'static) -> Self {
        Self::RequestError(AnyError::new(error))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::InternalServerError => "InternalServerError",
            Self::PayloadTooLarge => "PayloadTooLarge",

            Self::NoSuchUpload => "NoSuchUpload",
            Self::UnsupportedFileType { .. } => "UnsupportedFileType",
            Self::AssetTooLarge { .. } => "AssetTooLarge",
            Self::HatchError(e) => e.name(),
            Self::DatabaseError(_) => "DatabaseError",
            Self::StorageError(_) => "StorageError",
            Self::ScratchIoError(_) => "ScratchIoError",
            Self::AssetProbeError(_) => "AssetProbeError",
            Self::RequestError(_) => "RequestError",
        }
    }

    /// Returns whether this error was caused by the server rather than the client.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::InternalServerError
                | Self::DatabaseError(_)
                | Self::StorageError(_)
                | Self::ScratchIoError(_)
                | Self::AssetProbeError(_)
        )
    }

    /// Returns a version of this error for clients.
    fn into_clients(self) -> Self {
        match self {
            Self::DatabaseError(_) => Self::InternalServerError,
            Self::StorageError(_) => Self::InternalServerError,
            Self::ScratchIoError(_) => Self::InternalServerError,
            Self::AssetProbeError(_) => Self::InternalServerError,
            Self::HatchError(HatchError::IoError { .. }) => Self::InternalServerError,

            _ => self,
        }
    }

    fn http_status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,

            Self::NoSuchUpload => StatusCode::NOT_FOUND,
            Self::UnsupportedFileType { .. } => StatusCode::BAD_REQUEST,
            Self::AssetTooLarge { .. } => StatusCode::BAD_REQUEST,
            Self::RequestError(_) => StatusCode::BAD_REQUEST,
            Self::HatchError(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl StdError for ServerError {}

impl From<HatchError> for ServerError {
    fn from(error: HatchError) -> Self {
        Self::HatchError(error)
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if self.is_internal() || matches!(self, Self::HatchError(HatchError::IoError { .. })) {
            tracing::error!("{:?}", self);
        }

        let sanitized = self.into_clients();

        let status_code = sanitized.http_status_code();
        let error_response = ErrorResponse {
            code: status_code.as_u16(),
            message: sanitized.to_string(),
            error: sanitized.name().to_string(),
        };

        (status_code, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use anyhow::anyhow;

    #[test]
    fn test_status_codes() {
        assert_eq!(StatusCode::NOT_FOUND, ServerError::NoSuchUpload.http_status_code());
        assert_eq!(StatusCode::FORBIDDEN, ServerError::Forbidden.http_status_code());
        assert_eq!(
            StatusCode::BAD_REQUEST,
            ServerError::AssetTooLarge {
                name: "a.png".to_string(),
                size: 15_000_001,
            }
            .http_status_code()
        );
        assert_eq!(
            StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::PayloadTooLarge.http_status_code()
        );
    }

    #[test]
    fn test_infrastructure_errors_are_sanitized() {
        let storage = ServerError::StorageError(anyhow!("bucket secret-bucket not found"));
        let sanitized = storage.into_clients();

        assert!(matches!(sanitized, ServerError::InternalServerError));
        assert!(!sanitized.to_string().contains("secret-bucket"));

        let scratch = ServerError::ScratchIoError(anyhow!("/tmp/x: no space left"));
        assert!(matches!(
            scratch.into_clients(),
            ServerError::InternalServerError
        ));
    }

    #[test]
    fn test_asset_too_large_names_entry() {
        let e = ServerError::AssetTooLarge {
            name: "sprite1.png".to_string(),
            size: 15_000_001,
        };

        assert_eq!("AssetTooLarge", e.name());
        assert!(e.to_string().contains("sprite1.png"));
    }
}
