//! HTTP error response conversion
//!
//! The single place storage and conversion errors are mapped to status
//! codes. Responses carry no body: internal paths, argv, and backend
//! messages stay in the logs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use filestore_convert::ConvertError;
use filestore_storage::PersistorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileError {
    #[error(transparent)]
    Persistor(#[from] PersistorError),

    #[error(transparent)]
    Convert(#[from] ConvertError),
}

impl FileError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            FileError::Persistor(PersistorError::NotFound(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn log(&self) {
        match self {
            // Missing objects are routine, not faults
            FileError::Persistor(PersistorError::NotFound(key)) => {
                tracing::debug!(key = %key, "Object not found");
            }
            FileError::Convert(e) => {
                tracing::error!(error = %e, "Conversion failed");
            }
            FileError::Persistor(e) => {
                tracing::error!(error = %e, "Storage operation failed");
            }
        }
    }
}

impl IntoResponse for FileError {
    fn into_response(self) -> Response {
        self.log();
        self.status_code().into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err = FileError::Persistor(PersistorError::NotFound("k".to_string()));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn other_errors_map_to_500() {
        let err = FileError::Persistor(PersistorError::BackendError("boom".to_string()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = FileError::Convert(ConvertError::InvalidFormat("ahhhhh".to_string()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
