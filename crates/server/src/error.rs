use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::{audit_trail::AuditError, categories::CategoryError, documents::DocumentError};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Audit(#[from] AuditError),
    #[error(transparent)]
    Category(#[from] CategoryError),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Document(DocumentError::Validation(msg)) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Document(DocumentError::NotFound(msg)) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Document(DocumentError::Conflict(msg)) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::Document(DocumentError::Remote(e)) => {
                tracing::error!(error = %e, "Document backend failure");
                (
                    StatusCode::BAD_GATEWAY,
                    "The document store is unavailable. Please try again.".to_string(),
                )
            }
            ApiError::Audit(AuditError::InvalidQuery(msg)) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Audit(AuditError::Database(e)) => {
                tracing::error!(error = %e, "Audit log query failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "The audit log is unavailable. Please try again.".to_string(),
                )
            }
            ApiError::Category(CategoryError::Validation(msg)) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Category(CategoryError::NotFound(msg)) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Category(CategoryError::Conflict(msg)) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::Category(CategoryError::Database(e)) => {
                tracing::error!(error = %e, "Category query failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "The document store is unavailable. Please try again.".to_string(),
                )
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, message) = self.status_and_message();
        let response = ApiResponse::<()>::error(&message);
        (status_code, Json(response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use services::services::{documents::RemoteError, storage::StorageError};

    use super::*;

    #[test]
    fn test_lifecycle_errors_map_to_status_codes() {
        let cases = [
            (DocumentError::validation("bad"), StatusCode::BAD_REQUEST),
            (DocumentError::NotFound("doc".to_string()), StatusCode::NOT_FOUND),
            (DocumentError::conflict("deleted"), StatusCode::CONFLICT),
        ];
        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).into_response().status(), expected);
        }
    }

    #[test]
    fn test_category_errors_map_to_status_codes() {
        let cases = [
            (CategoryError::Validation("name".to_string()), StatusCode::BAD_REQUEST),
            (CategoryError::NotFound("category".to_string()), StatusCode::NOT_FOUND),
            (CategoryError::Conflict("in use".to_string()), StatusCode::CONFLICT),
        ];
        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).into_response().status(), expected);
        }
    }

    #[test]
    fn test_remote_errors_hide_details() {
        let error = ApiError::from(DocumentError::Remote(RemoteError::Storage(StorageError::InvalidPath(
            "/secret/path".to_string(),
        ))));
        let (status, message) = error.status_and_message();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(!message.contains("/secret/path"));
    }
}
