use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::{
    DbErr,
    models::todo::{TodoError, ValidationError},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Todo(#[from] TodoError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Template(#[from] tera::Error),
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Todo(err) => match err {
                TodoError::Validation(_) => (StatusCode::BAD_REQUEST, "ValidationError"),
                TodoError::NotFound => (StatusCode::NOT_FOUND, "NotFound"),
                TodoError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden"),
                TodoError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
            },
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "ValidationError"),
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
            ApiError::Template(_) => (StatusCode::INTERNAL_SERVER_ERROR, "TemplateError"),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "NotFound"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = self.status_and_type();

        let error_message = if status_code.is_server_error() {
            tracing::error!(
                status = %status_code,
                error_type,
                error = %self,
                "Request failed"
            );
            format!("{}: {}", error_type, self)
        } else {
            self.to_string()
        };

        (status_code, Json(json!({ "error": error_message }))).into_response()
    }
}
