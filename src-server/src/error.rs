use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fundflow_core::errors::{DatabaseError, Error as CoreError, ValidationError};
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    code: &'static str,
    message: String,
    retryable: bool,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Core(CoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Core(CoreError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Core(CoreError::Database(_)) | ApiError::Core(CoreError::Unexpected(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Core(CoreError::NotFound(_)) => "not_found",
            ApiError::Core(CoreError::Validation(ValidationError::MonthAlreadyFinalized {
                ..
            })) => "month_finalized",
            ApiError::Core(CoreError::Validation(_)) => "validation",
            ApiError::Core(CoreError::Database(DatabaseError::Conflict(_))) => "conflict",
            ApiError::Core(CoreError::Database(_)) => "database",
            ApiError::Core(CoreError::Unexpected(_)) => "internal",
        }
    }

    fn retryable(&self) -> bool {
        let ApiError::Core(err) = self;
        err.is_retryable()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }
        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
            retryable: self.retryable(),
        };
        (status, Json(body)).into_response()
    }
}
