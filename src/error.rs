use crate::engine::PoolError;
use crate::export::ExportError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Pool(#[from] PoolError),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<ExportError> for AppError {
    fn from(err: ExportError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Pool(PoolError::InvariantViolation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Pool(PoolError::PreconditionFailed(_))
            | AppError::Pool(PoolError::NothingAvailable(_))
            | AppError::Pool(PoolError::InsufficientLiquidity { .. }) => StatusCode::CONFLICT,
            AppError::Pool(PoolError::Collaborator(_)) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::CollaboratorError;

    #[test]
    fn test_pool_error_status_codes() {
        let cases = [
            (
                PoolError::InvariantViolation("over".to_string()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                PoolError::PreconditionFailed("disabled".to_string()),
                StatusCode::CONFLICT,
            ),
            (PoolError::NothingAvailable("refund"), StatusCode::CONFLICT),
            (
                PoolError::InsufficientLiquidity {
                    requested: 2,
                    available: 1,
                },
                StatusCode::CONFLICT,
            ),
            (
                PoolError::Collaborator(CollaboratorError::Unavailable("down".to_string())),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
    }

    #[test]
    fn test_error_message_passes_through() {
        let err = AppError::from(PoolError::NothingAvailable("refund"));
        assert_eq!(err.to_string(), "nothing available: no refund to withdraw");
    }
}
