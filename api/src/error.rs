//! API Error Handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use points_economy::{EconomyError, ErrorKind};
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Economy(#[from] EconomyError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Economy(err) => match err.kind() {
                ErrorKind::Authorization if *err == EconomyError::Unauthenticated => {
                    StatusCode::UNAUTHORIZED
                }
                ErrorKind::Authorization => StatusCode::FORBIDDEN,
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::StateConflict => StatusCode::CONFLICT,
                ErrorKind::Resource => StatusCode::PAYMENT_REQUIRED,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Integrity => StatusCode::INTERNAL_SERVER_ERROR,
                ErrorKind::Unavailable => StatusCode::LOCKED,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_type, message) = match &self {
            ApiError::Economy(EconomyError::Integrity(detail)) => {
                error!(detail = %detail, "Request failed with integrity fault");
                ("internal_error", "internal error".to_string())
            }
            ApiError::Economy(err) => (err.tag(), err.to_string()),
            ApiError::BadRequest(msg) => ("bad_request", msg.clone()),
        };

        let body = Json(json!({
            "error": error_type,
            "message": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (EconomyError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (EconomyError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (EconomyError::InvalidCombination("x".into()), StatusCode::BAD_REQUEST),
            (EconomyError::AlreadyClaimed, StatusCode::CONFLICT),
            (
                EconomyError::InsufficientFunds {
                    balance: 1,
                    requested: 2,
                },
                StatusCode::PAYMENT_REQUIRED,
            ),
            (EconomyError::UserNotFound("x".into()), StatusCode::NOT_FOUND),
            (EconomyError::Integrity("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (EconomyError::Locked, StatusCode::LOCKED),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }
}
