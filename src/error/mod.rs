use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::telemetry::sanitize_for_log;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid request body: {0}")]
    InvalidBody(#[from] JsonRejection),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

impl AppError {
    /// Rejection text echoes raw request input, so it is sanitized before logging
    fn log_message(&self) -> String {
        match self {
            AppError::InvalidBody(e) => sanitize_for_log(&e.body_text()),
            AppError::Validation(msg) | AppError::NotFound(msg) | AppError::Internal(msg) => {
                msg.clone()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let log_message = self.log_message();
        let (status, code, client_message) = match &self {
            AppError::InvalidBody(e) => (StatusCode::BAD_REQUEST, "INVALID_BODY", e.body_text()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Internal(e) => {
                let client_msg = if is_production() {
                    "Internal server error".to_string()
                } else {
                    e.clone()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", client_msg)
            }
        };

        // Client mistakes are warnings; everything else is logged as an error
        if status.is_client_error() {
            tracing::warn!(
                code = %code,
                status = %status.as_u16(),
                message = %log_message,
                "API request rejected"
            );
        } else {
            tracing::error!(
                code = %code,
                status = %status.as_u16(),
                message = %log_message,
                "API error"
            );
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: client_message,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_validation_error_response() {
        let response = AppError::Validation("type must not be empty".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["message"], "type must not be empty");
    }

    #[tokio::test]
    async fn test_not_found_response() {
        let response = AppError::NotFound("no refresh signal".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_invalid_body_is_sanitized_for_logs() {
        use axum::{body::Body, extract::FromRequest, http::Request};

        use crate::notification::Audience;
        use crate::telemetry::MAX_LOGGED_CHARS;

        let request = Request::builder()
            .header("content-type", "application/json")
            .body(Body::from(r#""every\r\none""#))
            .unwrap();
        let rejection = Json::<Audience>::from_request(request, &())
            .await
            .unwrap_err();
        assert!(rejection.body_text().contains('\n'));

        let error = AppError::from(rejection);
        let logged = error.log_message();
        assert!(!logged.chars().any(char::is_control));
        assert!(logged.chars().count() <= MAX_LOGGED_CHARS);

        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "INVALID_BODY");
    }

    #[tokio::test]
    async fn test_internal_error_response() {
        let response = AppError::Internal("encoder failed".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"]["code"], "INTERNAL_ERROR");
    }
}
