use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use voyage_core::CoreError;

#[derive(Debug)]
pub enum AppError {
    /// The request body could not be read as the expected shape.
    BadRequest(String),
    Core(CoreError),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Core(err) => match &err {
                CoreError::MalformedEvent(_) | CoreError::InvalidFilter(_) | CoreError::InvalidPage(_) => {
                    (StatusCode::BAD_REQUEST, json!({ "error": err.to_string() }))
                }
                CoreError::IncompleteSpecification { missing } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    json!({ "error": err.to_string(), "missing": missing }),
                ),
                CoreError::TransientStore(msg) => {
                    tracing::warn!("Store unavailable after retries: {}", msg);
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        json!({ "error": "Store temporarily unavailable, try again" }),
                    )
                }
                CoreError::StoreRejected(msg) => {
                    tracing::error!("Internal Server Error: {}", msg);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        json!({ "error": "Internal Server Error" }),
                    )
                }
            },
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        Self::Core(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CoreError::MalformedEvent("x".into()), StatusCode::BAD_REQUEST),
            (CoreError::InvalidFilter("x".into()), StatusCode::BAD_REQUEST),
            (CoreError::InvalidPage("x".into()), StatusCode::BAD_REQUEST),
            (
                CoreError::IncompleteSpecification { missing: vec!["country"] },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (CoreError::TransientStore("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (CoreError::StoreRejected("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }
}
