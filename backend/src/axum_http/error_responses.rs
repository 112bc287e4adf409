use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::usecases::{billing_webhook::WebhookError, subscriptions::SubscriptionError};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

const INTERNAL_ERROR: &str = "Internal server error";

fn error_response(status: StatusCode, message: String) -> Response {
    // Don't leak internal error detail to client
    let error = if status.is_server_error() {
        INTERNAL_ERROR.to_string()
    } else {
        message
    };
    (status, Json(ErrorResponse { error })).into_response()
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        error_response(self.status_code(), self.to_string())
    }
}

impl IntoResponse for SubscriptionError {
    fn into_response(self) -> Response {
        error_response(self.status_code(), self.to_string())
    }
}

pub async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorResponse {
            error: "Method not allowed".to_string(),
        }),
    )
        .into_response()
}
