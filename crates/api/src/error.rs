//! Error responses of the HTTP service.
//!
//! Every failing handler returns `ApiError`; the body is always
//! `{"error": <message>, "requestId": <uuid>}` so clients can show the
//! message as-is.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use uuid::Uuid;

use extract::ProviderError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub request_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or incomplete request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Provider rejected the call for rate or quota reasons (429)
    #[error("{0}")]
    RateLimited(String),

    /// Provider failed for any other reason (502)
    #[error("{0}")]
    Upstream(String),

    /// Generation ran past its deadline before producing output (504)
    #[error("{0}")]
    Timeout(String),

    /// Server misconfiguration or bug (500)
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::RateLimited(_) => "rate_limited",
            ApiError::Upstream(_) => "upstream_error",
            ApiError::Timeout(_) => "timeout",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Upstream { status: 429, message } => ApiError::RateLimited(message),
            ProviderError::Upstream { message, .. } => ApiError::Upstream(message),
            ProviderError::Transport(_) => ApiError::Upstream(err.to_string()),
            ProviderError::Timeout(_) => ApiError::Timeout(err.to_string()),
            ProviderError::MissingApiKey => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let request_id = Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                error_type = self.kind(),
                status = status.as_u16(),
                request_id = %request_id,
                message = %self,
                "API error"
            );
        } else {
            tracing::warn!(
                error_type = self.kind(),
                status = status.as_u16(),
                request_id = %request_id,
                message = %self,
                "Request rejected"
            );
        }

        let body = ErrorResponse {
            error: self.to_string(),
            request_id,
        };
        (status, Json(body)).into_response()
    }
}
