//! Rejection taxonomy for the admission pipeline.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use std::time::Duration;
use thiserror::Error;

/// Why a bearer token was refused. Clients always see a plain 401; the kind
/// only shows up in logs and metrics.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("authorization header missing")]
    MissingToken,

    #[error("authorization header is not `Bearer <token>`")]
    MalformedHeader,

    #[error("token signature or expiry check failed")]
    InvalidToken,
}

impl AuthError {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::MalformedHeader => "malformed_header",
            Self::InvalidToken => "invalid_token",
        }
    }
}

/// What went wrong talking to a backend. Only ever logged.
#[derive(Error, Debug)]
pub enum BackendFailure {
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("no response headers within {0:?}")]
    Timeout(Duration),
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("rate limit exceeded, retry after {retry_after:?}")]
    AdmissionDenied { retry_after: Duration },

    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AuthError),

    #[error("no route for {0}")]
    RouteNotFound(String),

    #[error("backend {backend} unavailable: {source}")]
    BackendUnavailable {
        backend: String,
        #[source]
        source: BackendFailure,
    },
}

impl GatewayError {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::AdmissionDenied { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::RouteNotFound(_) => StatusCode::NOT_FOUND,
            Self::BackendUnavailable { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

// whole seconds, rounded up, never 0
pub fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // backend addresses and transport errors stay in the logs
        match self {
            Self::AdmissionDenied { retry_after } => {
                let secs = retry_after_secs(retry_after);
                let body = serde_json::json!({
                    "error": "Rate limit exceeded",
                    "retry_after": format!("{secs}s"),
                });
                let mut response = (status, Json(body)).into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(secs));
                response
            }
            // one message for every kind; the kind is only logged
            Self::Unauthorized(_) => {
                let body = serde_json::json!({ "error": "Unauthorized" });
                let mut response = (status, Json(body)).into_response();
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                response
            }
            Self::RouteNotFound(_) => {
                (status, Json(serde_json::json!({ "error": "Route not found" }))).into_response()
            }
            Self::BackendUnavailable { .. } => (
                status,
                Json(serde_json::json!({ "error": "Service temporarily unavailable" })),
            )
                .into_response(),
        }
    }
}
