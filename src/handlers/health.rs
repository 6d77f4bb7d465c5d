use axum::{Json, response::IntoResponse};

// liveness only - never rate limited or forwarded
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "api-gateway",
        "timestamp": chrono::Utc::now().timestamp()
    }))
}
