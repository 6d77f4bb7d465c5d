use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Args;
use crate::handlers::{gateway_handler, health_handler, metrics_handler};
use crate::state::AppState;

// /health and /metrics are answered here; everything else goes through the pipeline
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .fallback(gateway_handler)
        .with_state(state)
}

/// Serves until `cancel` fires, then drains in-flight requests.
pub async fn run(args: Args, cancel: CancellationToken) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::from_args(&args, cancel.clone())?;
    let app = router(Arc::clone(&state));

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(port = args.port, "gateway listening");
    info!(
        limit = args.rate_limit,
        window_secs = args.rate_window,
        upstream_timeout_secs = args.upstream_timeout,
        "rate limit configured"
    );
    if state.routes.is_empty() {
        warn!("no routes configured, every proxied request will 404");
    }
    for route in state.routes.entries() {
        info!(
            prefix = %route.prefix,
            backend = %route.backend,
            protected = route.protected,
            "route registered"
        );
    }

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { cancel.cancelled().await })
    .await?;

    info!("gateway stopped");
    Ok(())
}
