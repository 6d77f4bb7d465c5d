use axum::extract::{ConnectInfo, Request, State};
use axum::http::header;
use axum::response::Response;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::debug;

use crate::error::{AuthError, GatewayError};
use crate::metrics::{AUTH_FAILURES, RATE_LIMITED, REQUEST_TOTAL};
use crate::models::Identity;
use crate::routes::RouteEntry;
use crate::state::AppState;

// Rate limit key - peer IP, or the first X-Forwarded-For hop when trusted
pub fn client_id(request: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    peer_ip(request)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

// socket peer of the inbound connection, if the server recorded it
fn peer_ip(request: &Request) -> Option<IpAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

/// Admission chain for every proxied request:
/// rate limit -> route lookup -> token check (protected routes) -> forward.
/// The first rejection ends the request.
pub async fn gateway_handler(
    State(state): State<Arc<AppState>>,
    mut request: Request,
) -> Result<Response, GatewayError> {
    REQUEST_TOTAL.inc();

    let route = admit(&state, &mut request)?;
    let peer = peer_ip(&request);
    state.forwarder.forward(request, route, peer).await
}

/// Everything before forwarding. On success the matched route is returned
/// and, for protected routes, the caller's [`Identity`] sits in the request
/// extensions.
pub fn admit<'s>(state: &'s AppState, request: &mut Request) -> Result<&'s RouteEntry, GatewayError> {
    let client = client_id(request, state.trust_forwarded_for);
    if let Err(retry_after) = state.visitors.check(&client) {
        RATE_LIMITED.inc();
        debug!(client = %client, "rate limit exceeded");
        return Err(GatewayError::AdmissionDenied { retry_after });
    }

    let path = request.uri().path();
    let route = state
        .routes
        .resolve(path)
        .ok_or_else(|| GatewayError::RouteNotFound(path.to_string()))?;

    if route.protected {
        let identity = match request.headers().get(header::AUTHORIZATION) {
            None => state.validator.authenticate(None),
            Some(value) => match value.to_str() {
                Ok(value) => state.validator.authenticate(Some(value)),
                Err(_) => Err(AuthError::MalformedHeader),
            },
        }
        .map_err(|err| {
            AUTH_FAILURES.with_label_values(&[err.kind()]).inc();
            debug!(client = %client, kind = err.kind(), "authentication failed");
            err
        })?;

        debug!(client = %client, user_id = %identity.user_id, "authenticated");
        request.extensions_mut().insert(identity);
    }

    Ok(route)
}
