//! Pass-through forwarding to backend services.

use axum::body::{Body, HttpBody};
use axum::extract::Request;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Uri, header};
use axum::response::Response;
use std::net::IpAddr;
use std::time::{Duration, Instant};
use tracing::{debug, error};

use crate::error::{BackendFailure, GatewayError};
use crate::metrics::{BACKEND_ERRORS, UPSTREAM_LATENCY};
use crate::routes::RouteEntry;

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_ORIGIN_SERVICE: HeaderName = HeaderName::from_static("x-origin-service");
pub const ORIGIN_MARKER: &str = "api-gateway";

// connection-scoped headers, never forwarded in either direction
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "proxy-connection"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

// extra hop-by-hop headers named in `Connection: a, b`
fn connection_listed(headers: &HeaderMap) -> Vec<HeaderName> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect()
}

// copy end-to-end headers only
fn end_to_end(headers: &HeaderMap, skip_host: bool) -> HeaderMap {
    let listed = connection_listed(headers);
    let mut out = HeaderMap::with_capacity(headers.len() + 3);
    for (name, value) in headers {
        if (skip_host && name == header::HOST) || is_hop_by_hop(name) || listed.contains(name) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

// prior X-Forwarded-For hops, joined, then the caller's address
fn forwarded_for(headers: &HeaderMap, client_addr: IpAddr) -> Option<HeaderValue> {
    let client = client_addr.to_string();
    let mut hops: Vec<&str> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    hops.push(&client);
    HeaderValue::from_str(&hops.join(", ")).ok()
}

/// Forwards requests over a shared, pooled HTTP client.
///
/// Dropping the future returned by [`forward`](Self::forward), which is what
/// happens when the inbound connection goes away, abandons the backend call.
#[derive(Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    timeout: Duration, // connect + wait for response headers
}

impl Forwarder {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        // no whole-request timeout: it would cut long response bodies mid-stream
        let client = reqwest::Client::builder().connect_timeout(timeout).build()?;
        Ok(Self { client, timeout })
    }

    /// Backend base address followed by the untouched path and query.
    pub fn target_url(route: &RouteEntry, uri: &Uri) -> String {
        let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
        format!("{}{}", route.backend, path_and_query)
    }

    pub async fn forward(
        &self,
        request: Request,
        route: &RouteEntry,
        client_addr: Option<IpAddr>,
    ) -> Result<Response, GatewayError> {
        let (parts, body) = request.into_parts();
        let url = Self::target_url(route, &parts.uri);

        let mut headers = end_to_end(&parts.headers, true);

        // HTTP/2 clients send the authority instead of a Host header
        let host = parts.headers.get(header::HOST).cloned().or_else(|| {
            parts
                .uri
                .authority()
                .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
        });
        if let Some(host) = host {
            headers.insert(X_FORWARDED_HOST, host);
        }
        if let Some(forwarded) = client_addr.and_then(|addr| forwarded_for(&parts.headers, addr)) {
            headers.insert(X_FORWARDED_FOR, forwarded);
        }
        headers.insert(X_ORIGIN_SERVICE, HeaderValue::from_static(ORIGIN_MARKER));

        let mut outbound = self.client.request(parts.method, &url).headers(headers);
        if !body.is_end_stream() {
            outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        debug!(backend = %route.backend, %url, "forwarding");
        let started = Instant::now();

        let sent = match tokio::time::timeout(self.timeout, outbound.send()).await {
            Ok(result) => result.map_err(BackendFailure::from),
            Err(_) => Err(BackendFailure::Timeout(self.timeout)),
        };
        let upstream = sent.map_err(|source| {
            BACKEND_ERRORS.inc();
            error!(backend = %route.backend, error = %source, "backend request failed");
            GatewayError::BackendUnavailable {
                backend: route.backend.clone(),
                source,
            }
        })?;

        UPSTREAM_LATENCY.observe(started.elapsed().as_secs_f64());

        let status = upstream.status();
        let response_headers = end_to_end(upstream.headers(), false);

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        Ok(response)
    }
}
