use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, Histogram, register_counter, register_counter_vec, register_gauge,
    register_histogram,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("gateway_requests_total", "Total number of proxied requests").unwrap();
    pub static ref RATE_LIMITED: Counter =
        register_counter!("gateway_rate_limited_total", "Requests rejected by the rate limiter").unwrap();
    pub static ref AUTH_FAILURES: CounterVec = register_counter_vec!(
        "gateway_auth_failures_total",
        "Rejected bearer tokens by failure kind",
        &["kind"]
    )
    .unwrap();
    pub static ref BACKEND_ERRORS: Counter =
        register_counter!("gateway_backend_errors_total", "Backend transport failures").unwrap();
    pub static ref UPSTREAM_LATENCY: Histogram = register_histogram!(
        "gateway_upstream_latency_seconds",
        "Time until the backend answered, in seconds"
    )
    .unwrap();
    pub static ref VISITORS_TRACKED: Gauge =
        register_gauge!("gateway_visitors", "Clients currently tracked by the rate limiter").unwrap();
}
