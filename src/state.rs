use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::auth::TokenValidator;
use crate::config::Args;
use crate::proxy::Forwarder;
use crate::rate_limit::VisitorRegistry;
use crate::routes::RouteTable;

// app's shared state, built once at startup
pub struct AppState {
    pub visitors: Arc<VisitorRegistry>,
    pub validator: TokenValidator,
    pub routes: RouteTable,
    pub forwarder: Forwarder,
    pub trust_forwarded_for: bool, // key clients on X-Forwarded-For
}

impl AppState {
    /// Builds the state and starts the visitor eviction task, which runs until
    /// `cancel` fires.
    pub fn from_args(args: &Args, cancel: CancellationToken) -> Result<Arc<Self>, reqwest::Error> {
        let visitors = VisitorRegistry::start(
            args.rate_limit,
            args.rate_window(),
            args.visitor_ttl(),
            args.eviction_interval(),
            cancel,
        );

        Ok(Arc::new(Self {
            visitors,
            validator: TokenValidator::new(&args.jwt_secret),
            routes: args.route_table(),
            forwarder: Forwarder::new(args.upstream_timeout())?,
            trust_forwarded_for: args.trust_forwarded_for,
        }))
    }
}
