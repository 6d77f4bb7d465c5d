use clap::Parser;
use std::time::Duration;

use crate::routes::{RouteEntry, RouteTable};

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "api-gateway")]
#[command(about = "Rate-limiting, token-checking reverse proxy for backend services")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    // Secret the user service signs tokens with
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    // Rate limit max requests per window, per client
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..))]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    pub rate_window: u64,

    // How often idle clients are swept, in seconds
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    pub eviction_interval: u64,

    // Idle time after which a client's bucket is dropped, in seconds
    #[arg(long, default_value_t = 3600)]
    pub visitor_ttl: u64,

    // Backend request timeout in seconds
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub upstream_timeout: u64,

    // Token-protected routes, PREFIX=URL
    #[arg(long = "route", value_name = "PREFIX=URL", default_values = ["/api/v1=http://localhost:8081"])]
    pub routes: Vec<RouteEntry>,

    // Routes that skip token checks, PREFIX=URL
    #[arg(
        long = "public-route",
        value_name = "PREFIX=URL",
        default_values = [
            "/api/v1/auth/register=http://localhost:8081",
            "/api/v1/auth/login=http://localhost:8081",
        ]
    )]
    pub public_routes: Vec<RouteEntry>,

    // Key clients on the first X-Forwarded-For entry (only behind a trusted proxy)
    #[arg(long, default_value_t = false)]
    pub trust_forwarded_for: bool,
}

impl Args {
    pub fn route_table(&self) -> RouteTable {
        let public = self.public_routes.iter().map(|r| RouteEntry {
            protected: false,
            ..r.clone()
        });
        let protected = self.routes.iter().cloned();
        // public first so an identical prefix resolves to the public entry
        RouteTable::new(public.chain(protected).collect())
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval)
    }

    pub fn visitor_ttl(&self) -> Duration {
        Duration::from_secs(self.visitor_ttl)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout)
    }
}
