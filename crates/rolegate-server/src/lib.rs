pub mod config;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod observability;
pub mod server;

pub use config::{AppConfig, LoggingConfig, MetricsConfig, ServerConfig};
pub use observability::{init_tracing, shutdown_tracing};
pub use server::{
    AppState, RolegateServer, ServerBuilder, build_app, build_router, spawn_cache_maintenance,
};
