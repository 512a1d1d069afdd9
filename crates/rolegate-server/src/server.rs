use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::FromRef,
    middleware,
    routing::{get, post},
};
use rolegate_auth::{
    AuthResult, AuthState, AuthorizationEngine, IdentityCache, authorize, logout_handler,
};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::{config::AppConfig, handlers, metrics, middleware as app_middleware};

/// Route template → operation id for the demonstration endpoints.
pub const ROUTE_OPERATIONS: &[(&str, &str)] = &[
    ("/api/testView", "api.testView"),
    ("/api/testEdit", "api.testEdit"),
    ("/api/testUnsecuredMethod", "api.testUnsecured"),
    ("/admin/test", "admin.test"),
];

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub auth: AuthState,
}

impl AppState {
    /// Builds the authorization engine from the configuration and registers
    /// the operation ids of the demonstration routes.
    pub fn from_config(cfg: &AppConfig) -> AuthResult<Self> {
        let engine = Arc::new(AuthorizationEngine::from_config(&cfg.auth)?);
        let auth = ROUTE_OPERATIONS.iter().fold(
            AuthState::from_config(engine, &cfg.auth),
            |auth, (route, operation)| auth.with_operation(*route, *operation),
        );
        Ok(Self { auth })
    }

    pub fn identity_cache(&self) -> &Arc<IdentityCache> {
        self.auth.engine.cache()
    }
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

pub struct RolegateServer {
    addr: SocketAddr,
    app: Router,
    cache: Arc<IdentityCache>,
    cleanup_interval: Duration,
}

/// Builds the application router, installing the metrics recorder when enabled.
pub fn build_app(cfg: &AppConfig) -> AuthResult<Router> {
    if cfg.metrics.enabled {
        metrics::init_metrics();
    }
    Ok(build_router(AppState::from_config(cfg)?))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Demonstration API
        .route("/api/testView", get(handlers::test_view))
        .route("/api/testEdit", get(handlers::test_edit))
        .route("/api/testUnsecuredMethod", get(handlers::test_unsecured))
        .route("/admin/test", get(handlers::admin_test))
        // Session management and scraping
        .route("/logout", post(logout_handler))
        .route("/actuator/prometheus", get(handlers::prometheus))
        // Authorization covers every route and the fallback; metrics wrap it to see the outcome
        .layer(middleware::from_fn_with_state(state.auth.clone(), authorize))
        .layer(middleware::from_fn(app_middleware::track_metrics))
        // Outer stack (order: request id -> trace -> compression)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(app_middleware::request_id))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|req: &axum::http::Request<_>| {
                            use tracing::field::Empty;
                            let req_id = req
                                .extensions()
                                .get::<axum::http::HeaderValue>()
                                .and_then(|v| v.to_str().ok())
                                .unwrap_or("")
                                .to_string();
                            tracing::info_span!(
                                "http.request",
                                http.method = %req.method(),
                                http.target = %req.uri().path(),
                                http.status_code = Empty,
                                request_id = %req_id
                            )
                        })
                        .on_response(
                            |res: &axum::http::Response<_>,
                             latency: Duration,
                             span: &tracing::Span| {
                                span.record(
                                    "http.status_code",
                                    tracing::field::display(res.status().as_u16()),
                                );
                                tracing::info!(
                                    http.status = %res.status().as_u16(),
                                    elapsed_ms = %latency.as_millis(),
                                    "request handled"
                                );
                            },
                        ),
                )
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}

/// Periodically purges expired identity cache entries and publishes cache metrics.
pub fn spawn_cache_maintenance(cache: Arc<IdentityCache>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let removed = cache.cleanup_expired();
            let stats = cache.stats();
            if removed > 0 {
                tracing::debug!(removed, size = stats.size, "purged expired identity cache entries");
            }
            metrics::record_cache_stats(&stats);
        }
    })
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub fn build(self) -> AuthResult<RolegateServer> {
        if self.config.metrics.enabled {
            metrics::init_metrics();
        }
        let state = AppState::from_config(&self.config)?;
        let cache = Arc::clone(state.identity_cache());

        Ok(RolegateServer {
            addr: self.addr,
            app: build_router(state),
            cache,
            cleanup_interval: self.config.auth.session.cleanup_interval,
        })
    }
}

impl RolegateServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", listener.local_addr()?);

        let policy = self.cache.policy();
        tracing::info!(
            idle_timeout = ?policy.idle_timeout,
            max_lifetime = ?policy.max_lifetime,
            "session cache ready"
        );
        let maintenance = spawn_cache_maintenance(self.cache, self.cleanup_interval);
        let served = axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await;
        maintenance.abort();
        served?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
