use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::FromRef;
use axum::{Router, middleware, routing::get};
use medisync_auth::{AuthState, JwtService};
use medisync_core::events::EventBroadcaster;
use medisync_storage::DynStore;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::services::{
    DepartmentService, OperationService, PatientService, PharmacyService, PrescriptionService,
    UserService,
};
use crate::storage_adapter::StoreUserStorage;
use crate::{bootstrap, handlers, middleware as app_middleware, routes};

/// Errors raised while assembling the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("bootstrap failed: {0}")]
    Bootstrap(#[from] medisync_api::ApiError),
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: DynStore,
    pub events: EventBroadcaster,
    pub auth: AuthState,
    pub patients: PatientService,
    pub operations: OperationService,
    pub pharmacy: PharmacyService,
    pub departments: DepartmentService,
    pub users: UserService,
    pub prescriptions: PrescriptionService,
}

impl AppState {
    pub fn new(config: AppConfig, store: DynStore) -> Self {
        let events = EventBroadcaster::with_capacity(config.realtime.channel_capacity);
        let jwt = Arc::new(JwtService::new(
            config.auth.jwt_secret.as_bytes(),
            config.token_ttl(),
        ));
        let auth = AuthState::new(
            jwt.clone(),
            Arc::new(StoreUserStorage::new(store.clone())),
        );
        let pharmacy = PharmacyService::new(store.clone(), events.clone());

        Self {
            patients: PatientService::new(store.clone(), events.clone()),
            operations: OperationService::new(store.clone(), events.clone()),
            departments: DepartmentService::new(store.clone(), events.clone()),
            users: UserService::new(store.clone(), jwt, config.auth.public_registration),
            prescriptions: PrescriptionService::new(store.clone(), pharmacy.clone()),
            pharmacy,
            auth,
            events,
            store,
            config: Arc::new(config),
        }
    }
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

pub fn build_app(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;
    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .merge(routes::api_routes())
        .fallback(handlers::not_found)
        .with_state(state)
        // Middleware stack (order: request id -> compression/cors/trace -> body limit)
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
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
                        http.target = %app_middleware::log_target(req.uri()),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
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
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

pub struct MedisyncServer {
    addr: SocketAddr,
    app: Router,
    state: AppState,
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
    store: Option<DynStore>,
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
            store: None,
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

    /// Use an existing store instead of a fresh in-memory one.
    pub fn with_store(mut self, store: DynStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Validate the configuration, wire the services and run the bootstrap.
    pub async fn build(self) -> Result<MedisyncServer, ServerError> {
        self.config.validate().map_err(ServerError::Config)?;
        medisync_api::set_error_detail(self.config.is_development());

        let store = self
            .store
            .unwrap_or_else(medisync_db_memory::create_store);
        tracing::info!(backend = store.backend_name(), "document store ready");

        let bootstrap_config = self.config.bootstrap.clone();
        let state = AppState::new(self.config, store);
        bootstrap::run(&state, &bootstrap_config).await?;

        Ok(MedisyncServer {
            addr: self.addr,
            app: build_app(state.clone()),
            state,
        })
    }
}

impl MedisyncServer {
    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn router(&self) -> Router {
        self.app.clone()
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until Ctrl-C.
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        tracing::info!(addr = %listener.local_addr()?, "listening");
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
