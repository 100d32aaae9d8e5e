use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, extract::FromRef, middleware, routing::get};
use carehub_auth::{AuthState, JwtService};
use carehub_core::events::{ConnectionRegistry, EventBroadcaster};
use carehub_db_memory::InMemoryStorage;
use carehub_db_postgres::PostgresStorage;
use carehub_secrets::{PiiCipher, parse_key};
use carehub_storage::{DynStorage, Storage};
use rand::RngCore;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::bootstrap::bootstrap_accounts;
use crate::config::{AppConfig, StorageBackend};
use crate::services::{
    AuditTrail, ChatModel, GroqChatModel, MedicineCatalog, OcrService, OrderBook,
    TriageAssistant, VideoConferencing, VideoService, ZoomClient,
};
use crate::{handlers, middleware as app_middleware, realtime, routes};

/// Shared state handed to every handler.
///
/// Every collaborator is constructed once at startup. Tests build the
/// state and then swap individual services for stubs.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub storage: DynStorage,
    pub auth: AuthState,
    pub cipher: PiiCipher,
    pub broadcaster: Arc<EventBroadcaster>,
    pub triage: Arc<TriageAssistant>,
    pub ocr: Arc<OcrService>,
    pub video: Arc<VideoService>,
    pub catalog: Arc<MedicineCatalog>,
    pub orders: Arc<OrderBook>,
    pub audit: AuditTrail,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("storage", &self.storage.backend_name())
            .field("broadcaster", &self.broadcaster)
            .field("ai_online", &self.triage.is_online())
            .field("medicines", &self.catalog.len())
            .finish_non_exhaustive()
    }
}

/// Connects the configured storage backend.
pub async fn create_storage(cfg: &AppConfig) -> anyhow::Result<DynStorage> {
    match cfg.storage.backend {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory storage; data is lost on restart");
            Ok(Arc::new(InMemoryStorage::new()))
        }
        StorageBackend::Postgres => {
            tracing::info!(pool_size = cfg.storage.postgres.pool_size, "Connecting to PostgreSQL");
            let storage = PostgresStorage::new(cfg.storage.postgres.clone()).await?;
            Ok(Arc::new(storage))
        }
    }
}

fn build_jwt_service(cfg: &AppConfig) -> anyhow::Result<JwtService> {
    let algorithm = cfg.auth.signing_algorithm().map_err(anyhow::Error::msg)?;
    let secret = if cfg.auth.secret_key.is_empty() {
        tracing::warn!("auth.secret_key is not set; tokens will not survive a restart");
        let mut secret = vec![0u8; 64];
        rand::thread_rng().fill_bytes(&mut secret);
        secret
    } else {
        cfg.auth.secret_key.as_bytes().to_vec()
    };
    Ok(JwtService::new(
        &secret,
        algorithm,
        &cfg.auth.issuer,
        cfg.auth.access_token_lifetime_secs(),
    ))
}

fn build_cipher(cfg: &AppConfig) -> anyhow::Result<PiiCipher> {
    let crypto = &cfg.crypto;
    let mut cipher = if crypto.encryption_key.is_empty() {
        tracing::warn!("crypto.encryption_key is not set; sealed data will be unreadable after a restart");
        PiiCipher::ephemeral()
    } else {
        PiiCipher::from_key_str(&crypto.encryption_key, &crypto.key_id)?
    };
    for retired in &crypto.retired_keys {
        cipher = cipher.with_retired_key(parse_key(&retired.key)?, &retired.key_id)?;
    }
    Ok(cipher)
}

/// Builds the application state: storage, keys, providers and catalog.
/// Configured bootstrap accounts are created on the way.
pub async fn build_state(cfg: &AppConfig) -> anyhow::Result<AppState> {
    let storage = create_storage(cfg).await?;
    bootstrap_accounts(&storage, &cfg.bootstrap).await?;
    build_state_with_storage(cfg, storage)
}

/// Like [`build_state`] with an already connected backend. No accounts are seeded.
pub fn build_state_with_storage(cfg: &AppConfig, storage: DynStorage) -> anyhow::Result<AppState> {
    let auth = AuthState::new(Arc::new(build_jwt_service(cfg)?));
    let cipher = build_cipher(cfg)?;

    let registry = Arc::new(ConnectionRegistry::with_buffer(cfg.realtime.buffer));
    let broadcaster = Arc::new(EventBroadcaster::new(registry));

    let chat_model = GroqChatModel::from_config(&cfg.ai)?.map(|m| Arc::new(m) as Arc<dyn ChatModel>);
    let video_provider =
        ZoomClient::from_config(&cfg.video)?.map(|c| Arc::new(c) as Arc<dyn VideoConferencing>);

    Ok(AppState {
        config: Arc::new(cfg.clone()),
        audit: AuditTrail::new(storage.clone()),
        storage,
        auth,
        cipher,
        broadcaster,
        triage: Arc::new(TriageAssistant::new(chat_model)),
        ocr: Arc::new(OcrService::from_config(&cfg.ocr)),
        video: Arc::new(VideoService::new(video_provider)),
        catalog: Arc::new(MedicineCatalog::load(&cfg.pharmacy.catalog_path)),
        orders: Arc::new(OrderBook::new()),
    })
}

/// Assembles the router and middleware stack around `state`.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;
    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/ws", get(realtime::ws_handler))
        .nest("/auth", routes::auth::router())
        .nest("/patient", routes::patient::router())
        .nest("/admin", routes::admin::router())
        .nest("/pharmacy", routes::pharmacy::router())
        .with_state(state)
        // Middleware stack (order: compression/cors/trace -> request id -> body limit)
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
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: std::time::Duration, span: &tracing::Span| {
                        span.record("http.status_code", tracing::field::display(res.status().as_u16()));
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        // Outside the trace layer so the span sees the id.
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

/// Builds state and router from configuration.
pub async fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    Ok(build_router(build_state(cfg).await?))
}

pub struct CarehubServer {
    addr: SocketAddr,
    app: Router,
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

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub async fn build(self) -> anyhow::Result<CarehubServer> {
        let app = build_app(&self.config).await?;
        Ok(CarehubServer {
            addr: self.addr,
            app,
        })
    }
}

impl CarehubServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
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
