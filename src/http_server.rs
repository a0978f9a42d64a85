use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware,
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::warn;

use crate::{
    config::Config,
    db_persistence::DbPersistence,
    metrics::{metrics_handler, track_metrics, Metrics},
    routes::api_routes,
    services::{
        auth_events::AuthEventBus,
        google_gateway::OAuthGateway,
        id_token_verifier::IdTokenVerifier,
        session_service::SessionService,
        signature_service::{ContractWalletVerifier, SignatureService},
        siwe_service::SiweService,
        token_service::TokenService,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },
    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPersistence>,
    pub config: Arc<Config>,
    pub metrics: Arc<Metrics>,
    pub siwe: Arc<SiweService>,
    pub tokens: Arc<TokenService>,
    pub sessions: Arc<SessionService>,
    pub oauth: Arc<dyn OAuthGateway>,
    pub id_tokens: Arc<IdTokenVerifier>,
    pub events: AuthEventBus,
}

impl AppState {
    pub fn build(
        config: Config,
        db: DbPersistence,
        oauth: Arc<dyn OAuthGateway>,
        contract_verifier: Option<Arc<dyn ContractWalletVerifier>>,
    ) -> Self {
        let siwe = SiweService::new(
            config.siwe.clone(),
            db.nonces.clone(),
            SignatureService::new(contract_verifier),
        );
        let tokens = TokenService::new(&config.jwt.secret, config.get_jwt_expiration());
        let sessions = SessionService::new(&config);
        let id_tokens = IdTokenVerifier::new(&config.google, oauth.clone());

        Self {
            db: Arc::new(db),
            config: Arc::new(config),
            metrics: Arc::new(Metrics::new()),
            siwe: Arc::new(siwe),
            tokens: Arc::new(tokens),
            sessions: Arc::new(sessions),
            oauth,
            id_tokens: Arc::new(id_tokens),
            events: AuthEventBus::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub service: String,
    pub version: String,
    pub storage: String,
    pub chain_id: u64,
    pub timestamp: String,
}

/// Create the HTTP server router
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.allowed_origins);
    let request_timeout = state.config.get_request_timeout();

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .merge(api_routes(state.clone()))
        .layer(middleware::from_fn(track_metrics))
        .layer(CookieManagerLayer::new())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout))
                .layer(cors),
        )
        .with_state(state)
}

/// Credentialed CORS for the configured origins, permissive when none are configured.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        healthy: true,
        service: crate::NAME.to_string(),
        version: crate::VERSION.to_string(),
        storage: state.db.backend_name().to_string(),
        chain_id: state.siwe.chain_id(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub async fn start_server(
    state: AppState,
    bind_address: &str,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), HttpServerError> {
    let app = create_router(state);

    tracing::info!("Starting HTTP server on {}", bind_address);

    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .map_err(|source| HttpServerError::Bind {
            address: bind_address.to_string(),
            source,
        })?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    Ok(())
}
