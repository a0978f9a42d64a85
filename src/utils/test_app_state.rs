use crate::{
    config::{Config, StorageBackend},
    db_persistence::DbPersistence,
    http_server::AppState,
    models::{auth::TokenClaims, session::SessionUser},
    services::{
        google_gateway::{GoogleGateway, OAuthGateway},
        session_service::SESSION_COOKIE,
        signature_service::ContractWalletVerifier,
    },
};
use axum::response::Response;
use jsonwebtoken::{encode, EncodingKey, Header};
use std::sync::Arc;

/// Default configuration on the in-memory backend.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.storage.backend = StorageBackend::Memory;
    config.google.client_id = "test-client-id.apps.googleusercontent.com".to_string();
    config
}

pub fn create_test_app_state() -> AppState {
    create_test_app_state_with(test_config(), None, None)
}

pub fn create_test_app_state_with(
    config: Config,
    oauth: Option<Arc<dyn OAuthGateway>>,
    contract_verifier: Option<Arc<dyn ContractWalletVerifier>>,
) -> AppState {
    let db = DbPersistence::in_memory(&config);
    let oauth = oauth.unwrap_or_else(|| {
        Arc::new(GoogleGateway::new(config.google.clone()).expect("Failed to build Google gateway"))
    });

    AppState::build(config, db, oauth, contract_verifier)
}

pub fn generate_test_token(secret: &str, sub: &str) -> String {
    let claims = TokenClaims {
        sub: sub.to_string(),
        iat: 1,          // Just a valid past timestamp
        exp: 9999999999, // Far future timestamp
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("Failed to sign token")
}

pub fn test_user() -> SessionUser {
    SessionUser {
        sub: "109876543210".to_string(),
        email: Some("user@example.com".to_string()),
        email_verified: Some(true),
        name: Some("Test User".to_string()),
        picture: Some("https://example.com/avatar.png".to_string()),
    }
}

/// `Cookie` header value carrying a live session for `user`.
pub fn session_cookie_header(state: &AppState, user: &SessionUser) -> String {
    let cookie = state.sessions.issue(user).expect("Failed to seal session");
    format!("{}={}", SESSION_COOKIE, cookie.value())
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

/// All `Set-Cookie` headers of `response`.
pub fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(axum::http::header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(str::to_string)
        .collect()
}
