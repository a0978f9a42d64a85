//! # Wallet Auth Library
//!
//! Sign-in service for Ethereum wallets (EIP-4361 / SIWE with EIP-1271
//! fallback) and Google accounts (OAuth 2.0 authorization code with PKCE,
//! or client-obtained ID tokens), plus the binding between the two.

pub mod args;
pub mod config;
pub mod db_persistence;
pub mod errors;
pub mod handlers;
pub mod http_server;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use db_persistence::DbPersistence;
pub use http_server::{create_router, start_server, AppState};

// Re-export errors
pub use db_persistence::DbError;
pub use errors::{AppError, AppResult};
pub use http_server::HttpServerError;
pub use services::{
    google_gateway::OAuthError, id_token_verifier::IdTokenError, signature_service::SignatureError,
    siwe_service::SiweError, token_service::TokenError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get the library version
pub fn version() -> &'static str {
    VERSION
}

/// Get the library name
pub fn name() -> &'static str {
    NAME
}
