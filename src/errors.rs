use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::{
    db_persistence::DbError,
    services::{
        google_gateway::OAuthError, id_token_verifier::IdTokenError, session_service::SealError,
        siwe_service::SiweError,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(ValidationErrors),
    #[error("{0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Authentication(&'static str),
    #[error("Invalid signature or nonce")]
    Signature,
    #[error("ID token rejected: {0}")]
    IdToken(#[from] IdTokenError),
    #[error("OAuth state rejected: {0}")]
    OAuthState(&'static str),
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),
    #[error("No account linked to {wallet_address}")]
    NotLinked { wallet_address: String },
    #[error("Upstream error: {0}")]
    Upstream(String),
    #[error("Database error: {0}")]
    Database(#[from] DbError),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Server error: {0}")]
    Server(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Authentication(_) | AppError::Signature => StatusCode::UNAUTHORIZED,
            AppError::IdToken(err) => err.status_code(),
            AppError::OAuthState(_) | AppError::TokenExchange(_) => StatusCode::BAD_REQUEST,
            AppError::NotLinked { .. } => StatusCode::NOT_FOUND,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(DbError::Conflict(_)) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Config(_) | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::Authentication(code) => *code,
            AppError::Signature => "invalid_signature_or_nonce",
            AppError::IdToken(err) => err.code(),
            AppError::OAuthState(code) => *code,
            AppError::TokenExchange(_) => "token_exchange_failed",
            AppError::NotLinked { .. } => "no_account_linked",
            AppError::Upstream(_) => "upstream_error",
            AppError::Database(DbError::Conflict(_)) => "conflict",
            AppError::Database(_) => "database_error",
            AppError::Config(_) => "configuration_error",
            AppError::Server(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error = self.error_code();

        if status.is_server_error() {
            tracing::error!(error, "{}", self);
        } else if matches!(status, StatusCode::UNAUTHORIZED) {
            tracing::warn!(error, "{}", self);
        }

        let body = match self {
            AppError::Validation(errors) => json!({
                "error": error,
                "message": "Request validation failed",
                "errors": errors.errors,
            }),
            AppError::NotLinked { wallet_address } => json!({
                "ok": false,
                "error": error,
                "wallet_address": wallet_address,
            }),
            AppError::BadRequest(message) | AppError::TokenExchange(message) => json!({
                "error": error,
                "message": message,
            }),
            // Internal details stay in the logs
            AppError::Database(_) | AppError::Config(_) | AppError::Server(_) => json!({
                "error": error,
                "message": "Internal server error",
            }),
            _ => json!({ "error": error }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<OAuthError> for AppError {
    fn from(err: OAuthError) -> Self {
        match err {
            OAuthError::TokenExchange(message) => AppError::TokenExchange(message),
            OAuthError::Transport(e) => AppError::Upstream(e.to_string()),
            OAuthError::MalformedResponse(message) => AppError::Upstream(message),
        }
    }
}

impl From<SiweError> for AppError {
    fn from(err: SiweError) -> Self {
        match err {
            SiweError::Storage(e) => AppError::Database(e),
            // Callers cannot tell a stale nonce from a bad signature
            SiweError::NonceNotFound | SiweError::InvalidSignature | SiweError::Signature(_) => AppError::Signature,
        }
    }
}

impl From<SealError> for AppError {
    fn from(err: SealError) -> Self {
        AppError::Server(err.to_string())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

// Collection of validation errors
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}
impl ValidationErrors {
    pub fn new() -> Self {
        ValidationErrors { errors: Vec::new() }
    }

    pub fn add(&mut self, field: &str, error: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: error.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn signature_errors_are_uniform() {
        let (status, body) = body_json(AppError::Signature).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "error": "invalid_signature_or_nonce" }));
    }

    #[tokio::test]
    async fn validation_errors_list_fields() {
        let mut errors = ValidationErrors::new();
        errors.add("address", "Invalid Ethereum address");
        let (status, body) = body_json(AppError::Validation(errors)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
        assert_eq!(body["errors"][0]["field"], "address");
    }

    #[tokio::test]
    async fn not_linked_carries_wallet_address() {
        let (status, body) = body_json(AppError::NotLinked {
            wallet_address: "0xabc".to_string(),
        })
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            body,
            json!({ "ok": false, "error": "no_account_linked", "wallet_address": "0xabc" })
        );
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let (status, body) = body_json(AppError::Server("pool exhausted".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
    }

    #[tokio::test]
    async fn jwks_outage_maps_to_bad_gateway() {
        let (status, body) = body_json(AppError::IdToken(IdTokenError::JwksUnavailable("timeout".into()))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "jwks_unavailable");
    }

    #[test]
    fn siwe_failures_collapse_except_storage() {
        assert!(matches!(AppError::from(SiweError::NonceNotFound), AppError::Signature));
        assert!(matches!(AppError::from(SiweError::InvalidSignature), AppError::Signature));
        assert!(matches!(
            AppError::from(SiweError::Storage(DbError::Misconfigured("x".into()))),
            AppError::Database(_)
        ));
    }
}
