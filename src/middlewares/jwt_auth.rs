use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use tracing::debug;

use crate::{
    errors::AppError,
    http_server::AppState,
    models::auth::WalletIdentity,
    utils::{eth_address_validator::normalize_eth_address, jwt::extract_bearer_token},
};

/// Requires a valid bearer token and attaches the wallet it was issued to.
pub async fn jwt_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Result<impl IntoResponse, AppError> {
    let token = extract_bearer_token(req.headers()).ok_or(AppError::Authentication("unauthorized"))?;

    let claims = state.tokens.verify(&token).map_err(|e| {
        debug!("Bearer token rejected: {}", e);
        AppError::Authentication("unauthorized")
    })?;

    let address = normalize_eth_address(&claims.sub).map_err(|_| AppError::Authentication("unauthorized"))?;

    req.extensions_mut().insert(WalletIdentity { address, token, claims });
    Ok(next.run(req).await)
}
