use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use tracing::info;

use crate::{
    errors::{AppError, AppResult},
    http_server::AppState,
    models::auth::{LoginRequest, LoginResponse, NonceRequest, NonceResponse, ValidateTokenResponse, WalletIdentity},
    services::{auth_events::AuthEvent, siwe_service::SiweError},
    utils::eth_address_validator::parse_eth_address,
};

pub async fn issue_nonce(
    State(state): State<AppState>,
    payload: Result<Json<NonceRequest>, JsonRejection>,
) -> AppResult<Json<NonceResponse>> {
    let Json(body) = payload?;
    let address = body.validate()?;
    let address = parse_eth_address(&address).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let challenge = state.siwe.prepare(address).await?;

    Ok(Json(NonceResponse {
        nonce: challenge.nonce,
        issued_at: challenge.issued_at,
        message: challenge.message,
    }))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<LoginResponse>> {
    let Json(body) = payload?;
    let checksummed = body.validate()?;
    let address = parse_eth_address(&checksummed).map_err(|e| AppError::BadRequest(e.to_string()))?;

    if let Err(e) = state.siwe.validate(address, &body.signature, state.siwe.chain_id()).await {
        if !matches!(e, SiweError::Storage(_)) {
            state.events.publish(AuthEvent::WalletLoginRejected);
        }
        return Err(e.into());
    }

    let token = state
        .tokens
        .issue(&checksummed)
        .map_err(|e| AppError::Server(e.to_string()))?;

    info!("Issued wallet token for {}", checksummed);
    state.events.publish(AuthEvent::WalletLogin { address: checksummed });

    Ok(Json(LoginResponse { token }))
}

pub async fn validate_token(Extension(identity): Extension<WalletIdentity>) -> Json<ValidateTokenResponse> {
    let mut claims = identity.claims;
    claims.sub = identity.address;

    Json(ValidateTokenResponse { user: claims })
}
