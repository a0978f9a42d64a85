use axum::{extract::State, Extension, Json};
use tracing::info;

use crate::{
    errors::{AppError, AppResult},
    http_server::AppState,
    models::{
        auth::WalletIdentity,
        session::SessionUser,
        wallet_link::{LinkWalletResponse, MeByWalletResponse, MeResponse, Profile, UnlinkResponse, WalletLink},
    },
    services::auth_events::AuthEvent,
};

pub async fn me(State(state): State<AppState>, Extension(user): Extension<SessionUser>) -> AppResult<Json<MeResponse>> {
    let link = state.db.wallet_links.find_by_sub(&user.sub).await?;
    let profile = Profile::merged(link.as_ref(), &user);

    Ok(Json(MeResponse {
        ok: true,
        wallet_address: link.as_ref().map(|l| l.wallet_address.clone()),
        token: link.as_ref().map(|l| l.token.clone()),
        linked_at: link.as_ref().map(|l| l.linked_at),
        profile,
        user,
    }))
}

pub async fn me_by_wallet(
    State(state): State<AppState>,
    Extension(identity): Extension<WalletIdentity>,
) -> AppResult<Json<MeByWalletResponse>> {
    let link = state
        .db
        .wallet_links
        .find_by_wallet(&identity.address)
        .await?
        .ok_or_else(|| AppError::NotLinked {
            wallet_address: identity.address.clone(),
        })?;

    Ok(Json(MeByWalletResponse {
        ok: true,
        profile: link.profile(),
        wallet_address: link.wallet_address,
        google_sub: link.google_sub,
        token: link.token,
        linked_at: link.linked_at,
    }))
}

/// Binds the bearer's wallet to the session's Google identity, moving it off any previous owner.
pub async fn link_wallet(
    State(state): State<AppState>,
    Extension(identity): Extension<WalletIdentity>,
    Extension(user): Extension<SessionUser>,
) -> AppResult<Json<LinkWalletResponse>> {
    let link = WalletLink::new(&user, &identity.address, &identity.token);
    let stored = state.db.wallet_links.link(&link).await?;

    info!("Linked {} to Google account {}", stored.wallet_address, stored.google_sub);
    state.events.publish(AuthEvent::WalletLinked {
        sub: stored.google_sub.clone(),
        wallet_address: stored.wallet_address.clone(),
    });

    Ok(Json(LinkWalletResponse {
        ok: true,
        profile: Profile::merged(Some(&stored), &user),
        wallet_address: stored.wallet_address,
        token: stored.token,
        linked_at: stored.linked_at,
    }))
}

pub async fn unlink_by_session(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
) -> AppResult<Json<UnlinkResponse>> {
    let deleted = state.db.wallet_links.unlink_by_sub(&user.sub).await?;
    state.events.publish(AuthEvent::WalletUnlinked { deleted });

    Ok(Json(UnlinkResponse { ok: true, deleted }))
}

pub async fn unlink_by_token(
    State(state): State<AppState>,
    Extension(identity): Extension<WalletIdentity>,
) -> AppResult<Json<UnlinkResponse>> {
    let deleted = state.db.wallet_links.unlink_by_wallet(&identity.address).await?;
    state.events.publish(AuthEvent::WalletUnlinked { deleted });

    Ok(Json(UnlinkResponse { ok: true, deleted }))
}
