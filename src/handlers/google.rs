use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tower_cookies::Cookies;
use tracing::{debug, info};

use crate::{
    errors::{AppError, AppResult},
    http_server::AppState,
    models::session::{CallbackQuery, GoogleLoginResponse, OAuthTmp, SessionUser, VerifyIdTokenRequest},
    services::{
        auth_events::AuthEvent,
        google_gateway::{decode_id_token_user, Pkce},
        session_service::{SealError, OAUTH_TMP_COOKIE},
    },
};

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Starts the authorization-code flow with PKCE.
pub async fn login(State(state): State<AppState>, cookies: Cookies) -> AppResult<Response> {
    let pkce = Pkce::generate();
    let authorization_url = state.oauth.authorization_url(&pkce)?;

    let tmp = OAuthTmp {
        state: pkce.state,
        code_verifier: pkce.code_verifier,
    };
    cookies.add(state.sessions.oauth_tmp(&tmp)?);

    Ok(found(&authorization_url))
}

pub async fn callback(
    State(state): State<AppState>,
    cookies: Cookies,
    query: Result<Query<CallbackQuery>, QueryRejection>,
) -> AppResult<Response> {
    // The temp cookie is single use whatever the outcome
    let sealed_tmp = cookies.get(OAUTH_TMP_COOKIE).map(|c| c.value().to_string());
    cookies.add(state.sessions.clear_oauth_tmp());

    let Query(query) = query?;
    let (code, returned_state) = query.validate()?;

    let sealed_tmp = sealed_tmp.ok_or(AppError::OAuthState("invalid_state"))?;
    let tmp = state.sessions.read_oauth_tmp(&sealed_tmp).map_err(|e| match e {
        SealError::Malformed | SealError::BadSignature => AppError::OAuthState("invalid_signature"),
        SealError::Decode | SealError::Encode(_) => AppError::OAuthState("invalid_state"),
    })?;

    if tmp.state != returned_state {
        return Err(AppError::OAuthState("state_mismatch"));
    }

    let tokens = state.oauth.exchange_code(&code, &tmp.code_verifier).await?;
    let id_token = tokens
        .id_token
        .ok_or_else(|| AppError::Upstream("token response carried no id_token".to_string()))?;
    let user = decode_id_token_user(&id_token)?;

    start_session(&state, &cookies, &user)?;

    if query.wants_json() {
        return Ok(Json(GoogleLoginResponse { ok: true, user }).into_response());
    }

    Ok(found(&state.config.google.post_login_redirect))
}

/// Signs in with an ID token obtained by the client itself.
pub async fn verify(
    State(state): State<AppState>,
    cookies: Cookies,
    payload: Result<Json<VerifyIdTokenRequest>, JsonRejection>,
) -> AppResult<Json<GoogleLoginResponse>> {
    let Json(body) = payload?;
    body.validate()?;

    let claims = state.id_tokens.verify(&body.id_token, Some(body.nonce.as_str())).await?;
    let user = SessionUser::from(claims);

    start_session(&state, &cookies, &user)?;

    Ok(Json(GoogleLoginResponse { ok: true, user }))
}

pub async fn logout(State(state): State<AppState>, cookies: Cookies) -> Response {
    cookies.add(state.sessions.clear());
    state.events.publish(AuthEvent::Logout);
    debug!("Session cleared");

    found("/")
}

fn start_session(state: &AppState, cookies: &Cookies, user: &SessionUser) -> AppResult<()> {
    cookies.add(state.sessions.issue(user)?);

    info!("Google session started for {}", user.sub);
    state.events.publish(AuthEvent::GoogleLogin { sub: user.sub.clone() });

    Ok(())
}
