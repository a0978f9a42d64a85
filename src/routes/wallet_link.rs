use axum::{
    handler::Handler,
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;

use crate::{
    handlers::wallet_link::{link_wallet, me, me_by_wallet, unlink_by_session, unlink_by_token},
    http_server::AppState,
    middlewares::{jwt_auth::jwt_auth, session_auth::session_auth},
};

pub fn wallet_link_routes(state: AppState) -> Router<AppState> {
    let bearer = || middleware::from_fn_with_state(state.clone(), jwt_auth);
    let session = || middleware::from_fn_with_state(state.clone(), session_auth);

    Router::new()
        .route("/auth/google/me", get(me.layer(session())))
        .route("/auth/google/me-by-wallet", get(me_by_wallet.layer(bearer())))
        // Bearer is checked first, then the session
        .route(
            "/auth/google/link-wallet",
            post(link_wallet.layer(ServiceBuilder::new().layer(bearer()).layer(session()))),
        )
        .route("/auth/google/unlink", post(unlink_by_session.layer(session())))
        .route("/auth/google/unlink-by-token", post(unlink_by_token.layer(bearer())))
}
