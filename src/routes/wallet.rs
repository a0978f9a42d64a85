use axum::{
    handler::Handler,
    middleware,
    routing::{get, post},
    Router,
};

use crate::{
    handlers::wallet::{issue_nonce, login, validate_token},
    http_server::AppState,
    middlewares::jwt_auth,
};

pub fn wallet_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/nonce", post(issue_nonce))
        .route("/login", post(login))
        .route(
            "/validate-token",
            get(validate_token.layer(middleware::from_fn_with_state(state, jwt_auth::jwt_auth))),
        )
}
