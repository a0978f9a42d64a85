use axum::{
    routing::{get, post},
    Router,
};

use crate::{
    handlers::google::{callback, login, logout, verify},
    http_server::AppState,
};

pub fn google_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/google/login", get(login))
        .route("/auth/google/callback", get(callback))
        .route("/auth/google/verify", post(verify))
        .route("/auth/google/logout", post(logout))
}
