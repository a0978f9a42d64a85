use axum::Router;

use crate::{
    http_server::AppState,
    routes::{google::google_routes, wallet::wallet_routes, wallet_link::wallet_link_routes},
};

pub mod google;
pub mod wallet;
pub mod wallet_link;

pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(wallet_routes(state.clone()))
        .merge(google_routes())
        .merge(wallet_link_routes(state))
}
