pub mod auth;
pub mod nonce;
pub mod session;
pub mod wallet_link;
