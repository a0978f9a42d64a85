pub mod auth_events;
pub mod google_gateway;
pub mod id_token_verifier;
pub mod session_service;
pub mod signature_service;
pub mod siwe_service;
pub mod token_service;
