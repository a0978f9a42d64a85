pub mod jwt_auth;
pub mod session_auth;
