use serde::{Deserialize, Serialize};

use crate::errors::{AppError, ValidationErrors};

/// Identity carried by the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPayload {
    /// Unix seconds.
    pub exp: i64,
    pub user: SessionUser,
}

/// PKCE verifier and CSRF state held between login start and callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTmp {
    pub state: String,
    pub code_verifier: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub format: Option<String>,
}
impl CallbackQuery {
    pub fn wants_json(&self) -> bool {
        self.format.as_deref() == Some("json")
    }

    /// Returns `(code, state)` when both are present and non-empty.
    pub fn validate(&self) -> Result<(String, String), AppError> {
        let mut errors = ValidationErrors::new();
        let code = self.code.as_deref().filter(|c| !c.is_empty());
        let state = self.state.as_deref().filter(|s| !s.is_empty());

        if code.is_none() {
            errors.add("code", "Missing authorization code");
        }
        if state.is_none() {
            errors.add("state", "Missing state");
        }

        match (code, state) {
            (Some(code), Some(state)) => Ok((code.to_string(), state.to_string())),
            _ => Err(AppError::Validation(errors)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyIdTokenRequest {
    pub provider: String,
    pub id_token: String,
    pub nonce: String,
}
impl VerifyIdTokenRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = ValidationErrors::new();

        if self.provider != "google" {
            errors.add("provider", "Unsupported provider");
        }
        if self.id_token.len() < 10 {
            errors.add("idToken", "ID token is too short");
        }
        if self.nonce.len() < 8 {
            errors.add("nonce", "Nonce must be at least 8 characters");
        }

        errors.into_result()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GoogleLoginResponse {
    pub ok: bool,
    pub user: SessionUser,
}
