use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    config::GoogleConfig,
    metrics::track_provider_call,
    models::session::SessionUser,
    utils::crypto::{b64url_decode, b64url_encode, random_token, sha256},
};

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("token exchange failed: {0}")]
    TokenExchange(String),
    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

/// State and verifier for one authorization-code round trip.
#[derive(Debug, Clone)]
pub struct Pkce {
    pub state: String,
    pub code_verifier: String,
    pub code_challenge: String,
}

impl Pkce {
    pub fn generate() -> Self {
        let state = random_token(16);
        let code_verifier = random_token(32);
        let code_challenge = b64url_encode(sha256(&code_verifier));
        Self {
            state,
            code_verifier,
            code_challenge,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub id_token: Option<String>,
    pub expires_in: Option<u64>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdTokenProfile {
    sub: Option<String>,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OAuthGateway: Send + Sync {
    fn authorization_url(&self, pkce: &Pkce) -> Result<String, OAuthError>;

    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<TokenResponse, OAuthError>;

    async fn fetch_jwks(&self) -> Result<JwkSet, OAuthError>;
}

pub struct GoogleGateway {
    client: reqwest::Client,
    settings: GoogleConfig,
}

impl GoogleGateway {
    pub fn new(settings: GoogleConfig) -> Result<Self, OAuthError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(settings.http_timeout_seconds))
            .build()?;

        Ok(Self { client, settings })
    }

    async fn request_tokens(&self, code: &str, code_verifier: &str) -> Result<TokenResponse, OAuthError> {
        let mut form = vec![
            ("code", code),
            ("client_id", self.settings.client_id.as_str()),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
            ("code_verifier", code_verifier),
        ];
        if !self.settings.client_secret.is_empty() {
            form.push(("client_secret", self.settings.client_secret.as_str()));
        }

        let response = self.client.post(&self.settings.token_url).form(&form).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ProviderError>(&body)
                .ok()
                .and_then(|e| e.error_description.or(e.error))
                .unwrap_or(body);
            warn!("Token exchange rejected with {}: {}", status, detail);
            return Err(OAuthError::TokenExchange(format!("{} {}", status.as_u16(), detail)));
        }

        let tokens = response.json::<TokenResponse>().await?;
        debug!("Token exchange succeeded");
        Ok(tokens)
    }

    async fn request_jwks(&self) -> Result<JwkSet, OAuthError> {
        let jwks = self
            .client
            .get(&self.settings.jwks_url)
            .send()
            .await?
            .error_for_status()?
            .json::<JwkSet>()
            .await?;

        debug!("Fetched {} signing keys", jwks.keys.len());
        Ok(jwks)
    }
}

#[async_trait]
impl OAuthGateway for GoogleGateway {
    fn authorization_url(&self, pkce: &Pkce) -> Result<String, OAuthError> {
        let mut params = vec![
            ("response_type", "code"),
            ("client_id", self.settings.client_id.as_str()),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
            ("scope", self.settings.scope.as_str()),
            ("code_challenge", pkce.code_challenge.as_str()),
            ("code_challenge_method", "S256"),
            ("state", pkce.state.as_str()),
        ];
        if let Some(access_type) = &self.settings.access_type {
            params.push(("access_type", access_type.as_str()));
        }
        if let Some(prompt) = &self.settings.prompt {
            params.push(("prompt", prompt.as_str()));
        }

        let url = url::Url::parse_with_params(&self.settings.auth_url, &params)
            .map_err(|e| OAuthError::MalformedResponse(format!("invalid auth_url: {}", e)))?;

        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<TokenResponse, OAuthError> {
        track_provider_call("token_exchange", self.request_tokens(code, code_verifier)).await
    }

    async fn fetch_jwks(&self) -> Result<JwkSet, OAuthError> {
        track_provider_call("jwks_fetch", self.request_jwks()).await
    }
}

/// Reads the identity claims of an ID token received directly from the token endpoint.
/// The signature is not checked: the token came over the authenticated back channel.
pub fn decode_id_token_user(id_token: &str) -> Result<SessionUser, OAuthError> {
    let payload = id_token
        .split('.')
        .nth(1)
        .ok_or_else(|| OAuthError::MalformedResponse("id_token is not a JWT".to_string()))?;

    let bytes =
        b64url_decode(payload).map_err(|e| OAuthError::MalformedResponse(format!("id_token payload: {}", e)))?;
    let profile: IdTokenProfile = serde_json::from_slice(&bytes)
        .map_err(|e| OAuthError::MalformedResponse(format!("id_token payload: {}", e)))?;

    let sub = profile
        .sub
        .filter(|s| !s.is_empty())
        .ok_or_else(|| OAuthError::MalformedResponse("id_token has no sub".to_string()))?;

    Ok(SessionUser {
        sub,
        email: profile.email,
        email_verified: profile.email_verified,
        name: profile.name,
        picture: profile.picture,
    })
}
