use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::http::StatusCode;
use jsonwebtoken::{
    jwk::{AlgorithmParameters, Jwk, JwkSet},
    Algorithm, DecodingKey,
};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::{
    config::GoogleConfig, models::session::SessionUser, services::google_gateway::OAuthGateway,
    utils::crypto::b64url_decode,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdTokenError {
    #[error("malformed token")]
    MalformedToken,
    #[error("unsupported algorithm")]
    UnsupportedAlg,
    #[error("missing kid")]
    MissingKid,
    #[error("no signing key for kid")]
    KidNotFound,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("issuer not allowed")]
    InvalidIssuer,
    #[error("audience mismatch")]
    AudMismatch,
    #[error("nonce mismatch")]
    NonceMismatch,
    #[error("token expired")]
    TokenExpired,
    #[error("issued in the future")]
    InvalidIat,
    #[error("signing keys unavailable: {0}")]
    JwksUnavailable(String),
}

impl IdTokenError {
    pub fn code(&self) -> &'static str {
        match self {
            IdTokenError::MalformedToken => "malformed_token",
            IdTokenError::UnsupportedAlg => "unsupported_alg",
            IdTokenError::MissingKid => "missing_kid",
            IdTokenError::KidNotFound => "kid_not_found",
            IdTokenError::InvalidSignature => "invalid_signature",
            IdTokenError::InvalidIssuer => "invalid_issuer",
            IdTokenError::AudMismatch => "aud_mismatch",
            IdTokenError::NonceMismatch => "nonce_mismatch",
            IdTokenError::TokenExpired => "token_expired",
            IdTokenError::InvalidIat => "invalid_iat",
            IdTokenError::JwksUnavailable(_) => "jwks_unavailable",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            IdTokenError::JwksUnavailable(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenHeader {
    alg: Option<String>,
    kid: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleIdClaims {
    pub sub: String,
    pub iss: Option<String>,
    pub aud: Option<String>,
    pub exp: Option<i64>,
    pub iat: Option<i64>,
    pub nonce: Option<String>,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl From<GoogleIdClaims> for SessionUser {
    fn from(claims: GoogleIdClaims) -> Self {
        SessionUser {
            sub: claims.sub,
            email: claims.email,
            email_verified: claims.email_verified,
            name: claims.name,
            picture: claims.picture,
        }
    }
}

struct CacheEntry {
    jwks: JwkSet,
    fetched_at: Instant,
}

/// Provider signing keys, refetched only once the cached set is older than `ttl`.
pub struct JwksCache {
    gateway: Arc<dyn OAuthGateway>,
    ttl: Duration,
    cache: RwLock<Option<CacheEntry>>,
}

impl JwksCache {
    pub fn new(gateway: Arc<dyn OAuthGateway>, ttl: Duration) -> Self {
        Self {
            gateway,
            ttl,
            cache: RwLock::new(None),
        }
    }

    async fn get(&self) -> Result<JwkSet, IdTokenError> {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = &*cache {
                if entry.fetched_at.elapsed() < self.ttl {
                    return Ok(entry.jwks.clone());
                }
            }
        }

        let mut cache = self.cache.write().await;
        // Another request may have refreshed it while we waited for the lock
        if let Some(entry) = &*cache {
            if entry.fetched_at.elapsed() < self.ttl {
                return Ok(entry.jwks.clone());
            }
        }

        let jwks = self.gateway.fetch_jwks().await.map_err(|e| {
            warn!("JWKS fetch failed: {}", e);
            IdTokenError::JwksUnavailable(e.to_string())
        })?;

        *cache = Some(CacheEntry {
            jwks: jwks.clone(),
            fetched_at: Instant::now(),
        });

        Ok(jwks)
    }

    pub async fn find(&self, kid: &str) -> Result<Jwk, IdTokenError> {
        let jwks = self.get().await?;
        jwks.find(kid).cloned().ok_or(IdTokenError::KidNotFound)
    }
}

pub struct IdTokenVerifier {
    jwks: JwksCache,
    client_id: String,
    allowed_issuers: Vec<String>,
    clock_skew: i64,
}

impl IdTokenVerifier {
    pub fn new(settings: &GoogleConfig, gateway: Arc<dyn OAuthGateway>) -> Self {
        Self {
            jwks: JwksCache::new(gateway, Duration::from_secs(settings.jwks_cache_seconds)),
            client_id: settings.client_id.clone(),
            allowed_issuers: settings.allowed_issuers.clone(),
            clock_skew: settings.clock_skew_seconds,
        }
    }

    pub async fn verify(&self, id_token: &str, expected_nonce: Option<&str>) -> Result<GoogleIdClaims, IdTokenError> {
        let parts: Vec<&str> = id_token.split('.').collect();
        let [header_b64, payload_b64, signature_b64] = parts[..] else {
            return Err(IdTokenError::MalformedToken);
        };

        let header: TokenHeader = decode_segment(header_b64)?;
        if header.alg.as_deref() != Some("RS256") {
            return Err(IdTokenError::UnsupportedAlg);
        }
        let kid = header.kid.ok_or(IdTokenError::MissingKid)?;

        let jwk = self.jwks.find(&kid).await?;
        let key = decoding_key(&jwk)?;

        let signed = format!("{}.{}", header_b64, payload_b64);
        let valid = jsonwebtoken::crypto::verify(signature_b64, signed.as_bytes(), &key, Algorithm::RS256)
            .map_err(|_| IdTokenError::InvalidSignature)?;
        if !valid {
            return Err(IdTokenError::InvalidSignature);
        }

        let claims: GoogleIdClaims = decode_segment(payload_b64)?;
        self.check_claims(&claims, expected_nonce, chrono::Utc::now().timestamp())?;

        debug!("ID token verified for subject {}", claims.sub);
        Ok(claims)
    }

    fn check_claims(&self, claims: &GoogleIdClaims, expected_nonce: Option<&str>, now: i64) -> Result<(), IdTokenError> {
        match &claims.iss {
            Some(iss) if self.allowed_issuers.iter().any(|allowed| allowed == iss) => {}
            _ => return Err(IdTokenError::InvalidIssuer),
        }

        if claims.aud.as_deref() != Some(self.client_id.as_str()) {
            return Err(IdTokenError::AudMismatch);
        }

        if let Some(expected) = expected_nonce {
            if claims.nonce.as_deref() != Some(expected) {
                return Err(IdTokenError::NonceMismatch);
            }
        }

        match claims.exp {
            Some(exp) if now <= exp + self.clock_skew => {}
            _ => return Err(IdTokenError::TokenExpired),
        }

        if let Some(iat) = claims.iat {
            if iat > now + self.clock_skew {
                return Err(IdTokenError::InvalidIat);
            }
        }

        Ok(())
    }
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, IdTokenError> {
    let bytes = b64url_decode(segment).map_err(|_| IdTokenError::MalformedToken)?;
    serde_json::from_slice(&bytes).map_err(|_| IdTokenError::MalformedToken)
}

fn decoding_key(jwk: &Jwk) -> Result<DecodingKey, IdTokenError> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => {
            DecodingKey::from_rsa_components(&rsa.n, &rsa.e).map_err(|_| IdTokenError::KidNotFound)
        }
        _ => Err(IdTokenError::UnsupportedAlg),
    }
}
