use serde::{de::DeserializeOwned, Serialize};
use tower_cookies::{
    cookie::{time::Duration, SameSite},
    Cookie,
};

use crate::{
    config::{Config, SameSitePolicy},
    models::session::{OAuthTmp, SessionPayload, SessionUser},
    utils::crypto::{b64url_decode, b64url_encode, hmac_sign, hmac_verify},
};

pub const SESSION_COOKIE: &str = "session";
pub const OAUTH_TMP_COOKIE: &str = "oauth_tmp";
pub const OAUTH_TMP_MAX_AGE_SECONDS: i64 = 600;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SealError {
    #[error("Sealed value has no signature")]
    Malformed,
    #[error("Signature mismatch")]
    BadSignature,
    #[error("Sealed payload could not be decoded")]
    Decode,
    #[error("Payload could not be encoded: {0}")]
    Encode(String),
}

impl From<SameSitePolicy> for SameSite {
    fn from(policy: SameSitePolicy) -> Self {
        match policy {
            SameSitePolicy::Lax => SameSite::Lax,
            SameSitePolicy::Strict => SameSite::Strict,
            SameSitePolicy::None => SameSite::None,
        }
    }
}

/// HMAC-signed cookies: `base64url(json).signature`.
#[derive(Debug, Clone)]
pub struct SessionService {
    secret: Vec<u8>,
    ttl_seconds: i64,
    same_site: SameSitePolicy,
    secure: bool,
    domain: Option<String>,
}

impl SessionService {
    pub fn new(config: &Config) -> Self {
        let same_site = config.session.same_site;
        Self {
            secret: config.session.cookie_secret.as_bytes().to_vec(),
            ttl_seconds: config.get_session_ttl().num_seconds(),
            same_site,
            // Browsers drop SameSite=None cookies that are not Secure
            secure: config.is_https() || same_site == SameSitePolicy::None,
            domain: config.session.cookie_domain.clone(),
        }
    }

    pub fn seal<T: Serialize>(&self, value: &T) -> Result<String, SealError> {
        let json = serde_json::to_vec(value).map_err(|e| SealError::Encode(e.to_string()))?;
        let payload = b64url_encode(json);
        let signature = hmac_sign(&self.secret, &payload);
        Ok(format!("{}.{}", payload, signature))
    }

    pub fn open<T: DeserializeOwned>(&self, raw: &str) -> Result<T, SealError> {
        let (payload, signature) = raw.split_once('.').ok_or(SealError::Malformed)?;

        if !hmac_verify(&self.secret, payload, signature) {
            return Err(SealError::BadSignature);
        }

        let json = b64url_decode(payload).map_err(|_| SealError::Decode)?;
        serde_json::from_slice(&json).map_err(|_| SealError::Decode)
    }

    pub fn issue(&self, user: &SessionUser) -> Result<Cookie<'static>, SealError> {
        let payload = SessionPayload {
            exp: chrono::Utc::now().timestamp() + self.ttl_seconds,
            user: user.clone(),
        };
        let value = self.seal(&payload)?;
        Ok(self.build(SESSION_COOKIE, value, self.ttl_seconds, self.same_site))
    }

    /// Any failure reads as "no session".
    pub fn read(&self, raw: &str) -> Option<SessionUser> {
        let payload: SessionPayload = self.open(raw).ok()?;
        if payload.exp <= chrono::Utc::now().timestamp() {
            return None;
        }
        Some(payload.user)
    }

    pub fn clear(&self) -> Cookie<'static> {
        self.build(SESSION_COOKIE, String::new(), 0, self.same_site)
    }

    pub fn oauth_tmp(&self, tmp: &OAuthTmp) -> Result<Cookie<'static>, SealError> {
        let value = self.seal(tmp)?;
        Ok(self.build(OAUTH_TMP_COOKIE, value, OAUTH_TMP_MAX_AGE_SECONDS, SameSitePolicy::Lax))
    }

    pub fn read_oauth_tmp(&self, raw: &str) -> Result<OAuthTmp, SealError> {
        self.open(raw)
    }

    pub fn clear_oauth_tmp(&self) -> Cookie<'static> {
        self.build(OAUTH_TMP_COOKIE, String::new(), 0, SameSitePolicy::Lax)
    }

    fn build(&self, name: &'static str, value: String, max_age: i64, same_site: SameSitePolicy) -> Cookie<'static> {
        let mut builder = Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .same_site(same_site.into())
            .secure(self.secure)
            .max_age(Duration::seconds(max_age));

        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }

        builder.build()
    }
}
