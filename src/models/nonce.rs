use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rand::{distr::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

pub const NONCE_LENGTH: usize = 17;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NonceRecord {
    pub address: String,
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
}

impl NonceRecord {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            nonce: generate_nonce(),
            issued_at: now_millis(),
        }
    }

    pub fn issued_at_rfc3339(&self) -> String {
        format_issued_at(&self.issued_at)
    }

    pub fn is_live(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        self.issued_at > now - ttl
    }
}

pub fn generate_nonce() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LENGTH)
        .map(char::from)
        .collect()
}

/// Current time truncated to milliseconds, the precision kept in the signed message.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

pub fn format_issued_at(issued_at: &DateTime<Utc>) -> String {
    issued_at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
