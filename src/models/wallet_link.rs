use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};

use crate::models::session::SessionUser;

/// A Google identity bound to a single wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletLink {
    pub google_sub: String,
    pub wallet_address: String,
    pub token: String,
    /// Unix seconds.
    pub linked_at: i64,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl WalletLink {
    pub fn new(user: &SessionUser, wallet_address: &str, token: &str) -> Self {
        Self {
            google_sub: user.sub.clone(),
            wallet_address: wallet_address.to_string(),
            token: token.to_string(),
            linked_at: chrono::Utc::now().timestamp(),
            email: user.email.clone(),
            name: user.name.clone(),
            picture: user.picture.clone(),
        }
    }

    pub fn profile(&self) -> Profile {
        Profile {
            email: self.email.clone(),
            name: self.name.clone(),
            picture: self.picture.clone(),
        }
    }
}

impl<'r> FromRow<'r, PgRow> for WalletLink {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(WalletLink {
            google_sub: row.try_get("google_sub")?,
            wallet_address: row.try_get("wallet_address")?,
            token: row.try_get("token")?,
            linked_at: row.try_get("linked_at")?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            picture: row.try_get("picture")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl Profile {
    /// Stored values win; the session fills the gaps.
    pub fn merged(link: Option<&WalletLink>, user: &SessionUser) -> Self {
        let stored = link.map(WalletLink::profile).unwrap_or_default();
        Self {
            email: stored.email.or_else(|| user.email.clone()),
            name: stored.name.or_else(|| user.name.clone()),
            picture: stored.picture.or_else(|| user.picture.clone()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LinkWalletResponse {
    pub ok: bool,
    pub wallet_address: String,
    pub token: String,
    pub profile: Profile,
    pub linked_at: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub ok: bool,
    pub user: SessionUser,
    pub wallet_address: Option<String>,
    pub token: Option<String>,
    pub linked_at: Option<i64>,
    pub profile: Profile,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeByWalletResponse {
    pub ok: bool,
    pub wallet_address: String,
    pub google_sub: String,
    pub token: String,
    pub linked_at: i64,
    pub profile: Profile,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnlinkResponse {
    pub ok: bool,
    pub deleted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> SessionUser {
        SessionUser {
            sub: "google-sub-1".to_string(),
            email: Some("session@example.com".to_string()),
            email_verified: Some(true),
            name: Some("Session Name".to_string()),
            picture: None,
        }
    }

    #[test]
    fn profile_prefers_stored_values() {
        let mut link = WalletLink::new(&user(), "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045", "jwt");
        link.email = Some("stored@example.com".to_string());
        link.name = None;
        link.picture = Some("https://example.com/p.png".to_string());

        let profile = Profile::merged(Some(&link), &user());
        assert_eq!(profile.email.as_deref(), Some("stored@example.com"));
        assert_eq!(profile.name.as_deref(), Some("Session Name"));
        assert_eq!(profile.picture.as_deref(), Some("https://example.com/p.png"));
    }

    #[test]
    fn profile_falls_back_to_session_without_link() {
        let profile = Profile::merged(None, &user());
        assert_eq!(profile.email.as_deref(), Some("session@example.com"));
        assert_eq!(profile.picture, None);
    }
}
