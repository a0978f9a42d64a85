use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::Mutex;

use crate::{models::wallet_link::WalletLink, repositories::DbResult};

/// Google subject to wallet bindings. One wallet per subject, one subject per wallet.
#[async_trait]
pub trait WalletLinkStore: Send + Sync {
    /// Drops any binding that holds the wallet, then upserts on `google_sub`, atomically.
    async fn link(&self, link: &WalletLink) -> DbResult<WalletLink>;

    async fn find_by_sub(&self, google_sub: &str) -> DbResult<Option<WalletLink>>;

    async fn find_by_wallet(&self, wallet_address: &str) -> DbResult<Option<WalletLink>>;

    async fn unlink_by_sub(&self, google_sub: &str) -> DbResult<u64>;

    async fn unlink_by_wallet(&self, wallet_address: &str) -> DbResult<u64>;
}

#[derive(Clone, Debug)]
pub struct PgWalletLinkRepository {
    pool: PgPool,
}
impl PgWalletLinkRepository {
    pub fn new(pool: &PgPool) -> Self {
        Self { pool: pool.clone() }
    }
}

#[async_trait]
impl WalletLinkStore for PgWalletLinkRepository {
    async fn link(&self, link: &WalletLink) -> DbResult<WalletLink> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM google_web3_accounts WHERE LOWER(wallet_address) = LOWER($1)")
            .bind(&link.wallet_address)
            .execute(&mut *tx)
            .await?;

        let stored = sqlx::query_as::<_, WalletLink>(
            "
        INSERT INTO google_web3_accounts
            (google_sub, wallet_address, token, linked_at, email, name, picture)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (google_sub) DO UPDATE SET
            wallet_address = EXCLUDED.wallet_address,
            token = EXCLUDED.token,
            linked_at = EXCLUDED.linked_at,
            email = EXCLUDED.email,
            name = EXCLUDED.name,
            picture = EXCLUDED.picture
        RETURNING google_sub, wallet_address, token, linked_at, email, name, picture
        ",
        )
        .bind(&link.google_sub)
        .bind(&link.wallet_address)
        .bind(&link.token)
        .bind(link.linked_at)
        .bind(&link.email)
        .bind(&link.name)
        .bind(&link.picture)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(stored)
    }

    async fn find_by_sub(&self, google_sub: &str) -> DbResult<Option<WalletLink>> {
        let link = sqlx::query_as::<_, WalletLink>("SELECT * FROM google_web3_accounts WHERE google_sub = $1")
            .bind(google_sub)
            .fetch_optional(&self.pool)
            .await?;

        Ok(link)
    }

    async fn find_by_wallet(&self, wallet_address: &str) -> DbResult<Option<WalletLink>> {
        let link = sqlx::query_as::<_, WalletLink>(
            "SELECT * FROM google_web3_accounts WHERE LOWER(wallet_address) = LOWER($1)",
        )
        .bind(wallet_address)
        .fetch_optional(&self.pool)
        .await?;

        Ok(link)
    }

    async fn unlink_by_sub(&self, google_sub: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM google_web3_accounts WHERE google_sub = $1")
            .bind(google_sub)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn unlink_by_wallet(&self, wallet_address: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM google_web3_accounts WHERE LOWER(wallet_address) = LOWER($1)")
            .bind(wallet_address)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// Keyed by `google_sub`; one lock covers the whole reconciliation.
#[derive(Debug, Default)]
pub struct MemoryWalletLinkStore {
    links: Mutex<HashMap<String, WalletLink>>,
}

#[async_trait]
impl WalletLinkStore for MemoryWalletLinkStore {
    async fn link(&self, link: &WalletLink) -> DbResult<WalletLink> {
        let mut links = self.links.lock().await;
        links.retain(|_, existing| !existing.wallet_address.eq_ignore_ascii_case(&link.wallet_address));
        links.insert(link.google_sub.clone(), link.clone());
        Ok(link.clone())
    }

    async fn find_by_sub(&self, google_sub: &str) -> DbResult<Option<WalletLink>> {
        Ok(self.links.lock().await.get(google_sub).cloned())
    }

    async fn find_by_wallet(&self, wallet_address: &str) -> DbResult<Option<WalletLink>> {
        let links = self.links.lock().await;
        Ok(links
            .values()
            .find(|link| link.wallet_address.eq_ignore_ascii_case(wallet_address))
            .cloned())
    }

    async fn unlink_by_sub(&self, google_sub: &str) -> DbResult<u64> {
        Ok(self.links.lock().await.remove(google_sub).map_or(0, |_| 1))
    }

    async fn unlink_by_wallet(&self, wallet_address: &str) -> DbResult<u64> {
        let mut links = self.links.lock().await;
        let before = links.len();
        links.retain(|_, link| !link.wallet_address.eq_ignore_ascii_case(wallet_address));
        Ok((before - links.len()) as u64)
    }
}
