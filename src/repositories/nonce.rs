use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::{models::nonce::NonceRecord, repositories::DbResult};

/// Single-use SIWE nonces keyed by checksummed address.
#[async_trait]
pub trait NonceStore: Send + Sync {
    /// Stores a fresh nonce for `address`, replacing any previous one.
    async fn issue(&self, address: &str) -> DbResult<NonceRecord>;

    async fn find(&self, address: &str) -> DbResult<Option<NonceRecord>>;

    /// Deletes the record only if it still holds `nonce` and is live.
    async fn consume(&self, address: &str, nonce: &str) -> DbResult<bool>;

    async fn purge_expired(&self) -> DbResult<u64>;
}

#[derive(Clone, Debug)]
pub struct PgNonceRepository {
    pool: PgPool,
    ttl: chrono::Duration,
}
impl PgNonceRepository {
    pub fn new(pool: &PgPool, ttl: chrono::Duration) -> Self {
        Self {
            pool: pool.clone(),
            ttl,
        }
    }

    fn cutoff(&self) -> chrono::DateTime<Utc> {
        Utc::now() - self.ttl
    }
}

#[async_trait]
impl NonceStore for PgNonceRepository {
    async fn issue(&self, address: &str) -> DbResult<NonceRecord> {
        let record = NonceRecord::new(address);

        let stored = sqlx::query_as::<_, NonceRecord>(
            "
        INSERT INTO siwe_nonces (address, nonce, issued_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (address)
        DO UPDATE SET nonce = EXCLUDED.nonce, issued_at = EXCLUDED.issued_at
        RETURNING address, nonce, issued_at
        ",
        )
        .bind(&record.address)
        .bind(&record.nonce)
        .bind(record.issued_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn find(&self, address: &str) -> DbResult<Option<NonceRecord>> {
        let record = sqlx::query_as::<_, NonceRecord>(
            "SELECT address, nonce, issued_at FROM siwe_nonces WHERE address = $1 AND issued_at > $2",
        )
        .bind(address)
        .bind(self.cutoff())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn consume(&self, address: &str, nonce: &str) -> DbResult<bool> {
        let deleted = sqlx::query_scalar::<_, String>(
            "
        DELETE FROM siwe_nonces
        WHERE address = $1 AND nonce = $2 AND issued_at > $3
        RETURNING address
        ",
        )
        .bind(address)
        .bind(nonce)
        .bind(self.cutoff())
        .fetch_optional(&self.pool)
        .await?;

        Ok(deleted.is_some())
    }

    async fn purge_expired(&self) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM siwe_nonces WHERE issued_at <= $1")
            .bind(self.cutoff())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[derive(Debug)]
pub struct MemoryNonceStore {
    ttl: chrono::Duration,
    records: RwLock<HashMap<String, NonceRecord>>,
}
impl MemoryNonceStore {
    pub fn new(ttl: chrono::Duration) -> Self {
        Self {
            ttl,
            records: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl NonceStore for MemoryNonceStore {
    async fn issue(&self, address: &str) -> DbResult<NonceRecord> {
        let record = NonceRecord::new(address);
        self.records.write().await.insert(address.to_string(), record.clone());
        Ok(record)
    }

    async fn find(&self, address: &str) -> DbResult<Option<NonceRecord>> {
        let records = self.records.read().await;
        Ok(records
            .get(address)
            .filter(|record| record.is_live(self.ttl, Utc::now()))
            .cloned())
    }

    async fn consume(&self, address: &str, nonce: &str) -> DbResult<bool> {
        let mut records = self.records.write().await;
        let matches = records
            .get(address)
            .is_some_and(|record| record.nonce == nonce && record.is_live(self.ttl, Utc::now()));

        if matches {
            records.remove(address);
        }
        Ok(matches)
    }

    async fn purge_expired(&self) -> DbResult<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        let now = Utc::now();
        records.retain(|_, record| record.is_live(self.ttl, now));
        Ok((before - records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, utils::test_db::reset_database};
    use std::sync::Arc;

    const ADDRESS: &str = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045";

    fn store() -> MemoryNonceStore {
        MemoryNonceStore::new(chrono::Duration::seconds(600))
    }

    #[tokio::test]
    async fn issue_then_find_returns_same_record() {
        let store = store();
        let issued = store.issue(ADDRESS).await.unwrap();
        let found = store.find(ADDRESS).await.unwrap().unwrap();
        assert_eq!(issued, found);
    }

    #[tokio::test]
    async fn reissue_invalidates_previous_nonce() {
        let store = store();
        let first = store.issue(ADDRESS).await.unwrap();
        let second = store.issue(ADDRESS).await.unwrap();

        assert!(!store.consume(ADDRESS, &first.nonce).await.unwrap());
        assert!(store.consume(ADDRESS, &second.nonce).await.unwrap());
    }

    #[tokio::test]
    async fn nonce_is_consumed_exactly_once() {
        let store = store();
        let record = store.issue(ADDRESS).await.unwrap();

        assert!(store.consume(ADDRESS, &record.nonce).await.unwrap());
        assert!(!store.consume(ADDRESS, &record.nonce).await.unwrap());
        assert!(store.find(ADDRESS).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_consumers_have_one_winner() {
        let store = Arc::new(store());
        let record = store.issue(ADDRESS).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let nonce = record.nonce.clone();
            handles.push(tokio::spawn(async move { store.consume(ADDRESS, &nonce).await.unwrap() }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn expired_nonces_are_invisible_and_purged() {
        let store = MemoryNonceStore::new(chrono::Duration::zero());
        let record = store.issue(ADDRESS).await.unwrap();

        assert!(store.find(ADDRESS).await.unwrap().is_none());
        assert!(!store.consume(ADDRESS, &record.nonce).await.unwrap());
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.purge_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    #[ignore = "requires the Postgres database from config/test.toml"]
    async fn postgres_nonce_is_single_use() {
        let config = Config::load_test_env().unwrap();
        let pool = reset_database(&config).await;
        let repo = PgNonceRepository::new(&pool, config.get_nonce_ttl());

        let record = repo.issue(ADDRESS).await.unwrap();
        assert_eq!(repo.find(ADDRESS).await.unwrap(), Some(record.clone()));
        assert!(repo.consume(ADDRESS, &record.nonce).await.unwrap());
        assert!(!repo.consume(ADDRESS, &record.nonce).await.unwrap());
    }
}
