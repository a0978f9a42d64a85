use std::sync::Arc;

use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    config::{Config, StorageBackend},
    repositories::{
        nonce::{MemoryNonceStore, NonceStore, PgNonceRepository},
        wallet_link::{MemoryWalletLinkStore, PgWalletLinkRepository, WalletLinkStore},
        DbResult,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("Conflicting write: {0}")]
    Conflict(String),
    #[error("Storage misconfigured: {0}")]
    Misconfigured(String),
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        // 23505: unique_violation
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some("23505") {
                return DbError::Conflict(db_err.message().to_string());
            }
        }
        DbError::Database(err)
    }
}

#[derive(Clone)]
pub struct DbPersistence {
    pub nonces: Arc<dyn NonceStore>,
    pub wallet_links: Arc<dyn WalletLinkStore>,

    pub pool: Option<PgPool>,
}

impl DbPersistence {
    pub async fn new(database_url: &str, max_connections: u32, config: &Config) -> DbResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.storage.acquire_timeout_seconds))
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        let nonces = Arc::new(PgNonceRepository::new(&pool, config.get_nonce_ttl()));
        let wallet_links = Arc::new(PgWalletLinkRepository::new(&pool));

        Ok(Self {
            nonces,
            wallet_links,
            pool: Some(pool),
        })
    }

    pub fn in_memory(config: &Config) -> Self {
        Self {
            nonces: Arc::new(MemoryNonceStore::new(config.get_nonce_ttl())),
            wallet_links: Arc::new(MemoryWalletLinkStore::default()),
            pool: None,
        }
    }

    /// Builds the backend selected by `storage.backend`.
    pub async fn from_config(config: &Config) -> DbResult<Self> {
        match config.storage.backend {
            StorageBackend::Memory => Ok(Self::in_memory(config)),
            StorageBackend::Postgres => {
                let database_url = config
                    .storage
                    .database_url
                    .as_deref()
                    .ok_or_else(|| DbError::Misconfigured("storage.database_url is not set".to_string()))?;
                Self::new(database_url, config.storage.max_connections, config).await
            }
        }
    }

    pub fn backend_name(&self) -> &'static str {
        if self.pool.is_some() {
            "postgres"
        } else {
            "memory"
        }
    }
}
