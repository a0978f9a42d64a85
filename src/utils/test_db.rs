use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::Config;

/// Connects to the test database, applies migrations and empties every table.
pub async fn reset_database(config: &Config) -> PgPool {
    let database_url = config
        .storage
        .database_url
        .as_deref()
        .expect("config/test.toml must set storage.database_url");

    let pool = PgPoolOptions::new()
        .max_connections(config.storage.max_connections)
        .connect(database_url)
        .await
        .expect("Failed to connect to the test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    sqlx::query("TRUNCATE siwe_nonces, google_web3_accounts")
        .execute(&pool)
        .await
        .expect("Failed to truncate tables for tests");

    pool
}
