use serde::{Deserialize, Serialize};

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub jwt: JwtConfig,
    pub siwe: SiweConfig,
    pub session: SessionConfig,
    pub google: GoogleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public origin of this service; `https` turns on the `Secure` cookie flag.
    pub public_url: String,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    #[serde(default)]
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub exp_in_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiweConfig {
    pub domain: String,
    pub uri: String,
    #[serde(default)]
    pub statement: String,
    pub chain_id: u64,
    pub nonce_ttl_seconds: i64,
    pub purge_interval_seconds: u64,
    /// JSON-RPC endpoint used for EIP-1271 contract wallet checks.
    #[serde(default)]
    pub rpc_url: Option<String>,
    pub rpc_timeout_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    Lax,
    Strict,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub cookie_secret: String,
    pub ttl_days: i64,
    pub same_site: SameSitePolicy,
    #[serde(default)]
    pub cookie_domain: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scope: String,
    pub auth_url: String,
    pub token_url: String,
    pub jwks_url: String,
    pub allowed_issuers: Vec<String>,
    #[serde(default)]
    pub access_type: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    pub post_login_redirect: String,
    pub jwks_cache_seconds: u64,
    pub clock_skew_seconds: i64,
    pub http_timeout_seconds: u64,
}

impl Config {
    pub fn load(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::new(config_path, config::FileFormat::Toml))
            .add_source(config::Environment::with_prefix("WALLET_AUTH").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(test)]
    pub fn load_test_env() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/test"))
            .add_source(config::Environment::with_prefix("WALLET_AUTH").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let secrets = [
            ("jwt.secret", &self.jwt.secret),
            ("session.cookie_secret", &self.session.cookie_secret),
        ];
        for (key, secret) in secrets {
            if secret.len() < MIN_SECRET_LEN {
                return Err(config::ConfigError::Message(format!(
                    "{} must be at least {} bytes",
                    key, MIN_SECRET_LEN
                )));
            }
        }

        if self.storage.backend == StorageBackend::Postgres && self.storage.database_url.is_none() {
            return Err(config::ConfigError::Message(
                "storage.database_url is required for the postgres backend".to_string(),
            ));
        }

        if self.session.ttl_days <= 0 || self.jwt.exp_in_hours <= 0 {
            return Err(config::ConfigError::Message(
                "session.ttl_days and jwt.exp_in_hours must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn get_server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn is_https(&self) -> bool {
        self.server.public_url.starts_with("https://")
    }

    pub fn get_jwt_expiration(&self) -> chrono::Duration {
        chrono::Duration::hours(self.jwt.exp_in_hours)
    }

    pub fn get_nonce_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.siwe.nonce_ttl_seconds)
    }

    pub fn get_nonce_purge_duration(&self) -> tokio::time::Duration {
        tokio::time::Duration::from_secs(self.siwe.purge_interval_seconds)
    }

    pub fn get_rpc_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.siwe.rpc_timeout_seconds)
    }

    pub fn get_request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.server.request_timeout_seconds)
    }

    pub fn get_session_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.session.ttl_days)
    }

    pub fn get_jwks_cache_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.google.jwks_cache_seconds)
    }

    pub fn get_google_http_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.google.http_timeout_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8787,
                public_url: "http://127.0.0.1:8787".to_string(),
                allowed_origins: Vec::new(),
                request_timeout_seconds: 30,
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                database_url: None,
                max_connections: 10,
                acquire_timeout_seconds: 5,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
            jwt: JwtConfig {
                secret: "Change-in-production-jwt-secret-0000".to_string(),
                exp_in_hours: 24,
            },
            siwe: SiweConfig {
                domain: "localhost:8787".to_string(),
                uri: "http://localhost:8787".to_string(),
                statement: "Sign in with your wallet.".to_string(),
                chain_id: 1,
                nonce_ttl_seconds: 600,
                purge_interval_seconds: 300,
                rpc_url: None,
                rpc_timeout_seconds: 5,
            },
            session: SessionConfig {
                cookie_secret: "Change-in-production-cookie-secret-00".to_string(),
                ttl_days: 7,
                same_site: SameSitePolicy::Lax,
                cookie_domain: None,
            },
            google: GoogleConfig {
                client_id: "example.apps.googleusercontent.com".to_string(),
                client_secret: "example".to_string(),
                redirect_uri: "http://127.0.0.1:8787/auth/google/callback".to_string(),
                scope: "openid email profile".to_string(),
                auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
                token_url: "https://oauth2.googleapis.com/token".to_string(),
                jwks_url: "https://www.googleapis.com/oauth2/v3/certs".to_string(),
                allowed_issuers: vec![
                    "https://accounts.google.com".to_string(),
                    "accounts.google.com".to_string(),
                ],
                access_type: None,
                prompt: None,
                post_login_redirect: "/".to_string(),
                jwks_cache_seconds: 3600,
                clock_skew_seconds: 300,
                http_timeout_seconds: 10,
            },
        }
    }
}
