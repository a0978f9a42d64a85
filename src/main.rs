use std::sync::Arc;

use clap::Parser;
use tokio::{task::JoinHandle, time::Duration};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wallet_auth::{
    args::Args,
    config::LoggingConfig,
    errors::{AppError, AppResult},
    http_server::{start_server, AppState},
    metrics::spawn_auth_event_observer,
    repositories::nonce::NonceStore,
    services::{
        google_gateway::{GoogleGateway, OAuthGateway},
        signature_service::{ContractWalletVerifier, RpcContractVerifier},
    },
    Config, DbPersistence,
};

#[tokio::main]
async fn main() -> AppResult<()> {
    let args = Args::parse();

    // Load configuration from --config path (defaults to config/default.toml)
    let mut config = Config::load(&args.config)?;

    // Apply CLI overrides
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    init_logging(&config.logging)?;

    info!("🚀 Starting {} v{}", wallet_auth::NAME, wallet_auth::VERSION);
    info!("Configuration loaded from: {}", args.config);

    let db = DbPersistence::from_config(&config).await?;
    info!("Storage backend: {}", db.backend_name());

    let contract_verifier: Option<Arc<dyn ContractWalletVerifier>> = match &config.siwe.rpc_url {
        Some(rpc_url) => {
            let verifier = RpcContractVerifier::new(rpc_url, config.get_rpc_timeout())
                .map_err(|e| AppError::Server(e.to_string()))?;
            info!("EIP-1271 fallback enabled via {}", rpc_url);
            Some(Arc::new(verifier))
        }
        None => {
            warn!("siwe.rpc_url is not set; contract wallets cannot sign in");
            None
        }
    };

    let oauth: Arc<dyn OAuthGateway> = Arc::new(GoogleGateway::new(config.google.clone())?);

    let server_address = config.get_server_address();
    let purge_interval = config.get_nonce_purge_duration();
    let state = AppState::build(config, db, oauth, contract_verifier);

    let event_observer = spawn_auth_event_observer(&state.events);
    let nonce_purge = start_nonce_purge_task(state.db.nonces.clone(), purge_interval);

    let server_addr_clone = server_address.clone();
    let server_task = tokio::spawn(async move {
        start_server(state, &server_addr_clone, shutdown_signal())
            .await
            .map_err(|e| AppError::Server(e.to_string()))
    });

    info!("🎯 Wallet auth is now running!");
    info!("HTTP API available at: http://{}", server_address);

    // Wait for any task to complete (the purge task only stops on panic)
    tokio::select! {
        result = server_task => {
            result.map_err(|e| AppError::Server(e.to_string()))??;
            info!("HTTP server stopped");
        }
        result = nonce_purge => {
            error!("Nonce purge task exited: {:?}", result);
            return Err(AppError::Server("nonce purge task exited".to_string()));
        }
    }

    event_observer.abort();
    Ok(())
}

fn start_nonce_purge_task(nonces: Arc<dyn NonceStore>, purge_interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(purge_interval);

        loop {
            interval.tick().await;

            match nonces.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => info!("Purged {} expired nonces", purged),
                Err(e) => error!("Failed to purge expired nonces: {}", e),
            }
        }
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn init_logging(logging: &LoggingConfig) -> AppResult<()> {
    let log_level = match logging.level.to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" => tracing::Level::WARN,
        "info" => tracing::Level::INFO,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => {
            eprintln!("Invalid log level: {}, defaulting to info", logging.level);
            tracing::Level::INFO
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("wallet_auth={},tower_http={}", log_level, log_level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().with_target(false)).init();
    }

    Ok(())
}
