use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tenancy::config::Config;
use tenancy::db::{self, AppState};
use tenancy::handlers;
use tenancy::kms::LocalKms;
use tenancy::rbac::{Authorizer, DEFAULT_USER_ID};
use tenancy::service::{bootstrap, data_key::DataKeyProvider};

#[derive(Parser, Debug)]
#[command(name = "tenancy", about = "Organizations, projects and API keys with RBAC")]
struct Cli {
    /// Load environment variables from this file before reading configuration
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Do not provision the default organization, project and keys
    #[arg(long)]
    skip_bootstrap: bool,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Some(path) = &cli.env_file {
        dotenvy::from_path(path)
            .with_context(|| format!("failed to load env file {}", path.display()))?;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tenancy=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env();
    config.validate().map_err(anyhow::Error::msg)?;

    let pool = db::create_pool(&config.database_path)?;
    {
        let conn = pool.get()?;
        db::init_db(&conn)?;
    }
    tracing::info!("Database ready at {}", config.database_path);

    let data_key = if config.kms_enabled {
        let master_key = config
            .kms_master_key
            .clone()
            .context("KMS_MASTER_KEY is required when KMS is enabled")?;
        let kms = LocalKms::from_hex(&master_key)?;
        let (retry_count, retry_delay) = (config.data_key_retry_count, config.data_key_retry_delay);
        let pool = pool.clone();
        let key = tokio::task::spawn_blocking(move || {
            DataKeyProvider::new(&kms)
                .with_retry(retry_count, retry_delay)
                .get_or_create_data_key(&pool)
        })
        .await??;
        Some(key)
    } else {
        tracing::info!("KMS disabled; API key secrets are stored in plaintext");
        None
    };

    let state = AppState {
        db: pool,
        auth: Authorizer::new(config.auth_enabled, config.org_creation_policy),
        data_key,
    };
    if !config.auth_enabled {
        tracing::warn!("Authorization disabled; every call runs as {}", DEFAULT_USER_ID);
    }

    if cli.skip_bootstrap {
        tracing::info!("Skipping default resource bootstrap");
    } else {
        bootstrap::bootstrap_defaults(&state, &config.defaults)?;
    }

    let public_listener = tokio::net::TcpListener::bind(config.addr()).await?;
    let internal_listener = tokio::net::TcpListener::bind(config.internal_addr()).await?;
    tracing::info!(
        "Listening on {} (internal {})",
        config.addr(),
        config.internal_addr()
    );

    let public = axum::serve(public_listener, handlers::public_router(state.clone()))
        .with_graceful_shutdown(shutdown_signal());
    let internal = axum::serve(internal_listener, handlers::internal_router(state))
        .with_graceful_shutdown(shutdown_signal());

    tokio::try_join!(async { public.await }, async { internal.await })?;
    tracing::info!("Shut down cleanly");
    Ok(())
}
