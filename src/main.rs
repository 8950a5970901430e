//! Lockbox CLI entry point

mod cli;

use crate::cli::{Cli, Commands, S3Args};
use anyhow::{Context, Result};
use clap::Parser;
use lockbox::auth::SessionKey;
use lockbox::catalog::ResourceCatalog;
use lockbox::server::{LockboxServer, LockboxServerConfig};
use lockbox::signing::{S3Config, S3Presigner};
use lockbox::storage::{FileTokenStore, TokenStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            bind,
            tokens,
            catalog,
            session_secret,
            secure_cookies,
            s3,
        } => serve(bind, tokens, catalog, session_secret, secure_cookies, s3).await,
        Commands::Issue { count, tokens } => issue(count, tokens).await,
        Commands::Groups { catalog } => groups(catalog),
    }
}

async fn serve(
    bind: String,
    tokens_path: PathBuf,
    catalog_path: PathBuf,
    session_secret: String,
    secure_cookies: bool,
    s3: S3Args,
) -> Result<()> {
    let bind_addr = bind.parse().context("Invalid bind address")?;
    let session_key = SessionKey::new(&session_secret).context("Invalid SESSION_SECRET")?;

    let store = FileTokenStore::open(&tokens_path)
        .await
        .with_context(|| format!("Failed to load token store: {}", tokens_path.display()))?;
    let stats = store.stats().await;
    if stats.unused() == 0 {
        warn!(path = %tokens_path.display(), "Token store has no unused codes");
    }

    let catalog = ResourceCatalog::load(&catalog_path)
        .with_context(|| format!("Failed to load catalog: {}", catalog_path.display()))?;

    let signer = S3Presigner::new(S3Config {
        bucket: s3.bucket,
        region: s3.region,
        access_key_id: s3.access_key_id,
        secret_access_key: s3.secret_access_key,
        session_token: s3.session_token,
        endpoint: s3.s3_endpoint,
        path_style: s3.path_style,
    })
    .context("Invalid S3 configuration")?;
    info!(host = %signer.host(), "Presigner ready");

    let mut config = LockboxServerConfig::new(bind_addr, session_key);
    config.secure_cookies = secure_cookies;

    let server = LockboxServer::new(
        config,
        Arc::new(store),
        Arc::new(catalog),
        Arc::new(signer),
    );

    info!(addr = %bind, "Lockbox starting");
    server.run(shutdown_signal()).await?;

    info!("Lockbox stopped");
    Ok(())
}

async fn issue(count: usize, tokens_path: PathBuf) -> Result<()> {
    let store = FileTokenStore::open_or_create(&tokens_path)
        .await
        .with_context(|| format!("Failed to load token store: {}", tokens_path.display()))?;

    let issued = store
        .issue(count)
        .await
        .with_context(|| format!("Failed to save token store: {}", tokens_path.display()))?;

    for token in &issued {
        println!("Generated code: {}", token.code);
    }

    let stats = store.stats().await;
    println!();
    println!(
        "Generated {} new code(s). Store now holds {} code(s), {} unused.",
        issued.len(),
        stats.total,
        stats.unused()
    );

    Ok(())
}

fn groups(catalog_path: PathBuf) -> Result<()> {
    let catalog = ResourceCatalog::load(&catalog_path)
        .with_context(|| format!("Failed to load catalog: {}", catalog_path.display()))?;

    if catalog.is_empty() {
        println!("(no groups)");
        return Ok(());
    }

    for group in catalog.group_names() {
        println!("{}", group);
        for item in catalog.item_names(group)? {
            println!("  {}", item);
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping server");
}
