//! fxdesk API server
//!
//! Serves the client portal, the back-office and the payment webhook over HTTP.

use std::net::SocketAddr;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use fxdesk_api::config::AppConfig;
use fxdesk_api::database::initialize_store;
use fxdesk_api::middleware::TokenKind;
use fxdesk_api::observability::init_tracing;

#[derive(Debug, Parser)]
#[command(name = "fxdesk-api", version, about = "fxdesk back-office API")]
struct Cli {
    /// Listen address, overrides FXDESK_BIND
    #[arg(long, env = "FXDESK_BIND")]
    bind: Option<SocketAddr>,

    /// Postgres connection string; the in-memory store is used when absent
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print a bearer token for an existing admin
    IssueToken {
        #[arg(long)]
        admin_id: Uuid,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = AppConfig::from_env().context("loading configuration")?;
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if let Some(url) = cli.database_url {
        config.database.database_url = Some(url);
    }

    let store = initialize_store(&config.database)
        .await
        .context("initializing the store")?;
    let (state, app) = fxdesk_api::build_app(config, store)?;

    if let Some(Command::IssueToken { admin_id }) = cli.command {
        let mut tx = state.store.begin().await?;
        let admin = tx.get_admin(admin_id).await?;
        match admin {
            Some(admin) if admin.enabled => {
                println!("{}", state.auth.issue_token(admin.id, TokenKind::Admin)?);
                return Ok(());
            }
            Some(_) => bail!("admin {} is disabled", admin_id),
            None => bail!("admin {} does not exist", admin_id),
        }
    }

    if let Some(email) = state.config.bootstrap_super_admin_email.clone() {
        if let Some(admin) = state.admins.bootstrap_super_admin(&email).await? {
            let token = state.auth.issue_token(admin.id, TokenKind::Admin)?;
            tracing::info!(admin_id = %admin.id, token = %token, "Super admin token");
        }
    }

    let bind_addr = state.config.bind_addr;
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("binding {}", bind_addr))?;
    tracing::info!("fxdesk API listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Received shutdown signal");
        })
        .await?;

    tracing::info!("fxdesk API shutdown complete");
    Ok(())
}
