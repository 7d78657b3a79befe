//! Trackway server entry point.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use trackway::api;
use trackway::domain::models::Principal;
use trackway::domain::ports::AuthProvider;
use trackway::infrastructure::auth::{HubAuthProvider, StaticAuthProvider};
use trackway::infrastructure::config::ConfigLoader;
use trackway::infrastructure::credentials::CredentialVault;
use trackway::infrastructure::database::DatabaseConnection;
use trackway::infrastructure::logging;

#[derive(Parser, Debug)]
#[command(name = "trackway", about = "Task tracker for autonomous agents", version)]
struct Cli {
    /// Port to serve on (overrides config and TASK_SERVER_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Database file path (overrides config and TASKS_DB_NAME)
    #[arg(long)]
    db_path: Option<String>,

    /// Skip token verification and act as a fixed local principal
    #[arg(long)]
    no_auth: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::load().context("Failed to load configuration")?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.no_auth {
        config.server.no_auth = true;
    }

    logging::init(&config.logging);

    let database_url = match &cli.db_path {
        Some(path) => format!("sqlite:{path}"),
        None => {
            std::fs::create_dir_all(&config.database.dir)
                .context("Failed to create database directory")?;
            config.database.url()
        }
    };
    let db = DatabaseConnection::new(&database_url)
        .await
        .context("Failed to connect to database")?;
    db.migrate()
        .await
        .context("Failed to run database migrations")?;

    let vault = Arc::new(CredentialVault::bootstrap().context("Failed to acquire encryption key")?);

    let auth: Arc<dyn AuthProvider> = if config.server.no_auth {
        Arc::new(StaticAuthProvider::new(Principal::new("anonymous@local")))
    } else {
        match &config.auth.hub_url {
            Some(hub_url) => {
                Arc::new(HubAuthProvider::new(hub_url.clone()).context("Failed to build auth provider")?)
            }
            None => Arc::new(StaticAuthProvider::new(Principal::new("anonymous@local"))),
        }
    };

    let state = api::build_state(db.pool().clone(), &config, vault, auth)
        .context("Failed to wire services")?;
    api::serve(state, config.server.port)
        .await
        .context("Server failed")?;
    Ok(())
}
