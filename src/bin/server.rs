//! HTTP server binary for duenotify.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use duenotify::auth::TokenService;
use duenotify::notify::build_notifier;
use duenotify::scheduler::{ReminderScheduler, ReminderSettings};
use duenotify::server::{AppState, TaskServer};
use duenotify::store::SqliteStore;
use duenotify::ServiceConfig;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// duenotify: multi-user task service with deadline reminders.
#[derive(Parser)]
#[command(name = "duenotify-server", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the default configuration as TOML and exit.
    #[arg(long)]
    print_default_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("duenotify=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();

    if cli.print_default_config {
        print!("{}", toml::to_string_pretty(&ServiceConfig::default())?);
        return Ok(());
    }

    let config = load_config(cli.config)?;
    run(config).await
}

fn load_config(explicit: Option<PathBuf>) -> anyhow::Result<ServiceConfig> {
    let mut config = match explicit {
        Some(path) => ServiceConfig::from_file(&path)?,
        None => {
            let path = ServiceConfig::default_config_path();
            if path.exists() {
                info!("loading config from {}", path.display());
                ServiceConfig::from_file(&path)?
            } else {
                ServiceConfig::default()
            }
        }
    };
    config.apply_env();
    config.validate()?;
    Ok(config)
}

async fn run(config: ServiceConfig) -> anyhow::Result<()> {
    let secret = match config.auth.jwt_secret.clone() {
        Some(secret) => secret,
        None => {
            warn!("no JWT secret configured, using an ephemeral one; tokens will not survive a restart");
            TokenService::generate_secret()
        }
    };
    let tokens = Arc::new(TokenService::new(&secret, config.auth.token_ttl_secs));
    info!(ttl_secs = tokens.ttl_secs(), "token service ready");

    let store = Arc::new(SqliteStore::open(&config.store.db_path)?);
    if let Some(path) = store.path() {
        info!("store opened at {}", path.display());
    }

    let notifier = build_notifier(&config.mail)?;
    let settings = ReminderSettings::from_config(&config.reminder)?;
    let reminders = ReminderScheduler::spawn(settings, notifier, None);

    let state = AppState {
        users: store.clone(),
        tasks: store,
        tokens,
        reminders,
        min_password_len: config.auth.min_password_len,
    };
    let server = TaskServer::start(state, &config.server).await?;
    println!("duenotify v{} listening on http://{}", env!("CARGO_PKG_VERSION"), server.addr());

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    server.shutdown();
    Ok(())
}
