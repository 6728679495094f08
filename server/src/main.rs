use anyhow::{Context, Result};
use axum::Router;
use clap::{Arg, Command};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use highrise_engine::Engine;
use highrise_server::api::{self, AppState};
use highrise_server::notify::Notifier;
use highrise_server::{sweep, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("highrise-server")
        .about("REST API and Telegram notifier for the highrise bonus program")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .required(true)
                .help("Path to the YAML configuration file"),
        )
        .get_matches();

    let config_path = matches
        .get_one::<String>("config")
        .expect("config is required");
    let raw = std::fs::read_to_string(config_path)
        .with_context(|| format!("failed to read config file {config_path}"))?;
    let config: Config = serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse config file {config_path}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level).context("invalid log_level directive")?,
        )
        .init();

    let engine = Arc::new(
        Engine::open(&config.database_path)
            .await
            .context("failed to open database")?,
    );
    let notifier = Arc::new(Notifier::new(config.telegram_bot_token.clone()));
    if notifier.is_enabled() {
        info!("telegram notifier enabled");
    } else {
        info!("no bot token configured; notifications disabled");
    }

    let _sweep = sweep::spawn(
        engine.clone(),
        notifier.clone(),
        config.frontend_url.clone(),
    );

    let state = Arc::new(AppState { engine, notifier });
    let app: Router = api::router(state);

    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "server listening");
    axum::serve(listener, app).await.context("server exited")?;
    Ok(())
}
