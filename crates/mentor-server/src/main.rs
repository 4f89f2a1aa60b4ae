//! mentor server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) plus
//! `MENTOR__*` environment overrides, opens the SQLite store, starts the
//! background grading worker and serves the JSON API under `/api`.
//!
//! # Creating an administrator
//!
//! Admin accounts cannot be registered over HTTP:
//!
//! ```
//! cargo run -p mentor-server -- --create-admin root
//! ```

mod settings;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use axum::Router;
use clap::Parser;
use mentor_llm::OpenAiClient;
use mentor_service::{GradingQueue, GradingWorker, Services};
use mentor_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

use crate::settings::ServerConfig;

#[derive(Parser)]
#[command(author, version, about = "Mentor classroom assistant server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Create an administrator with this username, reading the password from
  /// stdin, and exit.
  #[arg(long, value_name = "USERNAME")]
  create_admin: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = ServerConfig::load(&cli.config)?;

  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;

  let model = OpenAiClient::new(cfg.llm.clone()).context("failed to build model client")?;
  if cfg.llm.api_key.is_empty() {
    warn!("no llm.api_key configured; model requests will be unauthenticated");
  }

  let (queue, jobs) = GradingQueue::new();
  let services = Services::new(store, Arc::new(model), queue);

  // Helper mode: create an admin and exit.
  if let Some(username) = cli.create_admin {
    let password = rpassword_or_stdin()?;
    let admin = services
      .accounts
      .create_admin(username.clone(), password, username)
      .await
      .context("failed to create admin")?;
    println!("created admin {} ({})", admin.username, admin.id);
    return Ok(());
  }

  let worker = GradingWorker::new(
    services.grader.clone(),
    jobs,
    Duration::from_millis(cfg.grading_delay_ms),
  )
  .spawn();

  let app = Router::new()
    .nest("/api", mentor_api::api_router(services))
    .layer(TraceLayer::new_for_http());
  let address = cfg.address();

  info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  // The router owned the last queue handle, so the worker stops once any
  // in-flight jobs have been handed off.
  match tokio::time::timeout(Duration::from_secs(5), worker).await {
    Ok(joined) => joined.context("grading worker panicked")?,
    Err(_) => warn!("grading worker still busy at shutdown"),
  }
  info!("shut down cleanly");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(error = %e, "failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  info!("shutdown requested");
}

/// Read a password from stdin.
fn rpassword_or_stdin() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}
