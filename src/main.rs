mod app;
mod backend;
mod cache;
mod commands;
mod config;
mod db;
mod error;
mod event;
mod generator;
mod logging;
mod notes;
mod query;
mod session;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

use backend::client::SupabaseClient;
use generator::GeminiClient;
use notes::{NoteCoordinator, NoteService};
use session::SessionContext;

#[derive(Parser, Debug)]
#[command(name = "notefie")]
#[command(about = "Take notes in the terminal and have them explained")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/notefie/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Log file (default: <data dir>/notefie/notefie.log; filter with NOTEFIE_LOG)
  #[arg(long)]
  log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = logging::init(args.log_file.as_deref())?;

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let credentials = config.backend_credentials()?;

  let backend = SupabaseClient::new(&credentials.url, credentials.api_key)?;
  let generator = GeminiClient::new(&config.generator, config::Config::generator_api_key());
  let service = NoteService::new(Arc::new(backend), Arc::new(generator));
  let notes = NoteCoordinator::new(service, &config);

  let store = if config.session.persist {
    match db::SessionStore::open() {
      Ok(store) => Some(Arc::new(store)),
      Err(e) => {
        warn!(error = %e, "session store unavailable, sign-in will not be remembered");
        None
      }
    }
  } else {
    None
  };
  let session = SessionContext::new(store);

  // Initialize and run the app
  let mut app = app::App::new(&config, credentials.url, notes, session);
  app.run().await?;

  Ok(())
}
