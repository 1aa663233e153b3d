mod ai;
mod app;
mod cli;
mod config;
mod db;
mod domain;
mod filter;
mod infrastructure;
mod page;
mod settings;
mod tasks;

use anyhow::Result;
use clap::Parser;
use infrastructure::{directories, logging, shutdown};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = config::load_config()?;
    let paths = directories::ensure_directories(&config.directories)?;
    logging::init_tracing(&config, &paths)?;

    let (shutdown, _) = shutdown::Shutdown::new();
    shutdown::install_signal_handlers(shutdown.clone());

    let app = app::SpoilerGuardApp::initialize(config, paths, shutdown).await?;
    match cli.command {
        Command::Run { page } => {
            let report = app.run_once(&page).await;
            app.close().await;
            println!("{}", serde_json::to_string_pretty(&report?)?);
            Ok(())
        }
        Command::Watch { page } => {
            app.watch(&page).await?;
            // The stdin reader may still be parked on a blocking read.
            std::process::exit(0);
        }
        Command::Settings { action } => {
            let result = app.settings_command(action).await;
            app.close().await;
            result
        }
    }
}
