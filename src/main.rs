use std::{process, sync::Arc};

use clap::Parser;
use log::{error, info};

use todosync::{
    notice_channel, App, Cli, Config, HttpTaskService, LocalCache, Result, SyncEngine,
};

pub fn initialize_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .format_module_path(true)
        .init();

    info!("Logger initialized");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    initialize_logger(cli.verbose);

    info!("Application starting up");

    if let Err(e) = run(cli).await {
        // Validation and sync failures were already shown as notices
        if e.notice_kind().is_none() {
            error!("{}", e);
            eprintln!("Error: {}", e);
        }
        process::exit(1);
    }

    info!("Application shutting down");
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(&config_path)?;
    config.apply_env();
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }

    let cache = LocalCache::new(config.data_dir.clone());
    let service = Arc::new(HttpTaskService::from_config(&config)?);
    let (notices_tx, notices_rx) = notice_channel();
    let engine = SyncEngine::new(cache.clone(), service, notices_tx).into_shared();

    let mut app = App::new(engine, notices_rx, cache, config, config_path);
    app.run(cli.command).await
}
