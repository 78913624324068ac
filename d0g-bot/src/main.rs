use dotenv::dotenv;
use std::sync::Arc;
use tokio::sync::oneshot;

mod channels;
mod commands;
mod config;
mod db;
mod dice;
mod error;

use commands::Bot;
use config::Config;
use db::Store;

#[tokio::main]
async fn main() {
    // An env file may be named as the first argument, otherwise `.env` is used
    let env_file = std::env::args().nth(1);
    let env_result = match &env_file {
        Some(path) => dotenv::from_path(path).map(|_| ()),
        None => dotenv().map(|_| ()),
    };
    env_logger::init();

    if let (Some(path), Err(e)) = (&env_file, &env_result) {
        log::warn!("Can't load specified env file {}: {}", path, e);
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    log::info!("Opening store at {}", config.database_path);
    let store = match Store::open(&config.database_path, config.store_timeout) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            log::error!("Failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    let bot = Arc::new(Bot::new(store.clone(), config.command_prefix.clone()));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        let _ = shutdown_tx.send(());
    });

    log::info!("Running with command prefix {:?}", config.command_prefix);
    let result = channels::discord::start_discord_listener(&config.discord_token, bot.clone(), shutdown_rx).await;
    drop(bot);

    match Arc::try_unwrap(store) {
        Ok(store) => {
            if let Err(e) = store.close() {
                log::error!("Failed to close store: {}", e);
            }
        }
        Err(_) => log::warn!("Store still in use at shutdown, skipping checkpoint"),
    }

    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
