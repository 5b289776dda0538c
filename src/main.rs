// src/main.rs
mod accounts;
mod api;
mod auth;
mod broker;
mod config;
mod db;
mod error;
mod lookup;
mod models;
mod views;

use crate::api::AppState;
use crate::auth::SessionKeys;
use crate::config::Config;
use crate::lookup::AlphaVantage;
use env_logger::Builder;
use log::{error, info, LevelFilter};
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };

    let db = match db::init(&config.database_path).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            process::exit(1);
        }
    };

    let quotes = match AlphaVantage::new(config.alphavantage_api_key.clone(), config.quote_timeout) {
        Ok(quotes) => Arc::new(quotes),
        Err(e) => {
            error!("Failed to build quote client: {}", e);
            process::exit(1);
        }
    };

    let state = AppState {
        db,
        quotes,
        sessions: Arc::new(SessionKeys::new(&config.session_secret, config.session_ttl)),
        initial_cash: config.initial_cash,
    };

    info!("Starting the finance simulator...");
    info!("Server running on http://{}", config.bind_addr);
    warp::serve(api::routes(state)).run(config.bind_addr).await;
}
