// src/main.rs
mod api;
mod artifacts;
mod error;
mod forecast;
mod loan;
mod market;
mod models;
mod quotes;
mod risk;

use crate::artifacts::Artifacts;
use crate::error::handle_rejection;
use crate::market::MarketClient;
use env_logger::Builder;
use log::{error, info, warn, LevelFilter};
use reqwest::Client;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use warp::Filter;

const DEFAULT_PORT: u16 = 3030;

#[tokio::main]
async fn main() {
    Builder::new()
        .filter_level(LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    info!("Starting the risk dashboard service...");

    let api_key = env::var("FINNHUB_API_KEY").unwrap_or_default();
    if api_key.is_empty() {
        warn!("FINNHUB_API_KEY is not set; quote requests will fail upstream");
    }

    let forecast_path =
        env::var("FORECAST_MODEL_PATH").unwrap_or_else(|_| "stock_model_7day.onnx".to_string());
    let scaler_path = env::var("SCALER_PATH").unwrap_or_else(|_| "scaler.json".to_string());
    let loan_path =
        env::var("LOAN_MODEL_PATH").unwrap_or_else(|_| "loan_approval_model.onnx".to_string());
    let artifacts = Arc::new(Artifacts::load(&forecast_path, &scaler_path, &loan_path));

    let client = match Client::builder().timeout(Duration::from_secs(10)).build() {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            return;
        }
    };

    let market = Arc::new(MarketClient::new(client, api_key));

    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);

    let routes = api::routes(market, artifacts).recover(handle_rejection);

    info!("Server running on http://0.0.0.0:{}", port);
    warp::serve(routes).run(([0, 0, 0, 0], port)).await;
}
