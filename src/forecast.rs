// src/forecast.rs
use crate::artifacts::{Artifacts, FORECAST_HORIZON, FORECAST_WINDOW};
use crate::error::ApiError;
use crate::market::MarketClient;
use crate::models::Forecast;
use chrono::{DateTime, Duration, Utc};
use log::{error, info};

/// Calendar days of history requested for the model path; extra days cover
/// weekends and holidays so at least 30 observations usually come back.
const PRIMARY_FETCH_DAYS: u32 = 60;
const FALLBACK_FETCH_DAYS: u32 = 30;
const TRAILING_RETURNS: usize = 5;

/// The trained sequence model behind the primary strategy. Implemented by
/// `Artifacts`; tests substitute their own.
pub trait ForecastModel: Send + Sync {
    fn available(&self) -> bool;
    fn forecast_prices(&self, closes: &[f64]) -> Result<Vec<f64>, ApiError>;
}

impl ForecastModel for Artifacts {
    fn available(&self) -> bool {
        self.forecast_available()
    }

    fn forecast_prices(&self, closes: &[f64]) -> Result<Vec<f64>, ApiError> {
        Artifacts::forecast_prices(self, closes)
    }
}

/// Forecast strategies, tried in order. The first success wins.
#[derive(Debug, Clone, Copy)]
enum Strategy {
    Model,
    MovingAverage,
}

const STRATEGIES: [Strategy; 2] = [Strategy::Model, Strategy::MovingAverage];

/// Produces a 7-day price forecast for one symbol.
///
/// The model and scaler must both be loaded before anything else happens;
/// without them the request fails immediately and no history is fetched.
/// An insufficient-history error from the model path is terminal as well,
/// since the fallback needs the same history. Every other model-path
/// failure falls through to the moving-average strategy.
pub async fn get_forecast(
    market: &MarketClient,
    model: &dyn ForecastModel,
    symbol: &str,
) -> Result<Forecast, ApiError> {
    if !model.available() {
        return Err(ApiError::ModelUnavailable(
            "Prediction model not loaded".to_string(),
        ));
    }

    let mut primary_error: Option<ApiError> = None;
    for strategy in STRATEGIES {
        let attempt = match strategy {
            Strategy::Model => model_forecast(market, model, symbol).await,
            Strategy::MovingAverage => moving_average_forecast(market, symbol).await,
        };
        match (strategy, attempt) {
            (_, Ok(forecast)) => return Ok(forecast),
            // Too little history is a client error and the fallback would
            // fail the same way, so stop here.
            (Strategy::Model, Err(e @ ApiError::MissingInput(_))) => return Err(e),
            (Strategy::Model, Err(e)) => {
                error!("Error generating forecast for {}: {}", symbol, e);
                primary_error = Some(e);
            }
            (Strategy::MovingAverage, Err(fallback_error)) => {
                let primary = primary_error
                    .take()
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                return Err(ApiError::Unexpected(format!(
                    "Error in forecast: {} (Fallback also failed: {})",
                    primary, fallback_error
                )));
            }
        }
    }
    unreachable!("strategy list always returns")
}

async fn model_forecast(
    market: &MarketClient,
    model: &dyn ForecastModel,
    symbol: &str,
) -> Result<Forecast, ApiError> {
    let closes = market.fetch_daily_closes(symbol, PRIMARY_FETCH_DAYS).await?;
    if closes.len() < FORECAST_WINDOW {
        return Err(ApiError::MissingInput(
            "Not enough historical data available".to_string(),
        ));
    }

    let window = &closes[closes.len() - FORECAST_WINDOW..];
    let prices = model.forecast_prices(window)?;
    let forecast_prices: Vec<f64> = prices.into_iter().map(round2).collect();

    let now = Utc::now();
    info!("Model forecast generated for {}", symbol);
    Ok(Forecast {
        symbol: symbol.to_string(),
        forecast_dates: forecast_dates(now),
        forecast_prices,
        last_updated: now.format("%Y-%m-%d %H:%M:%S").to_string(),
        model_used: true,
        warning: None,
    })
}

async fn moving_average_forecast(market: &MarketClient, symbol: &str) -> Result<Forecast, ApiError> {
    let closes = market
        .fetch_daily_closes(symbol, FALLBACK_FETCH_DAYS)
        .await?;
    let avg_return = mean_trailing_return(&closes)
        .ok_or_else(|| ApiError::Upstream("No historical data available".to_string()))?;
    let last_close = closes[closes.len() - 1];

    let now = Utc::now();
    info!("Fallback forecast generated for {}", symbol);
    Ok(Forecast {
        symbol: symbol.to_string(),
        forecast_dates: forecast_dates(now),
        forecast_prices: project_linear(last_close, avg_return),
        last_updated: now.format("%Y-%m-%d %H:%M:%S").to_string(),
        model_used: false,
        warning: Some("Using fallback forecast method".to_string()),
    })
}

/// The next 7 consecutive calendar days after `start`, as ISO dates.
/// Weekends and holidays are included in the horizon.
pub fn forecast_dates(start: DateTime<Utc>) -> Vec<String> {
    (1..=FORECAST_HORIZON as i64)
        .map(|i| (start + Duration::days(i)).format("%Y-%m-%d").to_string())
        .collect()
}

/// Mean of the trailing 5 day-over-day percentage returns. `None` if the
/// series has fewer than 2 closes.
pub fn mean_trailing_return(closes: &[f64]) -> Option<f64> {
    if closes.len() < 2 {
        return None;
    }
    let returns: Vec<f64> = closes
        .windows(2)
        .map(|pair| (pair[1] - pair[0]) / pair[0])
        .collect();
    let start = returns.len().saturating_sub(TRAILING_RETURNS);
    let tail = &returns[start..];
    Some(tail.iter().sum::<f64>() / tail.len() as f64)
}

/// Linear projection: day `i` is `last_close * (1 + avg_return * i)`.
/// Deliberately not geometric compounding; this is the established contract.
pub fn project_linear(last_close: f64, avg_return: f64) -> Vec<f64> {
    (1..=FORECAST_HORIZON as i64)
        .map(|i| round2(last_close * (1.0 + avg_return * i as f64)))
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
