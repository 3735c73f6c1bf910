// src/quotes.rs
use crate::error::ApiError;
use crate::market::MarketClient;
use crate::models::{Quote, QuoteEntry};
use log::error;
use std::collections::HashMap;

/// Days of history requested per symbol; extra days cover weekends and
/// holidays so the trailing 5 closes are usually real observations.
const HISTORY_FETCH_DAYS: u32 = 10;
const HISTORY_LEN: usize = 5;

/// Fetches current and trailing-5-day data for each symbol. One symbol's
/// failure is recorded as its own `{error}` entry and never aborts the rest
/// of the batch. Empty comma segments are dropped rather than keyed as `""`,
/// a deliberate divergence from the service this replaces.
pub async fn get_quotes(market: &MarketClient, symbols: &[String]) -> HashMap<String, QuoteEntry> {
    let mut prices = HashMap::new();

    for raw in symbols {
        let symbol = raw.trim().to_uppercase();
        if symbol.is_empty() {
            continue;
        }
        let entry = match quote_for_symbol(market, &symbol).await {
            Ok(quote) => QuoteEntry::Quote(quote),
            Err(e) => {
                error!("Error fetching data for {}: {}", symbol, e);
                QuoteEntry::Error {
                    error: e.to_string(),
                }
            }
        };
        prices.insert(symbol, entry);
    }

    prices
}

async fn quote_for_symbol(market: &MarketClient, symbol: &str) -> Result<Quote, ApiError> {
    let quote = market.fetch_quote(symbol).await?;
    let closes = market.fetch_daily_closes(symbol, HISTORY_FETCH_DAYS).await?;
    let historical_prices = pad_history(closes, quote.current);

    Ok(Quote {
        symbol: symbol.to_string(),
        current: quote.current,
        high: quote.high,
        low: quote.low,
        open: quote.open,
        previous_close: quote.previous_close,
        historical_prices,
    })
}

/// Normalizes an upstream close series to exactly 5 entries, oldest first.
/// Empty history synthesizes a series stepping 1% below the current price
/// per day back; short history is left-padded with the current price.
pub fn pad_history(closes: Vec<f64>, current: f64) -> Vec<f64> {
    if closes.is_empty() {
        return (0..HISTORY_LEN)
            .rev()
            .map(|i| current * (1.0 - 0.01 * i as f64))
            .collect();
    }

    let start = closes.len().saturating_sub(HISTORY_LEN);
    let mut history: Vec<f64> = closes[start..].to_vec();
    while history.len() < HISTORY_LEN {
        history.insert(0, current);
    }
    history
}
