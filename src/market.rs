// src/market.rs
use crate::error::ApiError;
use log::info;
use reqwest::Client;
use serde::Deserialize;

const FINNHUB_BASE_URL: &str = "https://finnhub.io/api/v1/quote";
const YAHOO_CHART_BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Current quote fields as Finnhub returns them.
#[derive(Deserialize, Debug, Clone)]
pub struct FinnhubQuote {
    #[serde(rename = "c")]
    pub current: f64,
    #[serde(rename = "h")]
    pub high: f64,
    #[serde(rename = "l")]
    pub low: f64,
    #[serde(rename = "o")]
    pub open: f64,
    #[serde(rename = "pc")]
    pub previous_close: f64,
}

#[derive(Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Deserialize)]
struct ChartError {
    description: String,
}

#[derive(Deserialize)]
struct ChartResult {
    indicators: Indicators,
}

#[derive(Deserialize)]
struct Indicators {
    quote: Vec<QuoteIndicator>,
}

#[derive(Deserialize)]
struct QuoteIndicator {
    close: Vec<Option<f64>>,
}

/// Client for the two external market-data collaborators: the Finnhub quote
/// API and the Yahoo chart daily-close history. Built once in `main` and
/// injected into handlers; tests point the base URLs at a local server.
pub struct MarketClient {
    client: Client,
    api_key: String,
    quote_url: String,
    chart_base_url: String,
}

impl MarketClient {
    pub fn new(client: Client, api_key: String) -> Self {
        MarketClient {
            client,
            api_key,
            quote_url: FINNHUB_BASE_URL.to_string(),
            chart_base_url: YAHOO_CHART_BASE_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_urls(
        client: Client,
        api_key: String,
        quote_url: String,
        chart_base_url: String,
    ) -> Self {
        MarketClient {
            client,
            api_key,
            quote_url,
            chart_base_url,
        }
    }

    /// Fetches the current quote for one symbol.
    pub async fn fetch_quote(&self, symbol: &str) -> Result<FinnhubQuote, ApiError> {
        let response = self
            .client
            .get(&self.quote_url)
            .query(&[("symbol", symbol), ("token", &self.api_key)])
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("Error fetching data: {}", e)))?;

        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "Failed to fetch current price: HTTP {}",
                response.status()
            )));
        }

        response
            .json::<FinnhubQuote>()
            .await
            .map_err(|e| ApiError::Upstream(format!("Error fetching data: {}", e)))
    }

    /// Fetches daily closing prices for the trailing `days` calendar days,
    /// oldest first. Nulls in the series (market holidays) are skipped.
    pub async fn fetch_daily_closes(&self, symbol: &str, days: u32) -> Result<Vec<f64>, ApiError> {
        let url = format!("{}/{}", self.chart_base_url, symbol);
        let range = format!("{}d", days);
        let response = self
            .client
            .get(&url)
            .query(&[("range", range.as_str()), ("interval", "1d")])
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("Error fetching data: {}", e)))?;

        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "Failed to fetch historical data: HTTP {}",
                response.status()
            )));
        }

        let payload = response
            .json::<ChartResponse>()
            .await
            .map_err(|e| ApiError::Upstream(format!("Error fetching data: {}", e)))?;

        if let Some(err) = payload.chart.error {
            return Err(ApiError::Upstream(format!(
                "History provider error: {}",
                err.description
            )));
        }

        let closes: Vec<f64> = payload
            .chart
            .result
            .unwrap_or_default()
            .into_iter()
            .flat_map(|r| r.indicators.quote)
            .flat_map(|q| q.close)
            .flatten()
            .collect();

        info!("Fetched {} daily closes for {}", closes.len(), symbol);
        Ok(closes)
    }
}
