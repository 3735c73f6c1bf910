// src/models.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current quote plus a trailing 5-day close window for one symbol.
#[derive(Serialize, Debug, Clone)]
pub struct Quote {
    pub symbol: String,
    pub current: f64,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    pub previous_close: f64,
    /// Always exactly 5 entries, oldest first.
    pub historical_prices: Vec<f64>,
}

/// One entry in the per-symbol quote map: either data or an isolated error.
#[derive(Serialize, Debug, Clone)]
#[serde(untagged)]
pub enum QuoteEntry {
    Quote(Quote),
    Error { error: String },
}

#[derive(Serialize, Debug, Clone)]
pub struct Forecast {
    pub symbol: String,
    /// Exactly 7 ISO dates, consecutive calendar days starting tomorrow.
    pub forecast_dates: Vec<String>,
    /// Exactly 7 prices, positionally aligned with the dates.
    pub forecast_prices: Vec<f64>,
    pub last_updated: String,
    pub model_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Client-supplied portfolio position for the risk endpoint.
#[derive(Deserialize, Debug, Clone)]
pub struct Position {
    #[serde(rename = "currentPrice")]
    pub current_price: f64,
    pub quantity: f64,
    #[serde(rename = "dailyReturn", default)]
    pub daily_return: f64,
}

/// Body of POST /api/risk-metrics. confidenceLevel and timeHorizon arrive
/// as whatever JSON type the frontend sends; coercion happens in risk.rs.
#[derive(Deserialize, Debug, Default)]
pub struct RiskRequest {
    #[serde(default)]
    pub portfolio: Vec<Position>,
    #[serde(rename = "confidenceLevel")]
    pub confidence_level: Option<Value>,
    #[serde(rename = "timeHorizon")]
    pub time_horizon: Option<Value>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RiskMetrics {
    pub var: f64,
    pub cvar: f64,
    /// Annualized volatility as a percentage.
    pub volatility: f64,
    #[serde(rename = "portfolioValue")]
    pub portfolio_value: f64,
}

/// Loan application after field-by-field type coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct LoanApplication {
    pub self_employed: i64,
    pub income_annum: f64,
    pub loan_amount: f64,
    pub loan_term: i64,
    pub cibil_score: i64,
}

#[derive(Serialize, Debug, Clone)]
pub struct LoanDetails {
    pub self_employed: bool,
    pub income_annum: f64,
    pub loan_amount: f64,
    pub loan_term: i64,
    pub cibil_score: i64,
}

#[derive(Serialize, Debug, Clone)]
pub struct LoanDecision {
    pub loan_status: String,
    pub confidence: f64,
    pub details: LoanDetails,
}
