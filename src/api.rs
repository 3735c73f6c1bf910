// src/api.rs
use crate::artifacts::Artifacts;
use crate::error::ApiError;
use crate::forecast::get_forecast;
use crate::loan;
use crate::market::MarketClient;
use crate::models::RiskRequest;
use crate::quotes::get_quotes;
use crate::risk::risk_metrics_for;
use log::{error, info};
use std::collections::HashMap;
use std::sync::Arc;
use warp::{Filter, Rejection, Reply};

const INDEX_HTML: &str = include_str!("../static/index.html");
const PORTFOLIO_RISK_HTML: &str = include_str!("../static/portfolio-risk.html");
const CREDIT_RISK_HTML: &str = include_str!("../static/credit-risk.html");

pub fn routes(
    market: Arc<MarketClient>,
    artifacts: Arc<Artifacts>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let home = warp::path::end()
        .and(warp::get())
        .map(|| warp::reply::html(INDEX_HTML));

    let portfolio_risk_page = warp::path!("portfolio-risk.html")
        .and(warp::get())
        .map(|| warp::reply::html(PORTFOLIO_RISK_HTML));

    let credit_risk_page = warp::path!("credit-risk.html")
        .and(warp::get())
        .map(|| warp::reply::html(CREDIT_RISK_HTML));

    let credit_risk_alias = warp::path!("credit-risk")
        .and(warp::get())
        .map(|| warp::reply::html(CREDIT_RISK_HTML));

    let stock_price = warp::path!("api" / "stock-price")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_market(market.clone()))
        .and_then(stock_price_handler);

    let stock_forecast = warp::path!("api" / "stock-forecast")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_market(market))
        .and(with_artifacts(artifacts.clone()))
        .and_then(stock_forecast_handler);

    let risk_metrics = warp::path!("api" / "risk-metrics")
        .and(warp::post())
        .and(warp::body::json())
        .and_then(risk_metrics_handler);

    let predict_loan = warp::path!("predict-loan")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_artifacts(artifacts))
        .and_then(predict_loan_handler);

    home.or(portfolio_risk_page)
        .or(credit_risk_page)
        .or(credit_risk_alias)
        .or(stock_price)
        .or(stock_forecast)
        .or(risk_metrics)
        .or(predict_loan)
}

fn with_market(
    market: Arc<MarketClient>,
) -> impl Filter<Extract = (Arc<MarketClient>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || market.clone())
}

fn with_artifacts(
    artifacts: Arc<Artifacts>,
) -> impl Filter<Extract = (Arc<Artifacts>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || artifacts.clone())
}

async fn stock_price_handler(
    query: HashMap<String, String>,
    market: Arc<MarketClient>,
) -> Result<impl Reply, Rejection> {
    let symbols = query
        .get("symbols")
        .map(|s| s.as_str())
        .unwrap_or_default();
    if symbols.trim().is_empty() {
        return Err(warp::reject::custom(ApiError::MissingInput(
            "No symbols provided".to_string(),
        )));
    }

    let symbol_list: Vec<String> = symbols.split(',').map(|s| s.to_string()).collect();
    let prices = get_quotes(&market, &symbol_list).await;
    info!("Quotes assembled for {} symbol(s)", prices.len());
    Ok(warp::reply::json(&prices))
}

async fn stock_forecast_handler(
    query: HashMap<String, String>,
    market: Arc<MarketClient>,
    artifacts: Arc<Artifacts>,
) -> Result<impl Reply, Rejection> {
    let symbol = query.get("symbol").map(|s| s.trim()).unwrap_or_default();
    if symbol.is_empty() {
        return Err(warp::reject::custom(ApiError::MissingInput(
            "No symbol provided".to_string(),
        )));
    }

    match get_forecast(&market, &*artifacts, symbol).await {
        Ok(forecast) => Ok(warp::reply::json(&forecast)),
        Err(e) => {
            error!("Forecast failed for {}: {}", symbol, e);
            Err(warp::reject::custom(e))
        }
    }
}

async fn risk_metrics_handler(request: RiskRequest) -> Result<impl Reply, Rejection> {
    let metrics = risk_metrics_for(&request);
    info!(
        "Risk metrics computed for portfolio of {} position(s)",
        request.portfolio.len()
    );
    Ok(warp::reply::json(&metrics))
}

async fn predict_loan_handler(
    body: serde_json::Value,
    artifacts: Arc<Artifacts>,
) -> Result<impl Reply, Rejection> {
    match loan::predict(&artifacts, &body) {
        Ok(decision) => Ok(warp::reply::json(&decision)),
        Err(e) => {
            error!("Loan prediction failed: {}", e);
            Err(warp::reject::custom(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::handle_rejection;
    use serde_json::{json, Value};
    use warp::http::StatusCode;

    fn test_routes() -> impl Filter<Extract = impl Reply, Error = std::convert::Infallible> + Clone
    {
        let market = MarketClient::new(reqwest::Client::new(), String::new());
        routes(Arc::new(market), Arc::new(Artifacts::unloaded())).recover(handle_rejection)
    }

    #[tokio::test]
    async fn landing_page_serves_html() {
        let response = warp::test::request().path("/").reply(&test_routes()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(std::str::from_utf8(response.body())
            .unwrap()
            .contains("Financial Risk Dashboard"));
    }

    #[tokio::test]
    async fn static_risk_pages_resolve() {
        for path in ["/portfolio-risk.html", "/credit-risk.html", "/credit-risk"] {
            let response = warp::test::request().path(path).reply(&test_routes()).await;
            assert_eq!(response.status(), StatusCode::OK, "{}", path);
        }
    }

    #[tokio::test]
    async fn stock_price_without_symbols_is_400() {
        let response = warp::test::request()
            .path("/api/stock-price")
            .reply(&test_routes())
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["error"], "No symbols provided");
    }

    #[tokio::test]
    async fn forecast_without_symbol_is_400() {
        let response = warp::test::request()
            .path("/api/stock-forecast")
            .reply(&test_routes())
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["error"], "No symbol provided");
    }

    #[tokio::test]
    async fn forecast_with_unloaded_model_is_500_before_any_fetch() {
        let response = warp::test::request()
            .path("/api/stock-forecast?symbol=AAPL")
            .reply(&test_routes())
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["error"], "Prediction model not loaded");
    }

    #[tokio::test]
    async fn risk_metrics_reference_portfolio() {
        let response = warp::test::request()
            .method("POST")
            .path("/api/risk-metrics")
            .json(&json!({
                "portfolio": [{"currentPrice": 100.0, "quantity": 10, "dailyReturn": 0.02}],
                "confidenceLevel": "95",
                "timeHorizon": 1,
            }))
            .reply(&test_routes())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["portfolioValue"], 1000.0);
        assert!((body["var"].as_f64().unwrap() - 32.9).abs() < 1e-9);
        assert!((body["cvar"].as_f64().unwrap() - 39.48).abs() < 1e-9);
    }

    #[tokio::test]
    async fn risk_metrics_tolerates_empty_body() {
        let response = warp::test::request()
            .method("POST")
            .path("/api/risk-metrics")
            .json(&json!({}))
            .reply(&test_routes())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["portfolioValue"], 0.0);
    }

    #[tokio::test]
    async fn loan_with_unloaded_model_is_500() {
        let response = warp::test::request()
            .method("POST")
            .path("/predict-loan")
            .json(&json!({
                "self_employed": 0,
                "income_annum": 9600000,
                "loan_amount": 29900000,
                "loan_term": 12,
                "cibil_score": 778,
            }))
            .reply(&test_routes())
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["error"], "Loan prediction model not loaded");
    }
}
