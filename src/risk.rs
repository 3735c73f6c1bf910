// src/risk.rs
use crate::models::{Position, RiskMetrics, RiskRequest};
use serde_json::Value;

const TRADING_DAYS: f64 = 252.0;
/// Standard-normal quantiles for the two supported confidence levels.
const Z_95: f64 = 1.645;
const Z_99: f64 = 2.326;
/// CVaR is approximated as a fixed multiple of VaR, not a tail expectation.
const CVAR_MULTIPLIER: f64 = 1.2;

/// Computes parametric VaR/CVaR for a client-supplied portfolio.
///
/// Portfolio variance ignores cross-asset correlation: it is the sum of
/// squared weighted daily returns. That simplification is the contract,
/// not a defect.
pub fn compute_risk(portfolio: &[Position], confidence_level: &str, time_horizon: f64) -> RiskMetrics {
    let total_value: f64 = portfolio
        .iter()
        .map(|p| p.current_price * p.quantity)
        .sum();

    let mut variance = 0.0;
    for position in portfolio {
        let value = position.current_price * position.quantity;
        let weight = if total_value > 0.0 {
            value / total_value
        } else {
            0.0
        };
        variance += (weight * position.daily_return).powi(2);
    }

    let annualized_volatility = variance.sqrt() * TRADING_DAYS.sqrt();
    // "95" gets the 95% quantile; every other value falls through to 99%.
    let z_score = if confidence_level == "95" { Z_95 } else { Z_99 };
    let daily_volatility = annualized_volatility / TRADING_DAYS.sqrt();
    let var = total_value * z_score * daily_volatility * time_horizon.sqrt();

    RiskMetrics {
        var,
        cvar: var * CVAR_MULTIPLIER,
        volatility: annualized_volatility * 100.0,
        portfolio_value: total_value,
    }
}

/// Normalizes the loosely-typed request fields: confidence arrives as a
/// string or number (default "99"), the horizon as a number or numeric
/// string (default 1 day).
pub fn risk_metrics_for(request: &RiskRequest) -> RiskMetrics {
    let confidence = match &request.confidence_level {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "99".to_string(),
    };
    let horizon = match &request.time_horizon {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(1.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(1.0),
        _ => 1.0,
    };
    compute_risk(&request.portfolio, &confidence, horizon)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(price: f64, quantity: f64, daily_return: f64) -> Position {
        Position {
            current_price: price,
            quantity,
            daily_return,
        }
    }

    #[test]
    fn single_position_reference_numbers() {
        let portfolio = vec![position(100.0, 10.0, 0.02)];
        let metrics = compute_risk(&portfolio, "95", 1.0);

        assert_eq!(metrics.portfolio_value, 1000.0);
        // Full weight on one position: variance = (1.0 * 0.02)^2.
        let expected_vol = (0.0004_f64).sqrt() * 252.0_f64.sqrt() * 100.0;
        assert!((metrics.volatility - expected_vol).abs() < 1e-9);
        // VaR reduces to value * z * dailyReturn for a single position.
        assert!((metrics.var - 32.9).abs() < 1e-9);
        assert!((metrics.cvar - 39.48).abs() < 1e-9);
    }

    #[test]
    fn unknown_confidence_level_uses_99_percent_quantile() {
        let portfolio = vec![position(100.0, 10.0, 0.02)];
        let at_99 = compute_risk(&portfolio, "99", 1.0);
        let at_unknown = compute_risk(&portfolio, "banana", 1.0);
        assert_eq!(at_99, at_unknown);
        assert!((at_99.var - 1000.0 * 2.326 * 0.02).abs() < 1e-9);
    }

    #[test]
    fn empty_portfolio_yields_zeros() {
        let metrics = compute_risk(&[], "95", 1.0);
        assert_eq!(metrics.portfolio_value, 0.0);
        assert_eq!(metrics.var, 0.0);
        assert_eq!(metrics.cvar, 0.0);
        assert_eq!(metrics.volatility, 0.0);
    }

    #[test]
    fn zero_total_value_does_not_divide_by_zero() {
        let portfolio = vec![position(0.0, 10.0, 0.05)];
        let metrics = compute_risk(&portfolio, "95", 1.0);
        assert_eq!(metrics.var, 0.0);
        assert_eq!(metrics.volatility, 0.0);
    }

    #[test]
    fn horizon_scales_var_by_square_root() {
        let portfolio = vec![position(100.0, 10.0, 0.02)];
        let one_day = compute_risk(&portfolio, "95", 1.0);
        let four_day = compute_risk(&portfolio, "95", 4.0);
        assert!((four_day.var - one_day.var * 2.0).abs() < 1e-9);
    }

    #[test]
    fn request_defaults_apply() {
        let request = RiskRequest {
            portfolio: vec![position(100.0, 10.0, 0.02)],
            confidence_level: None,
            time_horizon: None,
        };
        let metrics = risk_metrics_for(&request);
        // Defaults: 99% confidence, 1-day horizon.
        assert!((metrics.var - 1000.0 * 2.326 * 0.02).abs() < 1e-9);
    }

    #[test]
    fn numeric_confidence_level_matches_string_form() {
        let request = RiskRequest {
            portfolio: vec![position(100.0, 10.0, 0.02)],
            confidence_level: Some(serde_json::json!(95)),
            time_horizon: Some(serde_json::json!(1)),
        };
        let metrics = risk_metrics_for(&request);
        assert!((metrics.var - 32.9).abs() < 1e-9);
    }
}
