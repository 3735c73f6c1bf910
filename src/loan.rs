// src/loan.rs
use crate::artifacts::Artifacts;
use crate::error::ApiError;
use crate::models::{LoanApplication, LoanDecision, LoanDetails};
use log::info;
use serde_json::Value;

const REQUIRED_FIELDS: [&str; 5] = [
    "self_employed",
    "income_annum",
    "loan_amount",
    "loan_term",
    "cibil_score",
];

/// Validates and coerces a raw JSON application body. All five required
/// fields must be present (extras are ignored); a missing field and a bad
/// type are distinct errors.
pub fn coerce_application(body: &Value) -> Result<LoanApplication, ApiError> {
    let object = body
        .as_object()
        .ok_or_else(|| ApiError::MissingInput("Missing required fields".to_string()))?;

    if REQUIRED_FIELDS.iter().any(|f| !object.contains_key(*f)) {
        return Err(ApiError::MissingInput("Missing required fields".to_string()));
    }

    Ok(LoanApplication {
        self_employed: coerce_int(&object["self_employed"], "self_employed")?,
        income_annum: coerce_float(&object["income_annum"], "income_annum")?,
        loan_amount: coerce_float(&object["loan_amount"], "loan_amount")?,
        loan_term: coerce_int(&object["loan_term"], "loan_term")?,
        cibil_score: coerce_int(&object["cibil_score"], "cibil_score")?,
    })
}

/// Scores one application with the pre-trained classifier. Label 1 maps to
/// Approved, 0 to Rejected; confidence is the probability of the predicted
/// class as a percentage.
pub fn predict(artifacts: &Artifacts, body: &Value) -> Result<LoanDecision, ApiError> {
    if !artifacts.loan_available() {
        return Err(ApiError::ModelUnavailable(
            "Loan prediction model not loaded".to_string(),
        ));
    }

    let application = coerce_application(body)?;
    let features = [
        application.self_employed as f32,
        application.income_annum as f32,
        application.loan_amount as f32,
        application.loan_term as f32,
        application.cibil_score as f32,
    ];

    let (label, probabilities) = artifacts.classify_loan(features)?;
    let loan_status = if label == 1 { "Approved" } else { "Rejected" };
    let confidence = probabilities
        .get(label.max(0) as usize)
        .copied()
        .ok_or_else(|| {
            ApiError::Unexpected(format!(
                "Classifier probability vector has no entry for class {}",
                label
            ))
        })?;
    let confidence = ((confidence as f64 * 100.0) * 100.0).round() / 100.0;

    info!(
        "Loan application scored: {} ({}% confidence)",
        loan_status, confidence
    );
    Ok(LoanDecision {
        loan_status: loan_status.to_string(),
        confidence,
        details: LoanDetails {
            self_employed: application.self_employed != 0,
            income_annum: application.income_annum,
            loan_amount: application.loan_amount,
            loan_term: application.loan_term,
            cibil_score: application.cibil_score,
        },
    })
}

/// Integer coercion accepting bools, numbers (floats truncate), and numeric
/// strings.
fn coerce_int(value: &Value, field: &str) -> Result<i64, ApiError> {
    match value {
        Value::Bool(b) => Ok(*b as i64),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| bad_type(field, "integer")),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .or_else(|_| s.trim().parse::<f64>().map(|f| f as i64))
            .map_err(|_| bad_type(field, "integer")),
        _ => Err(bad_type(field, "integer")),
    }
}

fn coerce_float(value: &Value, field: &str) -> Result<f64, ApiError> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| bad_type(field, "number")),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| bad_type(field, "number")),
        _ => Err(bad_type(field, "number")),
    }
}

fn bad_type(field: &str, expected: &str) -> ApiError {
    ApiError::Validation(format!(
        "Invalid data types in request: could not convert '{}' to {}",
        field, expected
    ))
}
