// src/artifacts.rs
use crate::error::ApiError;
use log::{info, warn};
use ndarray::{Array2, Array3};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use serde::Deserialize;
use std::path::Path;
use std::sync::Mutex;

/// Number of trailing closes the forecast model consumes.
pub const FORECAST_WINDOW: usize = 30;
/// Number of days the forecast model predicts.
pub const FORECAST_HORIZON: usize = 7;

/// Min-max scaler fitted alongside the forecast model, loaded from a JSON
/// sidecar exported at training time.
#[derive(Deserialize, Debug, Clone)]
pub struct PriceScaler {
    pub data_min: f64,
    pub data_max: f64,
}

impl PriceScaler {
    pub fn transform(&self, price: f64) -> f64 {
        let range = self.data_max - self.data_min;
        if range == 0.0 {
            return 0.0;
        }
        (price - self.data_min) / range
    }

    pub fn inverse(&self, scaled: f64) -> f64 {
        scaled * (self.data_max - self.data_min) + self.data_min
    }
}

/// Process-wide read-only handles to the pre-trained artifacts. Each handle
/// is `None` if its load failed at startup; it is never replaced afterwards.
/// ONNX sessions need `&mut self` to run, hence the mutexes.
pub struct Artifacts {
    forecast: Option<Mutex<Session>>,
    scaler: Option<PriceScaler>,
    loan: Option<Mutex<Session>>,
}

impl Artifacts {
    /// Loads all three artifacts. Each load is independent: a failure logs a
    /// warning, disables the dependent endpoint, and the process continues.
    pub fn load(forecast_path: &str, scaler_path: &str, loan_path: &str) -> Self {
        let forecast = match load_session(forecast_path) {
            Ok(session) => {
                info!("Successfully loaded forecast model from {}", forecast_path);
                Some(Mutex::new(session))
            }
            Err(e) => {
                warn!("Error loading forecast model from {}: {}", forecast_path, e);
                None
            }
        };

        let scaler = match load_scaler(scaler_path) {
            Ok(scaler) => {
                info!("Successfully loaded scaler from {}", scaler_path);
                Some(scaler)
            }
            Err(e) => {
                warn!("Error loading scaler from {}: {}", scaler_path, e);
                None
            }
        };

        let loan = match load_session(loan_path) {
            Ok(session) => {
                info!("Successfully loaded loan approval model from {}", loan_path);
                Some(Mutex::new(session))
            }
            Err(e) => {
                warn!("Error loading loan approval model from {}: {}", loan_path, e);
                None
            }
        };

        Artifacts {
            forecast,
            scaler,
            loan,
        }
    }

    /// Constructs an `Artifacts` with nothing loaded. Used by tests to
    /// exercise the model-unavailable paths.
    #[cfg(test)]
    pub fn unloaded() -> Self {
        Artifacts {
            forecast: None,
            scaler: None,
            loan: None,
        }
    }

    pub fn forecast_available(&self) -> bool {
        self.forecast.is_some() && self.scaler.is_some()
    }

    pub fn loan_available(&self) -> bool {
        self.loan.is_some()
    }

    /// Runs the sequence model over a window of raw closes, oldest first.
    /// Scales in, infers, inverse-scales out. Prices are not rounded here.
    pub fn forecast_prices(&self, closes: &[f64]) -> Result<Vec<f64>, ApiError> {
        let (session, scaler) = match (&self.forecast, &self.scaler) {
            (Some(session), Some(scaler)) => (session, scaler),
            _ => {
                return Err(ApiError::ModelUnavailable(
                    "Prediction model not loaded".to_string(),
                ))
            }
        };
        if closes.len() != FORECAST_WINDOW {
            return Err(ApiError::Unexpected(format!(
                "Forecast window must have {} closes, got {}",
                FORECAST_WINDOW,
                closes.len()
            )));
        }

        // LSTM input layout: [samples, time steps, features]
        let mut input = Array3::<f32>::zeros((1, FORECAST_WINDOW, 1));
        for (i, &price) in closes.iter().enumerate() {
            input[[0, i, 0]] = scaler.transform(price) as f32;
        }

        let input_tensor = Value::from_array(input).map_err(internal)?;
        let mut session = session
            .lock()
            .map_err(|_| ApiError::Unexpected("Forecast model session poisoned".to_string()))?;
        let outputs = session.run(ort::inputs![input_tensor]).map_err(internal)?;

        let (_, scaled) = outputs[0].try_extract_tensor::<f32>().map_err(internal)?;
        if scaled.len() != FORECAST_HORIZON {
            return Err(ApiError::Unexpected(format!(
                "Model produced {} outputs, expected {}",
                scaled.len(),
                FORECAST_HORIZON
            )));
        }

        Ok(scaled.iter().map(|&v| scaler.inverse(v as f64)).collect())
    }

    /// Runs the loan classifier. Returns the predicted class label and the
    /// per-class probability vector.
    pub fn classify_loan(&self, features: [f32; 5]) -> Result<(i64, Vec<f32>), ApiError> {
        let session = self.loan.as_ref().ok_or_else(|| {
            ApiError::ModelUnavailable("Loan prediction model not loaded".to_string())
        })?;

        let input = Array2::<f32>::from_shape_vec((1, 5), features.to_vec())
            .map_err(|e| ApiError::Unexpected(format!("Bad feature shape: {}", e)))?;
        let input_tensor = Value::from_array(input).map_err(internal)?;

        let mut session = session
            .lock()
            .map_err(|_| ApiError::Unexpected("Loan model session poisoned".to_string()))?;
        let outputs = session.run(ort::inputs![input_tensor]).map_err(internal)?;

        // sklearn-exported classifiers emit a label tensor and, with zipmap
        // disabled, a plain probability tensor.
        let (_, labels) = outputs[0].try_extract_tensor::<i64>().map_err(internal)?;
        let label = *labels
            .first()
            .ok_or_else(|| ApiError::Unexpected("Classifier returned no label".to_string()))?;
        let (_, probs) = outputs[1].try_extract_tensor::<f32>().map_err(internal)?;

        Ok((label, probs.to_vec()))
    }
}

fn load_session(path: &str) -> Result<Session, ort::Error> {
    Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(1)?
        .commit_from_file(path)
}

fn load_scaler(path: &str) -> Result<PriceScaler, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(Path::new(path))?;
    let scaler: PriceScaler = serde_json::from_str(&raw)?;
    Ok(scaler)
}

fn internal(e: ort::Error) -> ApiError {
    ApiError::Unexpected(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaler_round_trips() {
        let scaler = PriceScaler {
            data_min: 50.0,
            data_max: 250.0,
        };
        let price = 137.5;
        let scaled = scaler.transform(price);
        assert!((0.0..=1.0).contains(&scaled));
        assert!((scaler.inverse(scaled) - price).abs() < 1e-9);
    }

    #[test]
    fn degenerate_scaler_does_not_divide_by_zero() {
        let scaler = PriceScaler {
            data_min: 100.0,
            data_max: 100.0,
        };
        assert_eq!(scaler.transform(123.0), 0.0);
    }

    #[test]
    fn unloaded_artifacts_report_unavailable() {
        let artifacts = Artifacts::unloaded();
        assert!(!artifacts.forecast_available());
        assert!(!artifacts.loan_available());
        let closes = vec![100.0; FORECAST_WINDOW];
        match artifacts.forecast_prices(&closes) {
            Err(ApiError::ModelUnavailable(_)) => {}
            other => panic!("expected ModelUnavailable, got {:?}", other.err()),
        }
        match artifacts.classify_loan([0.0; 5]) {
            Err(ApiError::ModelUnavailable(_)) => {}
            other => panic!("expected ModelUnavailable, got {:?}", other.err()),
        }
    }
}
