// src/error.rs
use log::error;
use serde_json::json;
use std::convert::Infallible;
use std::fmt;
use warp::http::StatusCode;
use warp::reject::Reject;
use warp::{Rejection, Reply};

/// Closed set of failure kinds surfaced by the API.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// Required input missing from the request (400).
    MissingInput(String),
    /// Input present but not coercible to the expected type (400).
    Validation(String),
    /// A model artifact failed to load at startup (500).
    ModelUnavailable(String),
    /// An external quote or history provider failed (500 at the
    /// request boundary; per-symbol isolated for quote batches).
    Upstream(String),
    /// Anything else (500).
    Unexpected(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingInput(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::ModelUnavailable(_) | ApiError::Upstream(_) | ApiError::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::MissingInput(m)
            | ApiError::Validation(m)
            | ApiError::ModelUnavailable(m)
            | ApiError::Upstream(m)
            | ApiError::Unexpected(m) => m,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl Reject for ApiError {}

/// Maps rejections to the `{"error": ...}` JSON bodies the frontend expects.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(api_err) = err.find::<ApiError>() {
        (api_err.status(), api_err.message().to_string())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e))
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed".to_string(),
        )
    } else {
        error!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "error": message })),
        status,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_map_to_400() {
        assert_eq!(
            ApiError::MissingInput("No symbols provided".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Validation("bad field".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn server_side_errors_map_to_500() {
        assert_eq!(
            ApiError::ModelUnavailable("model not loaded".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Upstream("HTTP 502".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Unexpected("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
