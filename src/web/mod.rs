pub mod auth;
pub mod session;
pub mod sick_days;
pub mod stats;

use crate::domain::date_range::{GridMode, GridModeError};
use crate::middleware::rate_limit::too_many_requests;
use crate::state::SharedState;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

async fn health() -> &'static str {
    "OK"
}

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::router(state.clone()))
        .nest("/sick-days", sick_days::router(state.clone()))
        .nest("/stats", stats::router(state))
}

/// `?mode=rolling|year&year=YYYY`, shared by the grid and stats endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct WindowQuery {
    pub mode: Option<String>,
    pub year: Option<i32>,
}

impl WindowQuery {
    pub fn grid_mode(&self, today: NaiveDate) -> Result<GridMode, ApiError> {
        GridMode::from_params(self.mode.as_deref(), self.year, today).map_err(ApiError::from)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

/// JSON error response: `{ "error": code, "message": text }`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub retry_after: Option<Duration>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "Something went wrong. Please try again.",
        )
    }

    pub fn rate_limited(retry_after: Duration) -> Self {
        Self {
            retry_after: Some(retry_after),
            ..Self::new(
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Too many requests. Please try again later.",
            )
        }
    }
}

impl From<GridModeError> for ApiError {
    fn from(err: GridModeError) -> Self {
        let code = match err {
            GridModeError::UnknownMode(_) => "invalid_mode",
            GridModeError::InvalidYear(_) => "invalid_year",
        };
        ApiError::new(StatusCode::BAD_REQUEST, code, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Some(retry_after) = self.retry_after {
            return too_many_requests(retry_after);
        }
        let body = ErrorBody {
            error: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_query_errors_are_bad_requests() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let query = WindowQuery {
            mode: Some("fortnight".to_string()),
            year: None,
        };
        let err = query.grid_mode(today).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "invalid_mode");

        let query = WindowQuery {
            mode: None,
            year: Some(12),
        };
        assert_eq!(query.grid_mode(today).unwrap_err().code, "invalid_year");

        assert_eq!(
            WindowQuery::default().grid_mode(today).unwrap(),
            GridMode::Rolling12Months
        );
    }

    #[test]
    fn test_rate_limited_response() {
        let response = ApiError::rate_limited(Duration::from_secs(30)).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "30");
    }
}
