use crate::db;
use crate::domain::date_range::{self, GridCell};
use crate::domain::models::{is_valid_intensity, SickDayRecord, MAX_INTENSITY};
use crate::middleware::RateLimiter;
use crate::state::SharedState;
use crate::web::session::UserSession;
use crate::web::{ApiError, WindowQuery};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(grid).post(upsert))
        .with_state(state)
}

#[derive(Serialize)]
struct GridResponse {
    mode: &'static str,
    today: NaiveDate,
    /// Statistics window, inclusive.
    start: NaiveDate,
    end: NaiveDate,
    cells: Vec<GridCell>,
}

#[derive(Deserialize)]
struct UpsertPayload {
    date: String,
    intensity: i16,
}

#[derive(Debug, PartialEq, Eq)]
enum EntryError {
    BadDate,
    FutureDate,
    BadIntensity,
}

impl From<EntryError> for ApiError {
    fn from(err: EntryError) -> Self {
        match err {
            EntryError::BadDate => ApiError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_date",
                "Date must be formatted as YYYY-MM-DD.",
            ),
            EntryError::FutureDate => ApiError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "future_date",
                "Days in the future can't be recorded.",
            ),
            EntryError::BadIntensity => ApiError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_intensity",
                format!("Intensity must be between 0 and {MAX_INTENSITY}."),
            ),
        }
    }
}

/// Write-side checks that keep bad rows away from the statistics engine.
fn validate_entry(raw_date: &str, intensity: i16, today: NaiveDate) -> Result<NaiveDate, EntryError> {
    let date = NaiveDate::parse_from_str(raw_date.trim(), "%Y-%m-%d")
        .map_err(|_| EntryError::BadDate)?;
    if date > today {
        return Err(EntryError::FutureDate);
    }
    if !is_valid_intensity(intensity) {
        return Err(EntryError::BadIntensity);
    }
    Ok(date)
}

/// Validates the entry, then spends one unit of the user's write quota. Rejected
/// entries never count against the limit.
async fn admit_write(
    limiter: &RateLimiter,
    user_id: Uuid,
    payload: &UpsertPayload,
    today: NaiveDate,
) -> Result<NaiveDate, ApiError> {
    let date = validate_entry(&payload.date, payload.intensity, today)?;
    if let Err(retry_after) = limiter.check(&user_id.to_string()).await {
        tracing::warn!("Write rate limit exceeded for user {}", user_id);
        return Err(ApiError::rate_limited(retry_after));
    }
    Ok(date)
}

async fn grid(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<GridResponse>, ApiError> {
    let today = state.config.timezone.today();
    let mode = query.grid_mode(today)?;
    let window = mode.window(today)?;
    let dates = date_range::generate(mode, today)?;

    let (Some(&first), Some(&last)) = (dates.first(), dates.last()) else {
        return Err(ApiError::internal());
    };
    let records = db::fetch_sick_days(&state.pool, user_id, first, last)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch sick days for {}: {}", user_id, e);
            ApiError::internal()
        })?;

    Ok(Json(GridResponse {
        mode: mode.as_str(),
        today,
        start: window.start,
        end: window.end,
        cells: date_range::build_grid(&dates, &records, &window, today),
    }))
}

async fn upsert(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<UpsertPayload>,
) -> Result<Json<SickDayRecord>, ApiError> {
    let today = state.config.timezone.today();
    let date = admit_write(&state.write_limiter, user_id, &payload, today).await?;

    let record = db::upsert_sick_day(&state.pool, user_id, date, payload.intensity)
        .await
        .map_err(|e| {
            tracing::error!("Failed to save sick day {} for {}: {}", date, user_id, e);
            ApiError::internal()
        })?;

    tracing::debug!("User {} set {} to intensity {}", user_id, record.date, record.intensity);
    Ok(Json(record))
}
