use crate::analytics::stats::{self, UserStats};
use crate::db;
use crate::domain::date_range::GridMode;
use crate::domain::models::SickDayRecord;
use crate::domain::window::Window;
use crate::state::SharedState;
use crate::web::session::UserSession;
use crate::web::{ApiError, WindowQuery};
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use uuid::Uuid;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(window_stats))
        .route("/year/:year", get(year_stats))
        .with_state(state)
}

/// Loads enough records for both the requested window and year-to-date.
async fn load_records(
    state: &SharedState,
    user_id: Uuid,
    window: &Window,
    today: NaiveDate,
) -> Result<Vec<SickDayRecord>, ApiError> {
    let span = window.union(&Window::year_to_date(today));
    db::fetch_sick_days(&state.pool, user_id, span.start, span.end)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch sick days for {}: {}", user_id, e);
            ApiError::internal()
        })
}

fn stats_failed(user_id: Uuid, err: stats::StatsError) -> ApiError {
    tracing::error!("Stats computation failed for {}: {}", user_id, err);
    ApiError::internal()
}

async fn window_stats(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<UserStats>, ApiError> {
    let today = state.config.timezone.today();
    let window = query.grid_mode(today)?.window(today)?;
    let records = load_records(&state, user_id, &window, today).await?;

    let result = stats::compute(&records, &window, today).map_err(|e| stats_failed(user_id, e))?;
    Ok(Json(result))
}

async fn year_stats(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(year): Path<i32>,
) -> Result<Json<UserStats>, ApiError> {
    let today = state.config.timezone.today();
    let window = GridMode::from_params(Some("year"), Some(year), today)?.window(today)?;
    let records = load_records(&state, user_id, &window, today).await?;

    let result =
        stats::compute_for_year(&records, year, today).map_err(|e| stats_failed(user_id, e))?;
    Ok(Json(result))
}
