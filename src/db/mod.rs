use crate::domain::models::{SickDayRecord, User};
use anyhow::Result;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

pub async fn find_user_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, name, image, created_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

/// Creates the user on first login, otherwise refreshes name and avatar.
pub async fn upsert_oauth_user(
    pool: &PgPool,
    email: &str,
    name: Option<&str>,
    image: Option<&str>,
) -> Result<User> {
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, email, name, image)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE
        SET name = COALESCE(EXCLUDED.name, users.name),
            image = COALESCE(EXCLUDED.image, users.image)
        RETURNING id, email, name, image, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email.trim().to_lowercase())
    .bind(name)
    .bind(image)
    .fetch_one(pool)
    .await?;
    Ok(user)
}

/// All stored days for `user_id` in `[start, end]`, oldest first. Includes
/// intensity 0 rows; filtering is the statistics engine's job.
pub async fn fetch_sick_days(
    pool: &PgPool,
    user_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<SickDayRecord>> {
    let records = sqlx::query_as::<_, SickDayRecord>(
        r#"
        SELECT date, intensity
        FROM sick_days
        WHERE user_id = $1
          AND date BETWEEN $2 AND $3
        ORDER BY date ASC
        "#,
    )
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;
    Ok(records)
}

/// Single-row upsert; the last write for a (user, date) wins.
pub async fn upsert_sick_day(
    pool: &PgPool,
    user_id: Uuid,
    date: NaiveDate,
    intensity: i16,
) -> Result<SickDayRecord> {
    let record = sqlx::query_as::<_, SickDayRecord>(
        r#"
        INSERT INTO sick_days (id, user_id, date, intensity)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, date) DO UPDATE
        SET intensity = EXCLUDED.intensity,
            updated_at = now()
        RETURNING date, intensity
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(date)
    .bind(intensity)
    .fetch_one(pool)
    .await?;
    Ok(record)
}
