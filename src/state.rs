use crate::config::Config;
use crate::middleware::RateLimiter;
use crate::services::oauth::OAuthClient;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub oauth: OAuthClient,
    /// Per-IP limit on the login flow.
    pub login_limiter: RateLimiter,
    /// Per-user limit on grid writes.
    pub write_limiter: RateLimiter,
}

pub type SharedState = Arc<AppState>;
