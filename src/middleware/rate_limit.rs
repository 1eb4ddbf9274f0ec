//! Sliding-window rate limiter kept in memory.
//!
//! One instance is built at startup, stored in `AppState`, and swept by an hourly
//! cleanup job. Nothing here is global.
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct RateLimiter {
    requests: Arc<RwLock<HashMap<String, Vec<Instant>>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window_secs: u64) -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Records a hit for `key` (IP, user id, ...). On rejection returns how long
    /// until the oldest hit in the window expires.
    pub async fn check(&self, key: &str) -> Result<(), Duration> {
        let now = Instant::now();
        let mut requests = self.requests.write().await;
        let hits = requests.entry(key.to_string()).or_default();

        hits.retain(|&at| now.duration_since(at) < self.window);

        if hits.len() < self.max_requests {
            hits.push(now);
            return Ok(());
        }

        let oldest = hits.first().copied().unwrap_or(now);
        Err(self.window.saturating_sub(now.duration_since(oldest)))
    }

    /// Drops expired hits and keys with nothing left.
    pub async fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut requests = self.requests.write().await;

        requests.retain(|_, hits| {
            hits.retain(|&at| now.duration_since(at) < self.window);
            !hits.is_empty()
        });

        tracing::debug!("Rate limiter cleanup: {} active keys", requests.len());
        requests.len()
    }
}

pub fn too_many_requests(retry_after: Duration) -> Response {
    let secs = retry_after.as_secs().max(1);
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        "Too many requests. Please try again later.",
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}

/// Per-IP limit for routes that run before a session exists.
pub async fn rate_limit_by_ip(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(limiter): State<RateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ip = addr.ip().to_string();

    if let Err(retry_after) = limiter.check(&ip).await {
        tracing::warn!("Rate limit exceeded for IP: {}", ip);
        return too_many_requests(retry_after);
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter() {
        let limiter = RateLimiter::new(3, 60);

        assert!(limiter.check("user_a").await.is_ok());
        assert!(limiter.check("user_a").await.is_ok());
        assert!(limiter.check("user_a").await.is_ok());

        let retry_after = limiter.check("user_a").await.unwrap_err();
        assert!(retry_after <= Duration::from_secs(60));
        assert!(retry_after > Duration::from_secs(55));

        assert!(limiter.check("user_b").await.is_ok());
    }

    #[tokio::test]
    async fn test_window_expiry_and_cleanup() {
        let limiter = RateLimiter::new(1, 1);

        assert!(limiter.check("ip1").await.is_ok());
        assert!(limiter.check("ip1").await.is_err());
        limiter.check("ip2").await.ok();

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(limiter.cleanup().await, 0);
        assert!(limiter.check("ip1").await.is_ok());
    }

    #[test]
    fn test_too_many_requests_sets_retry_after() {
        let response = too_many_requests(Duration::from_millis(200));
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "1");
    }
}
