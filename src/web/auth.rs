use crate::db;
use crate::domain::models::User;
use crate::middleware::rate_limit::rate_limit_by_ip;
use crate::state::SharedState;
use crate::web::session::{self, UserSession, OAUTH_STATE_COOKIE, SESSION_COOKIE};
use crate::web::ApiError;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

pub fn router(state: SharedState) -> Router {
    let limited = Router::new()
        .route("/login", get(login))
        .route("/callback", get(callback))
        .layer(middleware::from_fn_with_state(
            state.login_limiter.clone(),
            rate_limit_by_ip,
        ));

    Router::new()
        .merge(limited)
        .route("/logout", post(logout))
        .route("/me", get(me))
        .with_state(state)
}

fn set_cookies(cookies: &[String]) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    for cookie in cookies {
        let value = HeaderValue::from_str(cookie).map_err(|_| ApiError::internal())?;
        headers.append(header::SET_COOKIE, value);
    }
    Ok(headers)
}

fn new_nonce() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn unauthorized(code: &'static str, message: &str) -> ApiError {
    ApiError::new(StatusCode::UNAUTHORIZED, code, message)
}

async fn login(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let nonce = new_nonce();
    let oauth_state = session::sign_oauth_state(&nonce, &state.config.session_key)
        .map_err(|_| ApiError::internal())?;
    let url = state.oauth.authorize_url(&oauth_state).map_err(|e| {
        tracing::error!("Failed to build authorize url: {}", e);
        ApiError::internal()
    })?;

    let headers = set_cookies(&[session::oauth_state_cookie(
        &nonce,
        state.config.secure_cookies,
    )])?;
    Ok((headers, Redirect::to(url.as_str())))
}

async fn callback(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(error) = params.error {
        tracing::warn!("OAuth provider returned error: {}", error);
        return Err(unauthorized("oauth_denied", "Sign-in was cancelled."));
    }
    let (Some(code), Some(oauth_state)) = (params.code, params.state) else {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "invalid_callback",
            "Missing code or state.",
        ));
    };

    let nonce = session::verify_oauth_state(&oauth_state, &state.config.session_key).map_err(|e| {
        tracing::warn!("OAuth state rejected: {}", e);
        unauthorized("invalid_state", "Sign-in expired. Please try again.")
    })?;
    if session::read_cookie(&headers, OAUTH_STATE_COOKIE).as_deref() != Some(nonce.as_str()) {
        tracing::warn!("OAuth state cookie missing or mismatched");
        return Err(unauthorized("invalid_state", "Sign-in expired. Please try again."));
    }

    let token = state.oauth.exchange_code(&code).await.map_err(|e| {
        tracing::error!("OAuth code exchange failed: {}", e);
        unauthorized("oauth_failed", "Could not sign in with the provider.")
    })?;
    let profile = state.oauth.fetch_profile(&token.access_token).await.map_err(|e| {
        tracing::error!("OAuth profile fetch failed: {}", e);
        unauthorized("oauth_failed", "Could not sign in with the provider.")
    })?;
    let email = profile.email.as_deref().unwrap_or_default();

    let user = db::upsert_oauth_user(
        &state.pool,
        email,
        profile.name.as_deref(),
        profile.picture.as_deref(),
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to upsert user: {}", e);
        ApiError::internal()
    })?;

    let session_token = session::sign_session(user.id, &state.config.session_key)
        .map_err(|_| ApiError::internal())?;
    let secure = state.config.secure_cookies;
    let headers = set_cookies(&[
        session::session_cookie(&session_token, secure),
        session::cookie(OAUTH_STATE_COOKIE, "", 0, secure),
    ])?;

    tracing::info!("User {} signed in", user.id);
    Ok((headers, Redirect::to("/")))
}

async fn logout(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let headers = set_cookies(&[session::cookie(
        SESSION_COOKIE,
        "",
        0,
        state.config.secure_cookies,
    )])?;
    Ok((StatusCode::NO_CONTENT, headers))
}

async fn me(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<User>, ApiError> {
    let user = db::find_user_by_id(&state.pool, user_id)
        .await
        .map_err(|e| {
            tracing::error!("User lookup failed: {}", e);
            ApiError::internal()
        })?
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "not_found", "User not found."))?;
    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_is_random_and_cookie_safe() {
        let a = new_nonce();
        let b = new_nonce();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_set_cookies_appends_each_cookie() {
        let headers = set_cookies(&[
            session::session_cookie("tok", false),
            session::cookie(OAUTH_STATE_COOKIE, "", 0, false),
        ])
        .unwrap();
        let values: Vec<_> = headers.get_all(header::SET_COOKIE).iter().collect();
        assert_eq!(values.len(), 2);
        assert!(values[1].to_str().unwrap().starts_with("oauth_state=;"));
    }
}
