use crate::db;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "session";
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

const SESSION_TTL_HOURS: i64 = 24;
const OAUTH_STATE_TTL_MINUTES: i64 = 10;

/// Tokens are `base64(payload).base64(hmac)` where the payload is
/// `purpose|subject|exp`. The purpose keeps an OAuth state from being replayed
/// as a session and vice versa.
const PURPOSE_SESSION: &str = "session";
const PURPOSE_OAUTH_STATE: &str = "oauth";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub user_id: Uuid,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid token format")]
    Invalid,
    #[error("signature mismatch")]
    Signature,
    #[error("expired")]
    Expired,
    #[error("token issued for a different purpose")]
    Purpose,
}

pub fn sign_session(user_id: Uuid, key: &[u8]) -> Result<String, SessionError> {
    let exp = Utc::now() + Duration::hours(SESSION_TTL_HOURS);
    sign(PURPOSE_SESSION, &user_id.to_string(), exp.timestamp(), key)
}

pub fn verify_session(token: &str, key: &[u8]) -> Result<SessionClaims, SessionError> {
    let (subject, exp) = verify(PURPOSE_SESSION, token, key)?;
    let user_id = Uuid::parse_str(&subject).map_err(|_| SessionError::Invalid)?;
    Ok(SessionClaims { user_id, exp })
}

/// Signed `state` parameter for the OAuth redirect. `nonce` is also stored in a
/// cookie so the callback can check the flow started in the same browser.
pub fn sign_oauth_state(nonce: &str, key: &[u8]) -> Result<String, SessionError> {
    let exp = Utc::now() + Duration::minutes(OAUTH_STATE_TTL_MINUTES);
    sign(PURPOSE_OAUTH_STATE, nonce, exp.timestamp(), key)
}

/// Returns the nonce carried by a valid state.
pub fn verify_oauth_state(state: &str, key: &[u8]) -> Result<String, SessionError> {
    verify(PURPOSE_OAUTH_STATE, state, key).map(|(nonce, _)| nonce)
}

fn sign(purpose: &str, subject: &str, exp: i64, key: &[u8]) -> Result<String, SessionError> {
    if subject.contains('|') {
        return Err(SessionError::Invalid);
    }
    let payload = format!("{}|{}|{}", purpose, subject, exp);
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::Invalid)?;
    mac.update(payload.as_bytes());
    let sig = mac.finalize().into_bytes();
    Ok(format!(
        "{}.{}",
        general_purpose::URL_SAFE_NO_PAD.encode(payload.as_bytes()),
        general_purpose::URL_SAFE_NO_PAD.encode(sig)
    ))
}

fn verify(purpose: &str, token: &str, key: &[u8]) -> Result<(String, i64), SessionError> {
    let (payload_b64, sig_b64) = token.split_once('.').ok_or(SessionError::Invalid)?;
    let payload_bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| SessionError::Invalid)?;
    let sig_bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(sig_b64)
        .map_err(|_| SessionError::Invalid)?;

    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::Invalid)?;
    mac.update(&payload_bytes);
    mac.verify_slice(&sig_bytes)
        .map_err(|_| SessionError::Signature)?;

    let payload = String::from_utf8(payload_bytes).map_err(|_| SessionError::Invalid)?;
    let pieces: Vec<&str> = payload.split('|').collect();
    let [token_purpose, subject, exp] = pieces.as_slice() else {
        return Err(SessionError::Invalid);
    };
    if *token_purpose != purpose {
        return Err(SessionError::Purpose);
    }
    let exp: i64 = exp.parse().map_err(|_| SessionError::Invalid)?;
    if Utc::now().timestamp() > exp {
        return Err(SessionError::Expired);
    }
    Ok((subject.to_string(), exp))
}

/// Value of cookie `name`, if present.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers.get(header::AUTHORIZATION) {
        if let Ok(val) = auth.to_str() {
            if let Some(bearer) = val.strip_prefix("Bearer ") {
                return Some(bearer.trim().to_string());
            }
        }
    }
    read_cookie(headers, SESSION_COOKIE)
}

/// `Set-Cookie` value. `max_age` of zero clears the cookie.
pub fn cookie(name: &str, value: &str, max_age_secs: i64, secure: bool) -> String {
    let secure_flag = if secure { "; Secure" } else { "" };
    format!(
        "{name}={value}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age_secs}{secure_flag}"
    )
}

pub fn session_cookie(token: &str, secure: bool) -> String {
    cookie(SESSION_COOKIE, token, SESSION_TTL_HOURS * 3600, secure)
}

pub fn oauth_state_cookie(nonce: &str, secure: bool) -> String {
    cookie(OAUTH_STATE_COOKIE, nonce, OAUTH_STATE_TTL_MINUTES * 60, secure)
}

// ============================================
// Axum Extractor for UserSession
// ============================================

/// Authenticated user id. Rejects with 401 when the token is missing, invalid,
/// expired, or belongs to a user that no longer exists.
pub struct UserSession(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for UserSession
where
    S: Send + Sync,
    crate::state::SharedState: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let shared_state = crate::state::SharedState::from_ref(state);

        let token = extract_token(&parts.headers).ok_or(StatusCode::UNAUTHORIZED)?;

        let claims = verify_session(&token, &shared_state.config.session_key).map_err(|e| {
            tracing::warn!("Session verification failed: {}", e);
            StatusCode::UNAUTHORIZED
        })?;

        let user = db::find_user_by_id(&shared_state.pool, claims.user_id)
            .await
            .map_err(|e| {
                tracing::error!("User lookup failed for session: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            })?;

        if user.is_none() {
            return Err(StatusCode::UNAUTHORIZED);
        }

        Ok(UserSession(claims.user_id))
    }
}
