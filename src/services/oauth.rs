use reqwest::Url;
use serde::Deserialize;
use tokio::time::{sleep, Duration};

const USER_AGENT: &str = concat!("sicksquares/", env!("CARGO_PKG_VERSION"));
const MAX_RETRIES: u64 = 2;

#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("invalid provider url: {0}")]
    Url(String),
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider profile has no email")]
    MissingEmail,
    #[error("provider reports the email as unverified")]
    UnverifiedEmail,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// Subset of the OpenID Connect userinfo claims we store.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthProfile {
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    pub name: Option<String>,
    #[serde(alias = "avatar_url")]
    pub picture: Option<String>,
}

#[derive(Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    settings: OAuthSettings,
}

impl OAuthClient {
    pub fn new(settings: OAuthSettings) -> Result<Self, OAuthError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self { http, settings })
    }

    /// Provider consent page for the authorization-code flow.
    pub fn authorize_url(&self, state: &str) -> Result<Url, OAuthError> {
        let url = Url::parse_with_params(
            &self.settings.auth_url,
            &[
                ("client_id", self.settings.client_id.as_str()),
                ("redirect_uri", self.settings.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", state),
            ],
        )
        .map_err(|e| OAuthError::Url(e.to_string()))?;
        Ok(url)
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, OAuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.settings.redirect_url.as_str()),
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
        ];

        let resp = self
            .http
            .post(&self.settings.token_url)
            .form(&params)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    /// Fetches the signed-in profile. Transport failures are retried; HTTP error
    /// statuses are not.
    pub async fn fetch_profile(&self, access_token: &str) -> Result<OAuthProfile, OAuthError> {
        let mut retries = 0;
        loop {
            let result = self
                .http
                .get(&self.settings.userinfo_url)
                .bearer_auth(access_token)
                .send()
                .await;

            match result {
                Ok(resp) => {
                    let profile: OAuthProfile = resp.error_for_status()?.json().await?;
                    if profile.email.as_deref().map_or(true, str::is_empty) {
                        return Err(OAuthError::MissingEmail);
                    }
                    if profile.email_verified == Some(false) {
                        return Err(OAuthError::UnverifiedEmail);
                    }
                    return Ok(profile);
                }
                Err(err) if retries < MAX_RETRIES && (err.is_connect() || err.is_timeout()) => {
                    retries += 1;
                    tracing::warn!("userinfo request failed (attempt {}): {}", retries, err);
                    sleep(Duration::from_millis(300 * retries)).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> OAuthSettings {
        OAuthSettings {
            client_id: "client-123".to_string(),
            client_secret: "secret".to_string(),
            redirect_url: "http://localhost:3000/auth/callback".to_string(),
            auth_url: "https://accounts.example.com/authorize".to_string(),
            token_url: "https://accounts.example.com/token".to_string(),
            userinfo_url: "https://accounts.example.com/userinfo".to_string(),
        }
    }

    #[test]
    fn test_authorize_url_carries_state_and_redirect() {
        let client = OAuthClient::new(settings()).unwrap();
        let url = client.authorize_url("abc.def").unwrap();

        assert_eq!(url.host_str(), Some("accounts.example.com"));
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], "client-123");
        assert_eq!(pairs["redirect_uri"], "http://localhost:3000/auth/callback");
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["state"], "abc.def");
    }

    #[test]
    fn test_authorize_url_rejects_bad_base() {
        let mut bad = settings();
        bad.auth_url = "not a url".to_string();
        let client = OAuthClient::new(bad).unwrap();
        assert!(matches!(client.authorize_url("s"), Err(OAuthError::Url(_))));
    }

    #[test]
    fn test_profile_accepts_github_style_avatar() {
        let profile: OAuthProfile = serde_json::from_str(
            r#"{"email":"a@b.c","name":"Ann","avatar_url":"https://img/1.png"}"#,
        )
        .unwrap();
        assert_eq!(profile.picture.as_deref(), Some("https://img/1.png"));
        assert_eq!(profile.email_verified, None);
    }
}
