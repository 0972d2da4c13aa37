//! IAM API-key to bearer-token exchange.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::error::VpcError;
use super::types::BearerToken;

const GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";
const REFRESH_MARGIN: Duration = Duration::from_secs(60);
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Clone, Debug)]
struct CachedToken {
    token: BearerToken,
    refresh_at: Instant,
}

/// Exchanges an API key for a bearer token and caches it until shortly
/// before it expires.
#[derive(Clone, Debug)]
pub struct IamAuthenticator {
    api_key: String,
    token_url: String,
    cache: Arc<Mutex<Option<CachedToken>>>,
}

impl IamAuthenticator {
    /// Creates an authenticator that talks to `{iam_endpoint}/identity/token`.
    #[must_use]
    pub fn new(api_key: impl Into<String>, iam_endpoint: &str) -> Self {
        Self {
            api_key: api_key.into(),
            token_url: format!("{}/identity/token", iam_endpoint.trim_end_matches('/')),
            cache: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns a valid token, fetching a fresh one when the cache is empty or
    /// within a minute of expiry.
    ///
    /// # Errors
    ///
    /// Returns [`VpcError::Auth`] when the token service rejects the key and
    /// [`VpcError::Transport`] when it cannot be reached.
    pub async fn token(&self, http: &reqwest::Client) -> Result<BearerToken, VpcError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref()
            && Instant::now() < cached.refresh_at
        {
            return Ok(cached.token.clone());
        }

        debug!(url = %self.token_url, "requesting IAM token");
        let response = http
            .post(&self.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[("grant_type", GRANT_TYPE), ("apikey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|err| VpcError::transport(&err))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| VpcError::transport(&err))?;
        if !status.is_success() {
            return Err(VpcError::Auth {
                message: format!(
                    "token service returned {}: {}",
                    status.as_u16(),
                    String::from_utf8_lossy(&body)
                ),
            });
        }

        let parsed: TokenResponse = serde_json::from_slice(&body).map_err(|err| VpcError::Auth {
            message: err.to_string(),
        })?;
        let lifetime = Duration::from_secs(parsed.expires_in)
            .min(MAX_TOKEN_LIFETIME)
            .saturating_sub(REFRESH_MARGIN);
        let token = BearerToken::new(parsed.access_token);
        *cache = Some(CachedToken {
            token: token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(token)
    }
}
