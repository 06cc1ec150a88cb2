use parking_lot::Mutex;
use serde::Deserialize;
use std::time::{Duration, Instant};

use insights_core::config::{LlmSettings, OAuthSettings};
use insights_core::error::{Error, Result};

const DEFAULT_EXPIRES_IN: u64 = 3599;
const EXPIRY_SKEW: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

pub struct CachedToken {
    value: String,
    valid_until: Instant,
}

/// Where the chat adapter gets its bearer token from.
pub enum TokenSource {
    None,
    Static(String),
    ClientCredentials { oauth: OAuthSettings, cached: Mutex<Option<CachedToken>> },
}

impl TokenSource {
    pub fn from_settings(settings: &LlmSettings) -> Self {
        match (&settings.oauth, &settings.api_key) {
            (Some(oauth), _) => Self::ClientCredentials { oauth: oauth.clone(), cached: Mutex::new(None) },
            (None, Some(key)) => Self::Static(key.clone()),
            (None, None) => Self::None,
        }
    }

    /// Current bearer token, fetching a new one when the cached token expired.
    pub async fn bearer(&self, client: &reqwest::Client) -> Result<Option<String>> {
        match self {
            Self::None => Ok(None),
            Self::Static(key) => Ok(Some(key.clone())),
            Self::ClientCredentials { oauth, cached } => {
                let live = cached.lock().as_ref().filter(|t| Instant::now() < t.valid_until).map(|t| t.value.clone());
                if live.is_some() {
                    return Ok(live);
                }
                tracing::info!(token_url = %oauth.token_url, "requesting llm access token");
                let fresh = fetch_token(client, oauth).await?;
                let value = fresh.value.clone();
                *cached.lock() = Some(fresh);
                Ok(Some(value))
            }
        }
    }
}

async fn fetch_token(client: &reqwest::Client, oauth: &OAuthSettings) -> Result<CachedToken> {
    let mut form = vec![
        ("grant_type", "client_credentials"),
        ("client_id", oauth.client_id.as_str()),
        ("client_secret", oauth.client_secret.as_str()),
    ];
    if let Some(scope) = &oauth.scope {
        form.push(("scope", scope.as_str()));
    }
    let response = client
        .post(&oauth.token_url)
        .form(&form)
        .send()
        .await
        .map_err(|e| Error::Upstream(format!("token request: {e}")))?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Upstream(format!("token endpoint returned {status}")));
    }
    let body: TokenResponse = response
        .json()
        .await
        .map_err(|e| Error::Upstream(format!("token response: {e}")))?;
    let lifetime = Duration::from_secs(body.expires_in.unwrap_or(DEFAULT_EXPIRES_IN)).saturating_sub(EXPIRY_SKEW);
    Ok(CachedToken { value: body.access_token, valid_until: Instant::now() + lifetime })
}
