use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::Result;

/// Tokens are dropped this long before the provider says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/// OAuth-style token response shared by the mobile-money providers.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub expires_in: Option<u64>,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Holds one provider's access token until shortly before it expires.
#[derive(Default)]
pub struct TokenCache {
    current: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached token, or runs `fetch` and caches what it returns.
    /// The lock is held across `fetch` so concurrent callers share one round trip.
    pub async fn get_or_fetch<F, Fut>(&self, fetch: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AccessToken>>,
    {
        let mut current = self.current.lock().await;

        if let Some(cached) = current.as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.value.clone());
            }
        }

        let token = fetch().await?;
        *current = token.expires_in.and_then(|secs| {
            let lifetime = Duration::from_secs(secs).checked_sub(EXPIRY_MARGIN)?;
            Some(CachedToken {
                value: token.access_token.clone(),
                expires_at: Instant::now() + lifetime,
            })
        });

        Ok(token.access_token)
    }

    pub async fn invalidate(&self) {
        *self.current.lock().await = None;
    }
}

// Airtel reports `expires_in` as a string, MTN as a number.
fn lenient_seconds<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
