use std::sync::Arc;

use kaze_catalog::Provider;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use crate::error::ProviderError;

/// HTTP behaviour shared by all connectors.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub user_agent: String,
    pub request_timeout: Duration,
    /// Minimum spacing between two requests to the same provider.
    pub min_request_interval: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("kaze/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout: Duration::from_secs(30),
            min_request_interval: Duration::from_millis(250),
        }
    }
}

/// Rate-limited JSON client for one provider API.
pub struct ApiClient {
    provider: Provider,
    http: reqwest::Client,
    base_url: String,
    min_interval: Duration,
    last_request: Arc<Mutex<Instant>>,
}

impl ApiClient {
    pub fn new(provider: Provider, base_url: &str, config: &HttpConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()?;

        let now = Instant::now();
        Ok(Self {
            provider,
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            min_interval: config.min_request_interval,
            last_request: Arc::new(Mutex::new(
                now.checked_sub(config.min_request_interval).unwrap_or(now),
            )),
        })
    }

    /// GET `path` (relative to the base URL) and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        self.rate_limit().await;

        let url = format!("{}{}", self.base_url, path);
        log::debug!("{} GET {} {:?}", self.provider, url, query);

        let resp = self.http.get(&url).query(query).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(path.to_string()));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimit(self.provider));
        }
        if !status.is_success() {
            return Err(ProviderError::ServerError {
                status: status.as_u16(),
                message: snippet(&text).to_string(),
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            ProviderError::Parse(format!("{e}. Response: {}", snippet(&text)))
        })
    }

    /// Wait until at least the configured interval has passed since the
    /// last request.
    async fn rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        let elapsed = last.elapsed();
        if elapsed < self.min_interval {
            tokio::time::sleep(self.min_interval - elapsed).await;
        }
        *last = Instant::now();
    }
}

fn snippet(text: &str) -> &str {
    let mut end = text.len().min(200);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_respects_char_boundaries() {
        let text = "é".repeat(150);
        let cut = snippet(&text);
        assert!(cut.len() <= 200);
        assert!(cut.chars().all(|c| c == 'é'));
    }
}
