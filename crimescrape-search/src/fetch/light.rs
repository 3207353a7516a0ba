//! Lightweight fetch engine over plain HTTP requests.
//!
//! Provides a configured [`reqwest::Client`] with browser-like headers,
//! cookie support, and rotating User-Agent strings. The client is cheap to
//! clone and safe to share between concurrently running modules.

use std::time::Duration;

use rand::seq::SliceRandom;

use crate::config::SearchConfig;
use crate::error::SearchError;

use super::FetchOptions;

/// Realistic browser User-Agent strings, rotated per engine.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
];

/// Request-based fetch engine.
#[derive(Debug, Clone)]
pub struct LightEngine {
    client: reqwest::Client,
    timeout: Duration,
}

impl LightEngine {
    /// Build an engine from the search configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Http`] if the HTTP client cannot be constructed.
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        Ok(Self {
            client: build_client(config)?,
            timeout: config.fetch_timeout(),
        })
    }

    /// GET `url`, returning the body or an empty string on any failure.
    pub async fn fetch(&self, url: &str, options: &FetchOptions) -> String {
        let request = self.client.get(url);
        self.execute(request, url, options).await
    }

    /// POST `form` url-encoded to `url`, returning the body or an empty string.
    pub async fn post(&self, url: &str, form: &[(String, String)], options: &FetchOptions) -> String {
        let request = self.client.post(url).form(form);
        self.execute(request, url, options).await
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
        options: &FetchOptions,
    ) -> String {
        match self.try_execute(request, options).await {
            Ok(body) => {
                tracing::trace!(url, bytes = body.len(), "light fetch complete");
                body
            }
            Err(err) => {
                tracing::debug!(url, error = %err, "light fetch failed");
                String::new()
            }
        }
    }

    async fn try_execute(
        &self,
        mut request: reqwest::RequestBuilder,
        options: &FetchOptions,
    ) -> Result<String, SearchError> {
        request = request.timeout(options.timeout.unwrap_or(self.timeout));
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| SearchError::Http(format!("request failed: {e}")))?
            .error_for_status()
            .map_err(|e| SearchError::Http(format!("bad status: {e}")))?;

        response
            .text()
            .await
            .map_err(|e| SearchError::Http(format!("response read failed: {e}")))
    }
}

/// Build a [`reqwest::Client`] configured for scraping.
///
/// The client has:
/// - Cookie store enabled
/// - Timeout from config
/// - Random User-Agent from built-in rotation list (or custom if configured)
/// - Brotli and gzip decompression
///
/// # Errors
///
/// Returns [`SearchError::Http`] if the client cannot be constructed.
pub fn build_client(config: &SearchConfig) -> Result<reqwest::Client, SearchError> {
    let ua = match config.user_agent {
        Some(ref custom) => custom.clone(),
        None => random_user_agent().to_owned(),
    };

    reqwest::Client::builder()
        .cookie_store(true)
        .timeout(config.fetch_timeout())
        .user_agent(ua)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| SearchError::Http(format!("failed to build HTTP client: {e}")))
}

/// Select a random User-Agent string from the rotation list.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS
        .choose(&mut rng)
        .copied()
        // SAFETY: USER_AGENTS is a non-empty const array, choose only returns None on empty slices
        .unwrap_or(USER_AGENTS[0])
}
