//! Browser-automation fetch engine for JavaScript-heavy or bot-defended sites.
//!
//! A [`StealthEngine`] owns a [`BrowserDriver`] and serialises its own
//! fetches: at most one browser session is open per engine instance at any
//! time. Separate instances (separate modules) run in parallel.
//!
//! Every fetch opens a session, uses it, and closes it. The close runs on
//! success, on error, on timeout, and, through [`SessionGuard`]'s `Drop`,
//! when the caller abandons the fetch future mid-flight. The next fetch on
//! the same engine waits until that close has finished.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::SearchError;

use super::FetchOptions;

/// Number of bottom/top scroll passes used to trigger lazy loading.
const SCROLL_PASSES: usize = 5;
/// Pause between scroll steps.
const SCROLL_PAUSE: Duration = Duration::from_millis(150);

const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight);";
const SCROLL_TO_TOP: &str = "window.scrollTo(0, 0);";

/// Launches browser sessions for a stealth engine.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Start a fresh browser session.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Http`] if the browser cannot be launched.
    async fn open(&self) -> Result<Box<dyn BrowserSession>, SearchError>;
}

/// One live browser session. Not safe for concurrent use.
#[async_trait]
pub trait BrowserSession: Send {
    /// Set headers sent with every subsequent request of this session.
    async fn set_headers(&mut self, headers: &[(String, String)]) -> Result<(), SearchError>;

    /// Navigate to `url` and wait for the page to load.
    async fn goto(&mut self, url: &str) -> Result<(), SearchError>;

    /// Run a script in the current page, discarding its result.
    async fn evaluate(&mut self, script: &str) -> Result<(), SearchError>;

    /// Submit a url-encoded form from within the browser and return the response body.
    async fn post_form(&mut self, url: &str, form: &[(String, String)]) -> Result<String, SearchError>;

    /// Current rendered HTML of the page.
    async fn content(&mut self) -> Result<String, SearchError>;

    /// Tear the session down, releasing the browser process.
    async fn close(self: Box<Self>) -> Result<(), SearchError>;
}

/// Closes the wrapped session on every exit path, and holds the engine's
/// session permit until that close has finished.
struct SessionGuard {
    session: Option<Box<dyn BrowserSession>>,
    permit: Option<OwnedMutexGuard<()>>,
}

impl SessionGuard {
    fn new(session: Box<dyn BrowserSession>, permit: OwnedMutexGuard<()>) -> Self {
        Self {
            session: Some(session),
            permit: Some(permit),
        }
    }

    fn session(&mut self) -> Result<&mut (dyn BrowserSession + 'static), SearchError> {
        self.session
            .as_deref_mut()
            .ok_or_else(|| SearchError::Http("browser session already closed".into()))
    }

    async fn close(mut self) {
        if let Some(session) = self.session.take() {
            if let Err(err) = session.close().await {
                tracing::debug!(error = %err, "browser session close failed");
            }
        }
        self.permit.take();
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let permit = self.permit.take();
        let Some(session) = self.session.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = session.close().await {
                        tracing::debug!(error = %err, "deferred browser session close failed");
                    }
                    drop(permit);
                });
            }
            Err(_) => {
                tracing::warn!("no runtime available to close abandoned browser session");
            }
        }
    }
}

/// Browser-backed fetch engine with one in-flight fetch per instance.
pub struct StealthEngine {
    driver: Box<dyn BrowserDriver>,
    session_lock: Arc<Mutex<()>>,
    timeout: Duration,
}

impl StealthEngine {
    /// Create an engine over `driver`, bounding each fetch by `timeout`.
    pub fn new(driver: impl BrowserDriver + 'static, timeout: Duration) -> Self {
        Self {
            driver: Box::new(driver),
            session_lock: Arc::new(Mutex::new(())),
            timeout,
        }
    }

    /// Create an engine backed by headless Chromium, configured from `config`.
    #[cfg(feature = "chromium")]
    pub fn chromium(config: &crate::config::SearchConfig) -> Self {
        Self::new(
            super::chromium::ChromiumDriver::from_config(config),
            config.fetch_timeout(),
        )
    }

    /// Render `url` and return its HTML, or an empty string on failure.
    ///
    /// Honours `options.scroll` and `options.wait`. A detected CAPTCHA is not
    /// treated specially here; see [`looks_like_captcha`](super::looks_like_captcha).
    pub async fn fetch(&self, url: &str, options: &FetchOptions) -> String {
        let outcome = self.with_session(Work::Render { url }, options).await;
        finish(url, outcome)
    }

    /// Submit `form` to `url` from inside the browser, returning the response body.
    pub async fn post(&self, url: &str, form: &[(String, String)], options: &FetchOptions) -> String {
        let outcome = self.with_session(Work::Post { url, form }, options).await;
        finish(url, outcome)
    }

    async fn with_session(&self, work: Work<'_>, options: &FetchOptions) -> Result<String, SearchError> {
        let permit = Arc::clone(&self.session_lock).lock_owned().await;
        let timeout = options.timeout.unwrap_or(self.timeout);

        let session = tokio::time::timeout(timeout, self.driver.open())
            .await
            .map_err(|_| SearchError::Http(format!("browser launch timed out after {timeout:?}")))??;
        let mut guard = SessionGuard::new(session, permit);

        let outcome = match guard.session() {
            Ok(session) => tokio::time::timeout(timeout, work.run(session, options))
                .await
                .unwrap_or_else(|_| {
                    Err(SearchError::Http(format!("browser fetch timed out after {timeout:?}")))
                }),
            Err(err) => Err(err),
        };

        guard.close().await;
        outcome
    }
}

/// What a single session is opened for.
enum Work<'a> {
    Render { url: &'a str },
    Post { url: &'a str, form: &'a [(String, String)] },
}

impl Work<'_> {
    async fn run(
        self,
        session: &mut (dyn BrowserSession + 'static),
        options: &FetchOptions,
    ) -> Result<String, SearchError> {
        if !options.headers.is_empty() {
            session.set_headers(&options.headers).await?;
        }
        match self {
            Self::Render { url } => render(session, url, options).await,
            Self::Post { url, form } => session.post_form(url, form).await,
        }
    }
}

async fn render(
    session: &mut (dyn BrowserSession + 'static),
    url: &str,
    options: &FetchOptions,
) -> Result<String, SearchError> {
    session.goto(url).await?;

    if let Some(wait) = options.wait {
        tokio::time::sleep(wait).await;
    }

    if options.scroll {
        for _ in 0..SCROLL_PASSES {
            session.evaluate(SCROLL_TO_BOTTOM).await?;
            tokio::time::sleep(SCROLL_PAUSE).await;
            session.evaluate(SCROLL_TO_TOP).await?;
            tokio::time::sleep(SCROLL_PAUSE).await;
        }
    }

    session.content().await
}

fn finish(url: &str, outcome: Result<String, SearchError>) -> String {
    match outcome {
        Ok(html) => {
            tracing::trace!(url, bytes = html.len(), "stealth fetch complete");
            html
        }
        Err(err) => {
            tracing::debug!(url, error = %err, "stealth fetch failed");
            String::new()
        }
    }
}
