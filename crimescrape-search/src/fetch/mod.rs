//! Fetch engines used by source modules to reach upstream sites.
//!
//! A module picks one engine at construction:
//!
//! - [`LightEngine`]: plain HTTP requests, stateless and freely concurrent.
//! - [`StealthEngine`]: a real browser session that renders JavaScript,
//!   limited to one in-flight fetch per engine instance.
//!
//! Both always return text. Transport failures (timeouts, DNS errors,
//! non-2xx responses, browser crashes) are logged at debug level and come
//! back as an empty string, so one unreachable site never aborts a run.

pub mod light;
pub mod stealth;

#[cfg(feature = "chromium")]
pub mod chromium;

use std::sync::OnceLock;
use std::time::Duration;

use regex::RegexSet;

pub use light::LightEngine;
pub use stealth::{BrowserDriver, BrowserSession, StealthEngine};

/// Per-call fetch options.
///
/// `scroll` and `wait` only affect the stealth engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOptions {
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
    /// Scroll the page to the bottom and back several times to trigger lazy loading.
    pub scroll: bool,
    /// Pause after the page has loaded.
    pub wait: Option<Duration>,
    /// Override the engine's default timeout for this call.
    pub timeout: Option<Duration>,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn scroll(mut self, scroll: bool) -> Self {
        self.scroll = scroll;
        self
    }

    pub fn wait(mut self, wait: Duration) -> Self {
        self.wait = Some(wait);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Which fetch strategy an engine uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Light,
    Stealth,
}

/// The fetch strategy injected into a source module.
pub enum FetchEngine {
    Light(LightEngine),
    Stealth(StealthEngine),
}

impl FetchEngine {
    /// GET `url` and return the body (or rendered page), empty on failure.
    pub async fn fetch(&self, url: &str, options: &FetchOptions) -> String {
        match self {
            Self::Light(engine) => engine.fetch(url, options).await,
            Self::Stealth(engine) => engine.fetch(url, options).await,
        }
    }

    /// POST a url-encoded form to `url` and return the body, empty on failure.
    pub async fn post(&self, url: &str, form: &[(String, String)], options: &FetchOptions) -> String {
        match self {
            Self::Light(engine) => engine.post(url, form, options).await,
            Self::Stealth(engine) => engine.post(url, form, options).await,
        }
    }

    pub fn kind(&self) -> EngineKind {
        match self {
            Self::Light(_) => EngineKind::Light,
            Self::Stealth(_) => EngineKind::Stealth,
        }
    }
}

impl From<LightEngine> for FetchEngine {
    fn from(engine: LightEngine) -> Self {
        Self::Light(engine)
    }
}

impl From<StealthEngine> for FetchEngine {
    fn from(engine: StealthEngine) -> Self {
        Self::Stealth(engine)
    }
}

/// Patterns that indicate a CAPTCHA or bot-challenge page.
const CAPTCHA_PATTERNS: &[&str] = &[
    r"recaptcha",
    r"hcaptcha",
    r"cloudflare.*challenge",
    r"you.*robot",
    r"challenge.*page",
];

static CAPTCHA_SET: OnceLock<Option<RegexSet>> = OnceLock::new();

/// Whether fetched content looks like a CAPTCHA or bot-challenge page.
///
/// Modules use this to escalate a blocked page to
/// [`SearchError::Captcha`](crate::SearchError::Captcha) instead of
/// reporting "nothing found".
pub fn looks_like_captcha(content: &str) -> bool {
    let set = CAPTCHA_SET.get_or_init(|| {
        let patterns = CAPTCHA_PATTERNS.iter().map(|p| format!("(?i){p}"));
        RegexSet::new(patterns).ok()
    });
    set.as_ref().is_some_and(|set| set.is_match(content))
}
