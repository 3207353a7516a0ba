//! Headless Chromium backend for the stealth engine.
//!
//! Each session launches its own browser process and drives it over the
//! Chrome DevTools Protocol with chromiumoxide. A background task pumps
//! protocol events for as long as the session lives.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::config::SearchConfig;
use crate::error::SearchError;

use super::light::random_user_agent;
use super::stealth::{BrowserDriver, BrowserSession};

/// Launches headless (or headed) Chromium sessions.
#[derive(Debug, Clone)]
pub struct ChromiumDriver {
    headless: bool,
    viewport: (u32, u32),
    user_agent: Option<String>,
}

impl ChromiumDriver {
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            headless: config.headless,
            viewport: config.viewport,
            user_agent: config.user_agent.clone(),
        }
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, SearchError> {
        let (width, height) = self.viewport;
        let mut builder = BrowserConfig::builder().window_size(width, height);
        if !self.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| SearchError::Http(format!("invalid browser config: {e}")))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SearchError::Http(format!("browser launch failed: {e}")))?;

        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("browser handler event error: {e}");
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                shutdown(&mut browser, events).await;
                return Err(SearchError::Http(format!("failed to open page: {e}")));
            }
        };

        let ua = self
            .user_agent
            .clone()
            .unwrap_or_else(|| random_user_agent().to_owned());
        if let Err(e) = page.set_user_agent(ua).await {
            tracing::debug!(error = %e, "could not override browser user agent");
        }

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            events,
        }))
    }
}

struct ChromiumSession {
    browser: Browser,
    page: Page,
    events: JoinHandle<()>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn set_headers(&mut self, headers: &[(String, String)]) -> Result<(), SearchError> {
        let map: serde_json::Map<String, serde_json::Value> = headers
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        self.page
            .execute(SetExtraHttpHeadersParams::new(Headers::new(
                serde_json::Value::Object(map),
            )))
            .await
            .map_err(|e| SearchError::Http(format!("failed to set headers: {e}")))?;
        Ok(())
    }

    async fn goto(&mut self, url: &str) -> Result<(), SearchError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| SearchError::Http(format!("navigation failed: {e}")))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| SearchError::Http(format!("page load failed: {e}")))?;
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> Result<(), SearchError> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| SearchError::Http(format!("script failed: {e}")))?;
        Ok(())
    }

    async fn post_form(&mut self, url: &str, form: &[(String, String)]) -> Result<String, SearchError> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form)
            .finish();
        let script = format!(
            "(async () => {{ const r = await fetch({url}, {{ method: 'POST', \
             headers: {{ 'Content-Type': 'application/x-www-form-urlencoded' }}, \
             body: {body} }}); return await r.text(); }})()",
            url = js_string(url)?,
            body = js_string(&body)?,
        );
        self.page
            .evaluate(script)
            .await
            .map_err(|e| SearchError::Http(format!("in-browser POST failed: {e}")))?
            .into_value::<String>()
            .map_err(|e| SearchError::Http(format!("unexpected POST response: {e}")))
    }

    async fn content(&mut self) -> Result<String, SearchError> {
        self.page
            .content()
            .await
            .map_err(|e| SearchError::Http(format!("content retrieval failed: {e}")))
    }

    async fn close(self: Box<Self>) -> Result<(), SearchError> {
        let ChromiumSession {
            mut browser,
            page,
            events,
        } = *self;
        page.close().await.ok();
        shutdown(&mut browser, events).await;
        Ok(())
    }
}

async fn shutdown(browser: &mut Browser, events: JoinHandle<()>) {
    if let Err(e) = browser.close().await {
        tracing::debug!(error = %e, "browser close failed");
    }
    if let Err(e) = browser.wait().await {
        tracing::debug!(error = %e, "browser process wait failed");
    }
    events.abort();
}

/// Quote `s` as a JavaScript string literal.
fn js_string(s: &str) -> Result<String, SearchError> {
    serde_json::to_string(s).map_err(|e| SearchError::Http(format!("cannot encode script argument: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_takes_browser_settings_from_config() {
        let config = SearchConfig {
            headless: false,
            viewport: (800, 600),
            user_agent: Some("TestBot/1.0".into()),
            ..Default::default()
        };
        let driver = ChromiumDriver::from_config(&config);
        assert!(!driver.headless);
        assert_eq!(driver.viewport, (800, 600));
        assert_eq!(driver.user_agent.as_deref(), Some("TestBot/1.0"));
    }

    #[test]
    fn js_string_escapes_quotes() {
        let quoted = js_string(r#"a'b"c"#).expect("encode");
        assert_eq!(quoted, r#""a'b\"c""#);
    }

    #[tokio::test]
    #[ignore = "requires Chrome/Chromium installation"]
    async fn renders_simple_page() {
        use crate::fetch::{FetchOptions, StealthEngine};

        let engine = StealthEngine::chromium(&SearchConfig::default());
        let html = engine.fetch("https://example.com", &FetchOptions::default()).await;
        assert!(html.contains("Example Domain"));
    }
}
