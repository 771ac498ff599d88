//! Browser session management
//!
//! Launches and controls the single Chrome instance used for a whole run.
//! All page operations are wrapped in explicit timeouts; a timed-out wait is
//! reported as a `BrowserError::Timeout` and left to the caller to classify.

use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, CookieSameSite, TimeSinceEpoch};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures::StreamExt;
use rand::Rng;
use tracing::{debug, info};

use super::BrowserError;

/// Desktop Chrome user agent presented to the panel.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Ceiling for a single JavaScript evaluation.
const EVAL_TIMEOUT: Duration = Duration::from_secs(60);

/// A single-page browser session for automation
pub struct BrowserSession {
    browser: Option<Browser>,
    page: Page,
    nav_timeout: Duration,
    /// Pacing delay applied after each interaction, like a slowed-down human.
    slow_mo: Duration,
}

impl BrowserSession {
    /// Launch Chrome and open the blank page the whole run drives.
    pub async fn launch(
        headless: bool,
        nav_timeout: Duration,
        slow_mo: Duration,
    ) -> Result<Self, BrowserError> {
        info!("Launching browser session (headless: {})", headless);

        let mut builder = BrowserConfig::builder()
            // Required when running as root (e.g., in CI or on a VPS)
            .no_sandbox()
            .window_size(1920, 1080)
            .viewport(Viewport {
                width: 1920,
                height: 1080,
                device_scale_factor: Some(1.0),
                ..Default::default()
            })
            .arg(format!("--user-agent={USER_AGENT}"))
            // Anti-detection flags the panel's interstitial keys on
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-features=IsolateOrigins,site-per-process")
            .arg("--disable-web-security");

        if headless {
            // Modern Chrome requires --headless=new; .with_head() keeps
            // chromiumoxide from adding the legacy --headless flag first.
            builder = builder.with_head().arg("--headless=new");
        } else {
            builder = builder.with_head();
        }

        let config = builder
            .build()
            .map_err(BrowserError::LaunchFailed)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        // Drain CDP events in the background; the stream ends when Chrome
        // disconnects or crashes.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
            debug!("Browser event handler ended (Chrome disconnected)");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        info!("Browser session ready");

        Ok(Self {
            browser: Some(browser),
            page,
            nav_timeout,
            slow_mo,
        })
    }

    async fn pace(&self) {
        if !self.slow_mo.is_zero() {
            tokio::time::sleep(self.slow_mo).await;
        }
    }

    /// Navigate and wait for the navigation to commit.
    pub async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        debug!("Navigating to: {}", url);
        tokio::time::timeout(self.nav_timeout, async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        })
        .await
        .map_err(|_| BrowserError::Timeout(format!("navigation to {url} timed out")))?
        .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;

        self.pace().await;
        Ok(())
    }

    /// Reload the current page and wait for it to come back.
    pub async fn reload(&self) -> Result<(), BrowserError> {
        // Fired from inside the page; the eval reply can be lost when the
        // context tears down, so it is deliberately ignored.
        let _ = tokio::time::timeout(
            Duration::from_secs(5),
            self.page.evaluate("window.location.reload()"),
        )
        .await;

        self.wait_for_navigation(self.nav_timeout).await?;
        self.pace().await;
        Ok(())
    }

    /// Wait for an in-flight navigation (e.g. after submitting a form).
    pub async fn wait_for_navigation(&self, budget: Duration) -> Result<(), BrowserError> {
        tokio::time::timeout(budget, self.page.wait_for_navigation())
            .await
            .map_err(|_| BrowserError::Timeout("navigation timed out".into()))?
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;
        Ok(())
    }

    /// Current page URL.
    pub async fn current_url(&self) -> Result<String, BrowserError> {
        self.page
            .url()
            .await
            .map_err(|e| BrowserError::ConnectionLost(e.to_string()))?
            .ok_or_else(|| BrowserError::ConnectionLost("page has no URL".into()))
    }

    /// Full page markup, used for text-pattern scans.
    pub async fn content(&self) -> Result<String, BrowserError> {
        self.page
            .content()
            .await
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))
    }

    /// Evaluate JavaScript and return its JSON value (`Null` when the script
    /// produces no value).
    pub async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError> {
        let result = tokio::time::timeout(EVAL_TIMEOUT, self.page.evaluate(script))
            .await
            .map_err(|_| BrowserError::Timeout("JavaScript evaluation timed out".into()))?
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;

        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    /// Install the panel's remember-me cookie, scoped to `domain` with a
    /// one-year expiry.
    pub async fn set_session_cookie(
        &self,
        name: &str,
        value: &str,
        domain: &str,
    ) -> Result<(), BrowserError> {
        let expires = chrono::Utc::now().timestamp() + 3600 * 24 * 365;

        let mut cookie = CookieParam::new(name, value);
        cookie.domain = Some(domain.to_string());
        cookie.path = Some("/".to_string());
        cookie.expires = Some(TimeSinceEpoch::new(expires as f64));
        cookie.http_only = Some(true);
        cookie.secure = Some(true);
        cookie.same_site = Some(CookieSameSite::Lax);

        self.page
            .set_cookies(vec![cookie])
            .await
            .map_err(|e| BrowserError::ConnectionLost(e.to_string()))?;

        info!("Session cookie installed for domain {}", domain);
        Ok(())
    }

    /// Wait for a CSS selector to appear in the DOM.
    pub async fn wait_for_element(
        &self,
        css: &str,
        budget: Duration,
        poll: Duration,
    ) -> Result<(), BrowserError> {
        let deadline = tokio::time::Instant::now() + budget;
        loop {
            if self.page.find_element(css).await.is_ok() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BrowserError::ElementNotFound(css.to_string()));
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Focus an input and type into it with per-keystroke delays, so the form
    /// sees input pacing resembling a human rather than one synthetic paste.
    pub async fn fill_human(&self, css: &str, text: &str) -> Result<(), BrowserError> {
        let element = self
            .page
            .find_element(css)
            .await
            .map_err(|e| BrowserError::ElementNotFound(format!("{css}: {e}")))?;

        element
            .click()
            .await
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;

        let mut buf = [0u8; 4];
        for c in text.chars() {
            element
                .type_str(&*c.encode_utf8(&mut buf))
                .await
                .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;

            // 50-150ms between keystrokes, like a real typist
            let delay = rand::thread_rng().gen_range(50..150);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        Ok(())
    }

    /// Click the first element matching a CSS selector.
    pub async fn click(&self, css: &str) -> Result<(), BrowserError> {
        let element = self
            .page
            .find_element(css)
            .await
            .map_err(|e| BrowserError::ElementNotFound(format!("{css}: {e}")))?;

        element
            .click()
            .await
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;

        self.pace().await;
        Ok(())
    }

    /// Close the browser. Errors are swallowed: process exit reclaims Chrome
    /// on the unrecoverable path anyway.
    pub async fn close(mut self) {
        if let Some(mut browser) = self.browser.take() {
            let _ = browser.close().await;
            let _ = browser.wait().await;
        }
        info!("Browser session closed");
    }
}
