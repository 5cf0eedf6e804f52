use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::Page;
use futures::StreamExt;

use crate::config::BrowserSettings;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),
    #[error("Navigation failed: {0}")]
    Navigation(String),
    #[error("Element not found: {0}")]
    ElementNotFound(String),
    #[error("Timed out after {timeout:?} waiting for {xpath} to be {readiness}")]
    Timeout {
        xpath: String,
        readiness: Readiness,
        timeout: Duration,
    },
    #[error("Script evaluation failed: {0}")]
    Script(String),
    #[error("Browser command failed: {0}")]
    Command(String),
    #[error("Browser session is closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Rendered with a non-empty layout box.
    Visible,
    /// Visible and not disabled.
    Clickable,
}

impl std::fmt::Display for Readiness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Readiness::Visible => f.write_str("visible"),
            Readiness::Clickable => f.write_str("clickable"),
        }
    }
}

/// The page operations the monitor needs. Elements are addressed by XPath so
/// the structural queries stay in configuration.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), BrowserError>;
    async fn reload(&self) -> Result<(), BrowserError>;
    /// Single non-blocking check; `Ok(false)` when the element is absent.
    async fn is_ready(&self, xpath: &str, readiness: Readiness) -> Result<bool, BrowserError>;
    /// Whether the element carries the `open` attribute (for `<details>`).
    async fn is_open(&self, xpath: &str) -> Result<bool, BrowserError>;
    async fn scroll_into_view(&self, xpath: &str) -> Result<(), BrowserError>;
    async fn click(&self, xpath: &str) -> Result<(), BrowserError>;
    async fn inner_text(&self, xpath: &str) -> Result<String, BrowserError>;
    async fn inner_html(&self, xpath: &str) -> Result<String, BrowserError>;
    /// Releases the session. Calling it again is a no-op.
    async fn close(&mut self) -> Result<(), BrowserError>;
}

/// Polls `is_ready` at a fixed interval until the element reaches `readiness` or
/// `timeout` elapses. Check errors count as "not ready yet".
pub async fn wait_until(
    driver: &dyn PageDriver,
    xpath: &str,
    readiness: Readiness,
    timeout: Duration,
    interval: Duration,
) -> Result<(), BrowserError> {
    let start = tokio::time::Instant::now();
    loop {
        match driver.is_ready(xpath, readiness).await {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(e) => tracing::debug!("Readiness check for {} failed: {}", xpath, e),
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Err(BrowserError::Timeout {
                xpath: xpath.to_string(),
                readiness,
                timeout,
            });
        }
        tokio::time::sleep(interval.min(timeout - elapsed)).await;
    }
}

fn xpath_lookup_js(xpath: &str) -> String {
    // serde_json yields a valid JS string literal for any input.
    let literal = serde_json::to_string(xpath).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
        literal
    )
}

fn readiness_js(xpath: &str, readiness: Readiness) -> String {
    let require_enabled = matches!(readiness, Readiness::Clickable);
    format!(
        r#"(() => {{
            const node = {lookup};
            if (!node) return false;
            const style = window.getComputedStyle(node);
            const visible = style.visibility !== 'hidden'
                && style.display !== 'none'
                && node.getClientRects().length > 0;
            if (!visible) return false;
            return {require_enabled} ? !node.disabled : true;
        }})()"#,
        lookup = xpath_lookup_js(xpath),
        require_enabled = require_enabled,
    )
}

fn is_open_js(xpath: &str) -> String {
    format!(
        "(() => {{ const node = {}; return !!node && node.hasAttribute('open'); }})()",
        xpath_lookup_js(xpath)
    )
}

/// A Chromium-family browser (Chrome, Chromium, Edge) driven over CDP.
pub struct ChromeSession {
    browser: Option<Browser>,
    page: Page,
    handler_task: Option<JoinHandle<()>>,
}

impl ChromeSession {
    pub async fn launch(settings: &BrowserSettings) -> Result<Self, BrowserError> {
        let mut builder = BrowserConfig::builder().no_sandbox();
        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &settings.executable {
            builder = builder.chrome_executable(path);
        }
        for arg in &settings.extra_args {
            builder = builder.arg(arg.as_str());
        }

        let config = builder
            .build()
            .map_err(|e| BrowserError::Launch(format!("invalid browser config: {}", e)))?;

        tracing::info!(
            headless = settings.headless,
            executable = ?settings.executable,
            "Launching browser"
        );

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        // CDP events must be drained or the connection stalls.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Browser handler event error: {}", e);
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let mut browser = browser;
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler_task.abort();
                return Err(BrowserError::Launch(format!("failed to create page: {}", e)));
            }
        };

        let mut session = Self {
            browser: Some(browser),
            page,
            handler_task: Some(handler_task),
        };

        if let Err(e) = session
            .page
            .set_user_agent(SetUserAgentOverrideParams::new(settings.user_agent.clone()))
            .await
        {
            let _ = session.close().await;
            return Err(BrowserError::Launch(format!("failed to set user agent: {}", e)));
        }

        Ok(session)
    }

    async fn element(&self, xpath: &str) -> Result<chromiumoxide::element::Element, BrowserError> {
        self.page
            .find_xpath(xpath)
            .await
            .map_err(|e| BrowserError::ElementNotFound(format!("{} ({})", xpath, e)))
    }

    async fn evaluate_bool(&self, script: String) -> Result<bool, BrowserError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        result
            .into_value::<bool>()
            .map_err(|e| BrowserError::Script(e.to_string()))
    }
}

#[async_trait]
impl PageDriver for ChromeSession {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        if self.browser.is_none() {
            return Err(BrowserError::Closed);
        }
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::Navigation(e.to_string()))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| BrowserError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn reload(&self) -> Result<(), BrowserError> {
        if self.browser.is_none() {
            return Err(BrowserError::Closed);
        }
        self.page
            .reload()
            .await
            .map_err(|e| BrowserError::Navigation(format!("reload: {}", e)))?;
        Ok(())
    }

    async fn is_ready(&self, xpath: &str, readiness: Readiness) -> Result<bool, BrowserError> {
        self.evaluate_bool(readiness_js(xpath, readiness)).await
    }

    async fn is_open(&self, xpath: &str) -> Result<bool, BrowserError> {
        self.evaluate_bool(is_open_js(xpath)).await
    }

    async fn scroll_into_view(&self, xpath: &str) -> Result<(), BrowserError> {
        self.element(xpath)
            .await?
            .scroll_into_view()
            .await
            .map_err(|e| BrowserError::Command(format!("scroll into view: {}", e)))?;
        Ok(())
    }

    async fn click(&self, xpath: &str) -> Result<(), BrowserError> {
        self.element(xpath)
            .await?
            .click()
            .await
            .map_err(|e| BrowserError::Command(format!("click: {}", e)))?;
        Ok(())
    }

    async fn inner_text(&self, xpath: &str) -> Result<String, BrowserError> {
        let text = self
            .element(xpath)
            .await?
            .inner_text()
            .await
            .map_err(|e| BrowserError::Command(format!("read text: {}", e)))?;
        Ok(text.unwrap_or_default())
    }

    async fn inner_html(&self, xpath: &str) -> Result<String, BrowserError> {
        let html = self
            .element(xpath)
            .await?
            .inner_html()
            .await
            .map_err(|e| BrowserError::Command(format!("read markup: {}", e)))?;
        Ok(html.unwrap_or_default())
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };

        let closed = browser
            .close()
            .await
            .map_err(|e| BrowserError::Command(format!("close: {}", e)));
        if let Err(e) = browser.wait().await {
            tracing::debug!("Waiting for browser process failed: {}", e);
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
        closed.map(|_| ())
    }
}
