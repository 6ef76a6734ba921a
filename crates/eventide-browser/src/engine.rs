use crate::error::{BrowserError, Result};
use crate::fingerprint::FingerprintConfig;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// What to load and how long to wait for it
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub url: String,
    /// Selector that must appear before the page is read
    pub wait_for: Option<String>,
    /// Extra settle time after load
    pub wait_ms: Option<u64>,
    pub user_agent: String,
    pub timeout: Duration,
}

/// Headless Chromium wrapper
pub struct BrowserEngine {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserEngine {
    /// Launch a headless browser with a randomized window size
    pub async fn launch() -> Result<Self> {
        let fingerprint = FingerprintConfig::randomized(&[]);
        let config = BrowserConfig::builder()
            .no_sandbox()
            .window_size(fingerprint.viewport_width, fingerprint.viewport_height)
            .build()
            .map_err(BrowserError::ChromiumError)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler event error");
                }
            }
        });

        Ok(Self { browser, handler })
    }

    /// Render `request.url` and return the page HTML.
    pub async fn fetch_page_content(&self, request: &PageRequest) -> Result<String> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        let result = tokio::time::timeout(request.timeout, Self::render(&page, request)).await;

        if let Err(e) = page.close().await {
            warn!(url = %request.url, error = %e, "failed to close page");
        }

        match result {
            Ok(content) => content,
            Err(_) => Err(BrowserError::Timeout(format!(
                "{} did not render within {:?}",
                request.url, request.timeout
            ))),
        }
    }

    async fn render(page: &Page, request: &PageRequest) -> Result<String> {
        page.set_user_agent(request.user_agent.as_str())
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        page.goto(request.url.as_str())
            .await
            .map_err(|e| BrowserError::NavigationError(format!("{}: {e}", request.url)))?;

        if let Some(selector) = &request.wait_for {
            Self::wait_for_selector(page, selector, request.timeout).await?;
        }

        if let Some(ms) = request.wait_ms {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }

        page.content()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))
    }

    async fn wait_for_selector(page: &Page, selector: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::SelectorNotFound(selector.to_string()));
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    /// Shut the browser down
    pub async fn close(mut self) -> Result<()> {
        self.browser
            .close()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        self.handler.abort();
        Ok(())
    }
}
