//! Render engine seam
//!
//! The traversal only ever talks to the browser through [`RenderEngine`]:
//! navigate, wait for a selector, evaluate a query, close. Queries run against
//! a snapshot of the live document and return owned data, so nothing derived
//! from the DOM outlives the next navigation.

use crate::chrome::{BrowserHandle, ChromeConfig, ChromeManager};
use crate::{HarvestError, Result};
use async_trait::async_trait;
use chromiumoxide::Page;
use scraper::Html;
use std::time::{Duration, Instant};
use tracing::{debug, trace};
use url::Url;

/// Interval between selector probes in [`RenderEngine::wait_for_selector`]
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A structured query evaluated against the rendered document
pub trait Query: Send + Sync {
    type Output: Send;

    /// Run the query. `base` is the URL the document was loaded from and is
    /// used to resolve relative hrefs.
    fn evaluate(&self, document: &Html, base: &Url) -> Result<Self::Output>;
}

/// Capability that loads pages and answers queries about them
#[async_trait]
pub trait RenderEngine: Send {
    /// Load `url` in the shared tab and wait for navigation to finish
    async fn navigate(&mut self, url: &Url) -> Result<()>;

    /// Wait until `selector` matches in the current document.
    /// Fails with [`HarvestError::Timeout`] once `timeout` has elapsed.
    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<()>;

    /// Evaluate a query against the current document
    async fn evaluate<Q: Query>(&mut self, query: &Q) -> Result<Q::Output>;

    /// Release the browser session
    async fn close(&mut self) -> Result<()>;
}

/// [`RenderEngine`] backed by a single Chrome tab
pub struct ChromeEngine {
    browser: Option<BrowserHandle>,
    page: Page,
    current: Option<Url>,
}

impl ChromeEngine {
    /// Launch Chrome and open the one tab every navigation reuses
    pub async fn launch(config: ChromeConfig) -> Result<Self> {
        let mut manager = ChromeManager::with_config(config);
        let handle = manager.launch().await?;

        let page = handle
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| HarvestError::BrowserError(e.to_string()))?;

        Ok(Self {
            browser: Some(handle),
            page,
            current: None,
        })
    }

    fn current_url(&self) -> Result<&Url> {
        self.current
            .as_ref()
            .ok_or_else(|| HarvestError::QueryError("No page has been loaded".to_string()))
    }
}

#[async_trait]
impl RenderEngine for ChromeEngine {
    async fn navigate(&mut self, url: &Url) -> Result<()> {
        debug!("Navigating to {}", url);
        let nav_err = |e: chromiumoxide::error::CdpError| HarvestError::NavigationError {
            url: url.to_string(),
            reason: e.to_string(),
        };

        self.page.goto(url.as_str()).await.map_err(nav_err)?;
        self.page.wait_for_navigation().await.map_err(nav_err)?;

        // Follow redirects so relative links resolve against the final URL
        let landed = self
            .page
            .url()
            .await
            .ok()
            .flatten()
            .and_then(|u| Url::parse(&u).ok())
            .unwrap_or_else(|| url.clone());
        self.current = Some(landed);
        Ok(())
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<()> {
        let started = Instant::now();
        loop {
            if self.page.find_element(selector).await.is_ok() {
                trace!("Selector `{}` present after {:?}", selector, started.elapsed());
                return Ok(());
            }
            if started.elapsed() >= timeout {
                return Err(HarvestError::Timeout {
                    selector: selector.to_string(),
                    waited: timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn evaluate<Q: Query>(&mut self, query: &Q) -> Result<Q::Output> {
        let html = self
            .page
            .content()
            .await
            .map_err(|e| HarvestError::BrowserError(e.to_string()))?;
        let base = self.current_url()?;
        let document = Html::parse_document(&html);
        query.evaluate(&document, base)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(handle) = self.browser.take() {
            handle.shutdown().await?;
        }
        Ok(())
    }
}
