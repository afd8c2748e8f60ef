//! Testing utilities.
//!
//! [`FakeEngine`] serves canned HTML per URL through the same
//! [`RenderEngine`] interface the Chrome engine implements, so traversal
//! logic can be exercised without a browser.

use crate::extract::parse_selector;
use crate::render::{Query, RenderEngine};
use crate::{HarvestError, Result};
use async_trait::async_trait;
use scraper::Html;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use url::Url;

/// In-memory render engine backed by a URL → HTML map
#[derive(Debug, Default)]
pub struct FakeEngine {
    pages: HashMap<String, String>,
    failing: HashSet<String>,
    current: Option<(Url, String)>,
    navigations: Vec<Url>,
    closed: bool,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` when `url` is navigated to
    pub fn add_page(&mut self, url: &str, html: &str) {
        self.pages.insert(url.to_string(), html.to_string());
    }

    /// Builder form of [`FakeEngine::add_page`]
    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.add_page(url, html);
        self
    }

    /// Make navigation to `url` fail as a network error would
    pub fn fail_on(&mut self, url: &str) {
        self.failing.insert(url.to_string());
    }

    /// Every URL navigated to, in order
    pub fn navigations(&self) -> &[Url] {
        &self.navigations
    }

    pub fn navigated_to(&self, url: &str) -> bool {
        self.navigations.iter().any(|u| u.as_str() == url)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn current(&self) -> Result<&(Url, String)> {
        self.current
            .as_ref()
            .ok_or_else(|| HarvestError::QueryError("No page has been loaded".to_string()))
    }
}

#[async_trait]
impl RenderEngine for FakeEngine {
    async fn navigate(&mut self, url: &Url) -> Result<()> {
        self.navigations.push(url.clone());
        if self.failing.contains(url.as_str()) {
            self.current = None;
            return Err(HarvestError::NavigationError {
                url: url.to_string(),
                reason: "connection reset".to_string(),
            });
        }
        let html = self
            .pages
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| HarvestError::NavigationError {
                url: url.to_string(),
                reason: "404 Not Found".to_string(),
            })?;
        self.current = Some((url.clone(), html));
        Ok(())
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<()> {
        let selector_parsed = parse_selector(selector)?;
        let (_, html) = self.current()?;
        let present = Html::parse_document(html)
            .select(&selector_parsed)
            .next()
            .is_some();
        if present {
            Ok(())
        } else {
            Err(HarvestError::Timeout {
                selector: selector.to_string(),
                waited: timeout,
            })
        }
    }

    async fn evaluate<Q: Query>(&mut self, query: &Q) -> Result<Q::Output> {
        let (url, html) = self.current()?;
        query.evaluate(&Html::parse_document(html), url)
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_url_fails_navigation() {
        let mut engine = FakeEngine::new();
        let url = Url::parse("https://x.org/missing").unwrap();
        let err = tokio_test::block_on(engine.navigate(&url)).unwrap_err();
        assert!(matches!(err, HarvestError::NavigationError { .. }));
        assert!(engine.navigated_to("https://x.org/missing"));
    }

    #[test]
    fn test_close_is_recorded() {
        let mut engine = FakeEngine::new();
        tokio_test::block_on(engine.close()).unwrap();
        assert!(engine.is_closed());
    }

    #[tokio::test]
    async fn test_wait_for_absent_selector_times_out() {
        let mut engine = FakeEngine::new().with_page("https://x.org/", "<p>hi</p>");
        engine
            .navigate(&Url::parse("https://x.org/").unwrap())
            .await
            .unwrap();

        engine
            .wait_for_selector("p", Duration::from_secs(1))
            .await
            .unwrap();
        let err = engine
            .wait_for_selector("ul.toc", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::Timeout { .. }));
    }
}
