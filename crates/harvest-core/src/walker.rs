//! Pagination walker
//!
//! Follows a site's "next page" links as an explicit state machine. The walk
//! ends when a page advertises no next link; a page cap and a visited set
//! turn a misbehaving site into an error instead of an endless loop.

use crate::extract::ListingQuery;
use crate::render::RenderEngine;
use crate::{HarvestError, Item, Result};
use std::collections::HashSet;
use tracing::{debug, info};
use url::Url;

/// Where the walk currently stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageState {
    /// The given page is about to be (or is being) loaded
    Fetching(Url),
    /// The last page linked to another one
    HasMore(Url),
    /// The last page had no next link
    Exhausted,
}

/// Add the page-size and page-number parameters to a category URL
pub fn listing_start_url(entry: &Url, page_size: Option<u32>) -> Url {
    let mut url = entry.clone();
    if let Some(size) = page_size {
        url.query_pairs_mut()
            .append_pair("pagesize", &size.to_string())
            .append_pair("page", "1");
    }
    url
}

/// Walks the listing pages of one hierarchy root
#[derive(Debug)]
pub struct Paginator {
    state: PageState,
    visited: HashSet<Url>,
    pages_fetched: usize,
    max_pages: usize,
}

impl Paginator {
    pub fn new(start: Url, max_pages: usize) -> Self {
        Self {
            state: PageState::Fetching(start),
            visited: HashSet::new(),
            pages_fetched: 0,
            max_pages,
        }
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Load the next listing page and return its items, or `None` once exhausted.
    ///
    /// Items and the next link are captured together, so the caller is free
    /// to navigate elsewhere before calling again.
    pub async fn next_page<E: RenderEngine>(
        &mut self,
        engine: &mut E,
        query: &ListingQuery,
    ) -> Result<Option<Vec<Item>>> {
        let url = match &self.state {
            PageState::Exhausted => return Ok(None),
            PageState::Fetching(url) | PageState::HasMore(url) => url.clone(),
        };

        if self.pages_fetched >= self.max_pages {
            return Err(HarvestError::PaginationLimit {
                url: url.to_string(),
                pages: self.max_pages,
            });
        }
        if !self.visited.insert(url.clone()) {
            return Err(HarvestError::PaginationCycle {
                url: url.to_string(),
            });
        }

        self.state = PageState::Fetching(url.clone());
        engine.navigate(&url).await?;
        let page = engine.evaluate(query).await?;
        self.pages_fetched += 1;

        self.state = match page.next {
            Some(next) => {
                debug!("Page {} links to {}", self.pages_fetched, next);
                PageState::HasMore(next)
            }
            None => {
                info!("Pagination exhausted after {} pages", self.pages_fetched);
                PageState::Exhausted
            }
        };

        Ok(Some(page.items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEngine;

    fn query() -> ListingQuery {
        ListingQuery::new(
            "div.results article",
            "a.drug-info-link",
            "span.ndc-codes",
            "a.next-link",
        )
        .unwrap()
    }

    fn listing(items: &[&str], next: Option<&str>) -> String {
        let mut html = String::from("<div class=\"results\">");
        for item in items {
            html.push_str(&format!(
                "<article><a class=\"drug-info-link\" href=\"/drug/{0}\">{0}</a></article>",
                item
            ));
        }
        html.push_str("</div>");
        if let Some(next) = next {
            html.push_str(&format!("<a class=\"next-link\" href=\"{}\">Next</a>", next));
        }
        html
    }

    #[test]
    fn test_listing_start_url_appends_paging() {
        let entry = Url::parse("https://x.org/browse?cat=1").unwrap();
        assert_eq!(
            listing_start_url(&entry, Some(200)).as_str(),
            "https://x.org/browse?cat=1&pagesize=200&page=1"
        );
        assert_eq!(listing_start_url(&entry, None), entry);
    }

    #[tokio::test]
    async fn test_walks_until_no_next_link() {
        let n: usize = 3;
        let mut engine = FakeEngine::new();
        for page in 1..=n {
            let next = format!("https://x.org/list?page={}", page + 1);
            let (a, b) = (format!("p{}a", page), format!("p{}b", page));
            engine.add_page(
                &format!("https://x.org/list?page={}", page),
                &listing(&[a.as_str(), b.as_str()], Some(next.as_str())),
            );
        }
        engine.add_page(&format!("https://x.org/list?page={}", n + 1), &listing(&[], None));

        let start = Url::parse("https://x.org/list?page=1").unwrap();
        let mut walker = Paginator::new(start, 100);
        let mut labels = Vec::new();
        while let Some(items) = walker.next_page(&mut engine, &query()).await.unwrap() {
            labels.extend(items.into_iter().map(|i| i.display_label));
        }

        assert_eq!(labels, vec!["p1a", "p1b", "p2a", "p2b", "p3a", "p3b"]);
        assert_eq!(walker.state(), &PageState::Exhausted);
        assert_eq!(walker.pages_fetched(), n + 1);
        assert!(!engine
            .navigations()
            .iter()
            .any(|u| u.as_str() == format!("https://x.org/list?page={}", n + 2)));
        assert!(walker.next_page(&mut engine, &query()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_self_referencing_next_is_a_cycle() {
        let mut engine = FakeEngine::new();
        engine.add_page(
            "https://x.org/list?page=1",
            &listing(&["a"], Some("https://x.org/list?page=1")),
        );

        let mut walker = Paginator::new(Url::parse("https://x.org/list?page=1").unwrap(), 100);
        assert!(walker.next_page(&mut engine, &query()).await.unwrap().is_some());
        let err = walker.next_page(&mut engine, &query()).await.unwrap_err();
        assert!(matches!(err, HarvestError::PaginationCycle { .. }));
        assert_eq!(engine.navigations().len(), 1);
    }

    #[tokio::test]
    async fn test_page_cap_is_reported() {
        let mut engine = FakeEngine::new();
        for page in 1..=5 {
            let next = format!("https://x.org/list?page={}", page + 1);
            engine.add_page(
                &format!("https://x.org/list?page={}", page),
                &listing(&["a"], Some(next.as_str())),
            );
        }

        let mut walker = Paginator::new(Url::parse("https://x.org/list?page=1").unwrap(), 2);
        assert!(walker.next_page(&mut engine, &query()).await.unwrap().is_some());
        assert!(walker.next_page(&mut engine, &query()).await.unwrap().is_some());
        let err = walker.next_page(&mut engine, &query()).await.unwrap_err();
        assert!(matches!(err, HarvestError::PaginationLimit { pages: 2, .. }));
    }
}
