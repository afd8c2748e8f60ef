//! Harvest Core Library
//!
//! Core functionality for the Harvest crawler including:
//! - Chrome browser lifecycle management
//! - The render engine seam and its DOM queries
//! - Pagination, detail extraction and identifier sanitization
//! - Hierarchical persistence with a resumable completion ledger

pub mod chrome;
pub mod config;
pub mod extract;
pub mod job;
pub mod ledger;
pub mod render;
pub mod sanitize;
pub mod store;
pub mod testing;
pub mod walker;

use std::time::Duration;
use thiserror::Error;
use url::Url;

// Re-export key types
pub use chrome::{ChromeConfig, ChromeManager};
pub use config::{BookProfile, CatalogProfile, Config};
pub use job::{run_book, run_catalog, JobOutput, RunReport};
pub use render::{ChromeEngine, Query, RenderEngine};

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Browser error: {0}")]
    BrowserError(String),

    #[error("Navigation to {url} failed: {reason}")]
    NavigationError { url: String, reason: String },

    #[error("Timed out after {waited:?} waiting for selector `{selector}`")]
    Timeout { selector: String, waited: Duration },

    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Pagination exceeded {pages} pages (last url: {url})")]
    PaginationLimit { url: String, pages: usize },

    #[error("Pagination cycle: next page {url} was already fetched")]
    PaginationCycle { url: String },

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, HarvestError>;

/// Top-level grouping discovered on a landing page; one output directory each
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyRoot {
    /// Anchor text, trimmed
    pub label: String,
    /// Absolute URL the root links to
    pub entry_url: Url,
}

/// One leaf unit of content found on a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Primary label (drug name, section title)
    pub display_label: String,
    /// Disambiguating key; may be empty or composite
    pub secondary_key: String,
    /// Absolute URL of the detail page
    pub detail_url: Option<Url>,
}

/// Plain data captured from a single listing page.
///
/// Items and the next-page link are read in one evaluation so nothing is
/// lost when the caller navigates away to visit details.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub items: Vec<Item>,
    pub next: Option<Url>,
}

/// Result of flattening a detail page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedContent {
    /// The content container was present; flattened text (may be empty)
    Content(String),
    /// The page had no content container
    ContainerAbsent,
}

impl ExtractedContent {
    /// Text to persist; an absent container persists as an empty file
    pub fn text(&self) -> &str {
        match self {
            ExtractedContent::Content(text) => text,
            ExtractedContent::ContainerAbsent => "",
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, ExtractedContent::ContainerAbsent)
    }
}

/// A rendered book section: page title plus structured text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: Option<String>,
    pub content: ExtractedContent,
}
