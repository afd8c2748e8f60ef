//! Configuration management
//!
//! Everything has a default, so a missing config file simply means "crawl
//! both sites into `./extracted`". A TOML file can override any field.

use crate::chrome::ChromeConfig;
use crate::sanitize::{DEFAULT_BUDGET, MIN_BUDGET};
use crate::{HarvestError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of the output tree
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Maximum bytes per path segment
    #[serde(default = "default_budget")]
    pub name_budget: usize,

    /// Skip units recorded in the completion ledger
    #[serde(default = "default_true")]
    pub resume: bool,

    #[serde(default)]
    pub chrome: ChromeConfig,

    #[serde(default)]
    pub catalog: CatalogProfile,

    #[serde(default)]
    pub book: BookProfile,
}

/// Drug-class catalog: category index → paginated listing → label page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogProfile {
    /// Subdirectory of `output_dir` for this job
    pub output_subdir: String,
    pub landing_url: String,
    /// Optional selector to wait for on the landing page
    pub frontier_wait: Option<String>,
    /// Anchors naming the categories
    pub frontier_selector: String,
    /// Appended as `pagesize=N&page=1` to each category URL
    pub page_size: Option<u32>,
    pub item_selector: String,
    pub label_selector: String,
    pub key_selector: String,
    pub next_selector: String,
    pub content_selector: String,
    pub preview_selector: String,
    /// Hard cap on listing pages per category
    pub max_pages: usize,
    pub wait_timeout_secs: u64,
}

impl Default for CatalogProfile {
    fn default() -> Self {
        Self {
            output_subdir: "dailymed".to_string(),
            landing_url: "https://dailymed.nlm.nih.gov/dailymed/browse-drug-classes.cfm"
                .to_string(),
            frontier_wait: None,
            frontier_selector: ".index-list li a".to_string(),
            page_size: Some(200),
            item_selector: "div.results article".to_string(),
            label_selector: "a.drug-info-link".to_string(),
            key_selector: "span.ndc-codes".to_string(),
            next_selector: "a.next-link".to_string(),
            content_selector: "div.drug-label-sections".to_string(),
            preview_selector: ".preview-text".to_string(),
            max_pages: 10_000,
            wait_timeout_secs: 30,
        }
    }
}

impl CatalogProfile {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}

/// Reference book: table of contents → section page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BookProfile {
    pub output_subdir: String,
    pub landing_url: String,
    pub frontier_wait: Option<String>,
    pub frontier_selector: String,
    pub title_selector: String,
    /// Container whose `div[id]` sections are rendered
    pub body_selector: String,
    pub section_selector: String,
    /// Waited for on each section page before extracting
    pub content_wait: Option<String>,
    pub wait_timeout_secs: u64,
}

impl Default for BookProfile {
    fn default() -> Self {
        Self {
            output_subdir: "ncbi".to_string(),
            landing_url: "https://www.ncbi.nlm.nih.gov/books/NBK430685/".to_string(),
            frontier_wait: Some("ul.simple-list.toc".to_string()),
            frontier_selector: "ul.simple-list.toc li a.toc-item".to_string(),
            title_selector: "h1 span.title".to_string(),
            body_selector: "div.jig-ncbiinpagenav.body-content.whole_rhythm".to_string(),
            section_selector: "div[id]".to_string(),
            content_wait: Some("div.jig-ncbiinpagenav.body-content.whole_rhythm".to_string()),
            wait_timeout_secs: 30,
        }
    }
}

impl BookProfile {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}

// Default value functions
fn default_output_dir() -> PathBuf {
    PathBuf::from("extracted")
}
fn default_budget() -> usize {
    DEFAULT_BUDGET
}
fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            name_budget: default_budget(),
            resume: default_true(),
            chrome: ChromeConfig::default(),
            catalog: CatalogProfile::default(),
            book: BookProfile::default(),
        }
    }
}

impl Config {
    /// Load from `path`, or from the user config directory, or fall back to defaults.
    /// An explicitly given path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", path);
        let content = fs::read_to_string(path).map_err(|e| {
            HarvestError::ConfigError(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| HarvestError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the crawl cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.name_budget < MIN_BUDGET {
            return Err(HarvestError::ConfigError(format!(
                "name_budget must be at least {} bytes, got {}",
                MIN_BUDGET, self.name_budget
            )));
        }
        Ok(())
    }

    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "harvest").map(|dirs| dirs.config_dir().join("harvest.toml"))
    }

    /// Output root of the catalog job
    pub fn catalog_root(&self) -> PathBuf {
        self.output_dir.join(&self.catalog.output_subdir)
    }

    /// Output root of the book job
    pub fn book_root(&self) -> PathBuf {
        self.output_dir.join(&self.book.output_subdir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.output_dir, PathBuf::from("extracted"));
        assert_eq!(config.name_budget, 255);
        assert!(config.resume);
        assert_eq!(config.catalog.page_size, Some(200));
        assert_eq!(config.catalog_root(), PathBuf::from("extracted/dailymed"));
        assert_eq!(config.book_root(), PathBuf::from("extracted/ncbi"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            output_dir = "/tmp/out"

            [catalog]
            page_size = 50
            max_pages = 3

            [chrome]
            headless = false
            "#,
        )
        .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.catalog.page_size, Some(50));
        assert_eq!(config.catalog.max_pages, 3);
        assert_eq!(config.catalog.next_selector, "a.next-link");
        assert!(!config.chrome.headless);
        assert_eq!(config.book.frontier_wait.as_deref(), Some("ul.simple-list.toc"));
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = Config::from_toml("output_dir = [").unwrap_err();
        assert!(matches!(err, HarvestError::ConfigError(_)));
    }

    #[test]
    fn test_tiny_name_budget_is_rejected() {
        let err = Config::from_toml("name_budget = 6").unwrap_err();
        assert!(matches!(err, HarvestError::ConfigError(_)));
        assert!(Config::from_toml("name_budget = 16").is_ok());
    }

    #[test]
    fn test_explicit_missing_path_is_error() {
        let err = Config::load(Some(Path::new("/no/such/harvest.toml"))).unwrap_err();
        assert!(matches!(err, HarvestError::ConfigError(_)));
    }
}
