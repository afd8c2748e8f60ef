//! Chrome browser lifecycle management
//!
//! Handles Chrome discovery and browser initialization. Harvest never
//! installs a browser: it uses a configured binary or one found on the system.

use crate::{HarvestError, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where Chrome was resolved from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChromeSource {
    /// Path given in configuration or on the command line
    Configured(PathBuf),
    /// Found in a well-known location or on PATH
    System(PathBuf),
    /// Not resolved yet
    None,
}

/// Configuration for Chrome browser management
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChromeConfig {
    /// Custom Chrome binary path
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,
    /// Run without a visible window
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Extra command-line switches passed to Chrome
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_headless() -> bool {
    true
}

impl Default for ChromeConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: default_headless(),
            args: Vec::new(),
        }
    }
}

/// Handle to a running browser instance
pub struct BrowserHandle {
    pub browser: Browser,
    handle: tokio::task::JoinHandle<()>,
}

impl BrowserHandle {
    /// Close the browser and stop driving its event handler
    pub async fn shutdown(mut self) -> Result<()> {
        self.browser
            .close()
            .await
            .map_err(|e| HarvestError::BrowserError(format!("Failed to close browser: {}", e)))?;
        if let Err(e) = self.browser.wait().await {
            debug!("Browser process did not exit cleanly: {}", e);
        }
        self.handle.abort();
        Ok(())
    }
}

/// Resolves a Chrome binary and launches browser instances
pub struct ChromeManager {
    config: ChromeConfig,
    source: ChromeSource,
}

impl ChromeManager {
    /// Create a new ChromeManager with default configuration
    pub fn new() -> Self {
        Self::with_config(ChromeConfig::default())
    }

    /// Create a new ChromeManager with custom configuration
    pub fn with_config(config: ChromeConfig) -> Self {
        Self {
            config,
            source: ChromeSource::None,
        }
    }

    /// Get the current Chrome source
    pub fn source(&self) -> &ChromeSource {
        &self.source
    }

    /// Resolve the Chrome binary: configured path first, then the system
    pub fn ensure_chrome(&mut self) -> Result<PathBuf> {
        if let ChromeSource::Configured(ref path) | ChromeSource::System(ref path) = self.source {
            if path.exists() {
                return Ok(path.clone());
            }
        }

        if let Some(ref path) = self.config.chrome_path {
            if path.exists() {
                debug!("Using configured Chrome: {:?}", path);
                self.source = ChromeSource::Configured(path.clone());
                return Ok(path.clone());
            }
            return Err(HarvestError::BrowserError(format!(
                "Configured Chrome not found at {}",
                path.display()
            )));
        }

        if let Some(path) = find_system_chrome() {
            debug!("Using system Chrome: {:?}", path);
            self.source = ChromeSource::System(path.clone());
            return Ok(path);
        }

        Err(HarvestError::BrowserError(
            "No Chrome found; install Chrome or pass its path with --chrome".to_string(),
        ))
    }

    /// Launch a fresh browser instance
    pub async fn launch(&mut self) -> Result<BrowserHandle> {
        let chrome_path = self.ensure_chrome()?;
        info!("Launching Chrome from {:?}", chrome_path);
        launch_browser(&chrome_path, &self.config).await
    }
}

impl Default for ChromeManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Launch a browser instance with the given Chrome path
async fn launch_browser(chrome_path: &Path, config: &ChromeConfig) -> Result<BrowserHandle> {
    debug!("Launching browser from {:?}", chrome_path);

    let mut builder = BrowserConfig::builder()
        .chrome_executable(chrome_path)
        .arg("--disable-gpu")
        .arg("--no-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-software-rasterizer");
    if !config.headless {
        builder = builder.with_head();
    }
    for arg in &config.args {
        builder = builder.arg(arg.as_str());
    }

    let (browser, mut handler) = Browser::launch(
        builder
            .build()
            .map_err(|e| HarvestError::BrowserError(e.to_string()))?,
    )
    .await
    .map_err(|e| HarvestError::BrowserError(format!("Failed to launch browser: {}", e)))?;

    let handle = tokio::spawn(async move {
        while handler.next().await.is_some() {}
    });

    Ok(BrowserHandle { browser, handle })
}

/// Find Chrome installed on the system
pub fn find_system_chrome() -> Option<PathBuf> {
    let candidates: Vec<&str> = if cfg!(target_os = "macos") {
        vec![
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ]
    } else if cfg!(target_os = "linux") {
        vec![
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
        ]
    } else if cfg!(target_os = "windows") {
        vec![
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    } else {
        vec![]
    };

    for candidate in candidates {
        let path = PathBuf::from(candidate);
        if path.exists() {
            return Some(path);
        }
    }

    which::which("google-chrome")
        .or_else(|_| which::which("google-chrome-stable"))
        .or_else(|_| which::which("chromium"))
        .or_else(|_| which::which("chromium-browser"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chrome_config_default() {
        let config = ChromeConfig::default();
        assert!(config.chrome_path.is_none());
        assert!(config.headless);
        assert!(config.args.is_empty());
    }

    #[test]
    fn test_missing_configured_chrome_is_an_error() {
        let mut manager = ChromeManager::with_config(ChromeConfig {
            chrome_path: Some(PathBuf::from("/definitely/not/here/chrome")),
            ..Default::default()
        });
        let err = manager.ensure_chrome().unwrap_err();
        assert!(matches!(err, HarvestError::BrowserError(_)));
        assert_eq!(manager.source(), &ChromeSource::None);
    }

    #[test]
    fn test_find_system_chrome() {
        // Only checks that discovery doesn't panic
        let _result = find_system_chrome();
    }
}
