//! Real page client using chromiumoxide.
//!
//! `ChromiumPageClient` implements `PageClient` by driving a headless
//! Chrome/Chromium browser over the DevTools Protocol, so pages that render
//! their content with JavaScript can be read.
//!
//! Requires the `browser` feature flag:
//! ```toml
//! veritrace-core = { path = "veritrace-core", features = ["browser"] }
//! ```

use super::cdp::PageClient;
use super::security::BrowserSecurityGuard;
use crate::config::BrowserConfig;
use crate::error::BrowserError;
use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// A page client backed by chromiumoxide.
///
/// Manages a Chrome/Chromium browser process and a single active page.
pub struct ChromiumPageClient {
    page: Arc<Mutex<chromiumoxide::Page>>,
    browser: Arc<Mutex<chromiumoxide::Browser>>,
    handler: tokio::task::JoinHandle<()>,
    guard: BrowserSecurityGuard,
    user_data_dir: PathBuf,
}

impl ChromiumPageClient {
    /// Launch a new Chrome/Chromium browser and return a connected client.
    pub async fn launch(config: &BrowserConfig) -> Result<Self, BrowserError> {
        let chrome_path = find_chrome_binary(config)?;

        let mut builder = chromiumoxide::BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .request_timeout(std::time::Duration::from_secs(config.request_timeout_secs));

        if config.headless {
            builder = builder.arg("--headless=new");
        }

        // Unique user-data-dir so parallel sessions do not share a profile
        let user_data_dir =
            std::env::temp_dir().join(format!("veritrace-chrome-{}", uuid::Uuid::new_v4()));
        builder = builder
            .user_data_dir(&user_data_dir)
            .arg(format!("--user-agent={}", config.user_agent))
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-gpu")
            .arg("--disable-extensions")
            .arg("--disable-dev-shm-usage");

        let browser_config = builder.build().map_err(|e| BrowserError::SessionError {
            message: format!("Failed to build browser config: {e}"),
        })?;

        let (browser, mut handler) = chromiumoxide::Browser::launch(browser_config)
            .await
            .map_err(|e| BrowserError::SessionError {
                message: format!("Failed to launch Chrome: {e}"),
            })?;

        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::SessionError {
                message: format!("Failed to create page: {e}"),
            })?;

        Ok(Self {
            page: Arc::new(Mutex::new(page)),
            browser: Arc::new(Mutex::new(browser)),
            handler: handler_task,
            guard: BrowserSecurityGuard::from_config(config),
            user_data_dir,
        })
    }

    /// Profile directory of this browser; removed by `close`.
    pub fn user_data_dir(&self) -> &Path {
        &self.user_data_dir
    }
}

#[async_trait]
impl PageClient for ChromiumPageClient {
    /// Navigate to `url`. A page that redirected to a blocked URL is replaced
    /// with `about:blank` so its content can't be read.
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let page = self.page.lock().await;
        page.goto(url)
            .await
            .map_err(|e| BrowserError::NavigationFailed {
                message: format!("{url}: {e}"),
            })?;

        let landed = page.url().await.map_err(|e| BrowserError::CdpError {
            message: format!("get_url failed: {e}"),
        })?;
        let requested = url::Url::parse(url).ok();
        if let Some(landed) =
            landed.filter(|landed| requested.as_ref().map(url::Url::as_str) != Some(landed.as_str()))
            && let Err(err) = self.guard.check_url(&landed)
        {
            let _ = page.goto("about:blank").await;
            return Err(err);
        }
        Ok(())
    }

    async fn get_text(&self) -> Result<String, BrowserError> {
        let page = self.page.lock().await;
        let result = page
            .evaluate("document.body ? document.body.innerText : ''")
            .await
            .map_err(|e| BrowserError::CdpError {
                message: format!("get_text failed: {e}"),
            })?;
        Ok(result.into_value::<String>().unwrap_or_default())
    }

    async fn get_url(&self) -> Result<String, BrowserError> {
        let page = self.page.lock().await;
        let url = page.url().await.map_err(|e| BrowserError::CdpError {
            message: format!("get_url failed: {e}"),
        })?;
        Ok(url.unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn get_title(&self) -> Result<String, BrowserError> {
        let page = self.page.lock().await;
        let title = page.get_title().await.map_err(|e| BrowserError::CdpError {
            message: format!("get_title failed: {e}"),
        })?;
        Ok(title.unwrap_or_default())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let mut browser = self.browser.lock().await;
        browser
            .close()
            .await
            .map_err(|e| BrowserError::SessionError {
                message: format!("Failed to close browser: {e}"),
            })?;
        let _ = browser.wait().await;
        self.handler.abort();

        if let Err(e) = tokio::fs::remove_dir_all(&self.user_data_dir).await {
            tracing::debug!(
                path = %self.user_data_dir.display(),
                error = %e,
                "Failed to remove Chrome profile directory"
            );
        }
        Ok(())
    }
}

/// Find a Chrome or Chromium binary on the system.
fn find_chrome_binary(config: &BrowserConfig) -> Result<PathBuf, BrowserError> {
    if let Some(path) = &config.chrome_path {
        let p = PathBuf::from(path);
        if p.exists() {
            return Ok(p);
        }
    }

    #[cfg(target_os = "macos")]
    let candidates: &[&str] = &[
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
    ];
    #[cfg(target_os = "linux")]
    let candidates: &[&str] = &[
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
    ];
    #[cfg(target_os = "windows")]
    let candidates: &[&str] = &[
        r"C:\Program Files\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    ];
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    let candidates: &[&str] = &[];

    candidates
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| BrowserError::SessionError {
            message: "No Chrome or Chromium binary found; set browser.chrome_path".to_string(),
        })
}
