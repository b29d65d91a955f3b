//! Page client trait and mock implementation.
//!
//! `PageClient` is the small slice of a DevTools-style client the browsing
//! actor needs: load a page and read back its text. It keeps the actor
//! testable without a network or a Chrome instance.

use crate::error::BrowserError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Trait abstracting page loading and reading.
///
/// Implementors include `MockPageClient` (for tests), `HttpPageClient`
/// (plain HTTP fetches) and `ChromiumPageClient` (headless Chrome, behind the
/// `browser` feature).
#[async_trait]
pub trait PageClient: Send + Sync {
    /// Navigate to the given URL.
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    /// Get the visible text content of the current page.
    async fn get_text(&self) -> Result<String, BrowserError>;

    /// Get the current page URL.
    async fn get_url(&self) -> Result<String, BrowserError>;

    /// Get the current page title.
    async fn get_title(&self) -> Result<String, BrowserError>;

    /// Release the underlying session.
    async fn close(&self) -> Result<(), BrowserError>;
}

/// A page served by [`MockPageClient`].
#[derive(Debug, Clone, Default)]
pub struct MockPage {
    pub title: String,
    pub text: String,
}

/// A mock page client for testing. Records all calls and serves configured pages.
pub struct MockPageClient {
    /// Current URL (set by navigate).
    pub current_url: Mutex<String>,
    /// Pages keyed by exact URL.
    pub pages: Mutex<HashMap<String, MockPage>>,
    /// Served for any URL without an exact entry.
    pub fallback: Mutex<MockPage>,
    /// Record of all method calls for assertion: (method, args).
    pub call_log: Mutex<Vec<(String, Vec<String>)>>,
    /// If set, the next navigate will return this error.
    pub navigate_error: Mutex<Option<BrowserError>>,
    /// Whether the client is "closed".
    pub closed: Mutex<bool>,
}

impl Default for MockPageClient {
    fn default() -> Self {
        Self {
            current_url: Mutex::new("about:blank".to_string()),
            pages: Mutex::new(HashMap::new()),
            fallback: Mutex::new(MockPage::default()),
            call_log: Mutex::new(Vec::new()),
            navigate_error: Mutex::new(None),
            closed: Mutex::new(false),
        }
    }
}

impl MockPageClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `text` under `title` whenever `url` is loaded.
    pub fn add_page(&self, url: impl Into<String>, title: impl Into<String>, text: impl Into<String>) {
        self.pages.lock().unwrap().insert(
            url.into(),
            MockPage {
                title: title.into(),
                text: text.into(),
            },
        );
    }

    /// Set the page served for unknown URLs.
    pub fn set_fallback(&self, title: impl Into<String>, text: impl Into<String>) {
        *self.fallback.lock().unwrap() = MockPage {
            title: title.into(),
            text: text.into(),
        };
    }

    /// Set an error that the next navigate() will return.
    pub fn set_navigate_error(&self, err: BrowserError) {
        *self.navigate_error.lock().unwrap() = Some(err);
    }

    fn log_call(&self, method: &str, args: Vec<String>) {
        self.call_log
            .lock()
            .unwrap()
            .push((method.to_string(), args));
    }

    fn current_page(&self) -> MockPage {
        let url = self.current_url.lock().unwrap().clone();
        self.pages
            .lock()
            .unwrap()
            .get(&url)
            .cloned()
            .unwrap_or_else(|| self.fallback.lock().unwrap().clone())
    }

    /// Get the number of calls to a given method.
    pub fn call_count(&self, method: &str) -> usize {
        self.call_log
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .count()
    }

    /// URLs passed to navigate, in order.
    pub fn visited(&self) -> Vec<String> {
        self.call_log
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == "navigate")
            .filter_map(|(_, args)| args.first().cloned())
            .collect()
    }

    /// Get all recorded calls.
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.call_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageClient for MockPageClient {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.log_call("navigate", vec![url.to_string()]);
        if let Some(err) = self.navigate_error.lock().unwrap().take() {
            return Err(err);
        }
        *self.current_url.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn get_text(&self) -> Result<String, BrowserError> {
        self.log_call("get_text", vec![]);
        Ok(self.current_page().text)
    }

    async fn get_url(&self) -> Result<String, BrowserError> {
        self.log_call("get_url", vec![]);
        Ok(self.current_url.lock().unwrap().clone())
    }

    async fn get_title(&self) -> Result<String, BrowserError> {
        self.log_call("get_title", vec![]);
        Ok(self.current_page().title)
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.log_call("close", vec![]);
        *self.closed.lock().unwrap() = true;
        Ok(())
    }
}
