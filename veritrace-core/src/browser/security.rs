//! Browser security guard — URL allowlist/blocklist filtering.

use crate::config::BrowserConfig;
use crate::error::BrowserError;
use serde::{Deserialize, Serialize};
use url::Url;

/// Security guard that enforces URL restrictions before a page is loaded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowserSecurityGuard {
    /// If non-empty, only these domains are allowed.
    pub allowed_domains: Vec<String>,
    /// These domains are always blocked.
    pub blocked_domains: Vec<String>,
}

impl BrowserSecurityGuard {
    /// Create a new security guard with the given allowlist and blocklist.
    pub fn new(allowed_domains: Vec<String>, blocked_domains: Vec<String>) -> Self {
        Self {
            allowed_domains,
            blocked_domains,
        }
    }

    pub fn from_config(config: &BrowserConfig) -> Self {
        Self::new(
            config.allowed_domains.clone(),
            config.blocked_domains.clone(),
        )
    }

    /// Check whether a URL may be loaded.
    ///
    /// Rules:
    /// 1. Only `http` and `https` URLs are considered.
    /// 2. If the URL's host matches a blocked domain, it is blocked.
    /// 3. If allowed_domains is non-empty and the host does NOT match, it is blocked.
    /// 4. Otherwise, the URL is allowed.
    pub fn check_url(&self, url_str: &str) -> Result<(), BrowserError> {
        let blocked = || BrowserError::UrlBlocked {
            url: url_str.to_string(),
        };
        let url = Url::parse(url_str).map_err(|_| blocked())?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(blocked());
        }
        let host = url.host_str().unwrap_or("").to_ascii_lowercase();

        if self.blocked_domains.iter().any(|d| domain_matches(&host, d)) {
            return Err(blocked());
        }

        if !self.allowed_domains.is_empty()
            && !self.allowed_domains.iter().any(|d| domain_matches(&host, d))
        {
            return Err(blocked());
        }

        Ok(())
    }
}

/// `host` is `domain` or one of its subdomains.
fn domain_matches(host: &str, domain: &str) -> bool {
    let domain = domain.trim().trim_start_matches('.').to_ascii_lowercase();
    !domain.is_empty() && (host == domain || host.ends_with(&format!(".{domain}")))
}
