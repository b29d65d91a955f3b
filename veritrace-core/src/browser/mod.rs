//! Browsing actors and the page clients they drive.
//!
//! A trait-based page client abstraction with a mock, a plain HTTP client and
//! (behind the `browser` feature) a headless Chrome client, plus a URL
//! security guard.

pub mod actor;
pub mod cdp;
pub mod http;
pub mod security;

#[cfg(feature = "browser")]
pub mod chromium;

pub use actor::{BrowserAction, BrowsingActor, MockBrowsingActor, PageBrowsingActor};
pub use cdp::{MockPage, MockPageClient, PageClient};
pub use http::HttpPageClient;
pub use security::BrowserSecurityGuard;

#[cfg(feature = "browser")]
pub use chromium::ChromiumPageClient;
