//! Plain HTTP page client.
//!
//! Fetches pages with reqwest and reduces HTML to readable text. No scripts
//! run, which is enough for search result pages and most article bodies.
//!
//! Every redirect hop is checked against the [`BrowserSecurityGuard`], and
//! bodies are read only up to `max_body_bytes`.

use super::cdp::PageClient;
use super::security::BrowserSecurityGuard;
use crate::config::BrowserConfig;
use crate::error::BrowserError;
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;
use reqwest::Url;

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|noscript|svg)\b[^>]*>.*?</(script|style|noscript|svg)\s*>")
        .expect("valid regex")
});
static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));
static BLOCK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(p|div|br|li|tr|h[1-6]|section|article|header|footer|table|ul|ol)\b[^>]*>")
        .expect("valid regex")
});
static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"));
const MAX_REDIRECTS: usize = 5;

static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\u{a0}]+").expect("valid regex"));

#[derive(Debug, Default)]
struct LoadedPage {
    url: String,
    title: String,
    text: String,
}

/// Page client backed by plain HTTP GET requests.
pub struct HttpPageClient {
    client: reqwest::Client,
    guard: BrowserSecurityGuard,
    max_body_bytes: usize,
    page: Mutex<LoadedPage>,
}

impl HttpPageClient {
    pub fn new(config: &BrowserConfig) -> Result<Self, BrowserError> {
        let guard = BrowserSecurityGuard::from_config(config);
        let redirect_guard = guard.clone();
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else if let Err(err) = redirect_guard.check_url(attempt.url().as_str()) {
                attempt.error(err)
            } else {
                attempt.follow()
            }
        });
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .redirect(policy)
            .build()
            .map_err(|e| BrowserError::SessionError {
                message: format!("Failed to create HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            guard,
            max_body_bytes: config.max_body_bytes,
            page: Mutex::new(LoadedPage {
                url: "about:blank".to_string(),
                ..Default::default()
            }),
        })
    }

    /// Read at most `max_body_bytes` of the body, decoding it lossily.
    async fn read_body(&self, mut response: reqwest::Response) -> Result<String, BrowserError> {
        let mut body: Vec<u8> = Vec::new();
        loop {
            let chunk = response
                .chunk()
                .await
                .map_err(|e| BrowserError::ContentUnavailable {
                    message: format!("Failed to read response body: {e}"),
                })?;
            let Some(chunk) = chunk else { break };
            let room = self.max_body_bytes - body.len();
            if chunk.len() >= room {
                body.extend_from_slice(&chunk[..room]);
                debug!(limit = self.max_body_bytes, "Response body truncated");
                break;
            }
            body.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

/// The URL a redirect was refused for, if `err` came from the guard.
fn blocked_redirect(err: &reqwest::Error) -> Option<String> {
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(BrowserError::UrlBlocked { url }) = cause.downcast_ref::<BrowserError>() {
            return Some(url.clone());
        }
        source = cause.source();
    }
    None
}

#[async_trait]
impl PageClient for HttpPageClient {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| match blocked_redirect(&e) {
                Some(blocked) => BrowserError::UrlBlocked { url: blocked },
                None => BrowserError::NavigationFailed {
                    message: format!("{url}: {e}"),
                },
            })?;

        if Url::parse(url).ok().as_ref() != Some(response.url()) {
            self.guard.check_url(response.url().as_str())?;
        }
        let final_url = response.url().to_string();

        let status = response.status();
        if !status.is_success() {
            return Err(BrowserError::NavigationFailed {
                message: format!("HTTP {status} for URL: {url}"),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = self.read_body(response).await?;

        let is_html = content_type.is_empty()
            || content_type.contains("text/html")
            || content_type.contains("application/xhtml");
        let (title, text) = if is_html {
            (extract_title(&body), html_to_text(&body))
        } else {
            (String::new(), body)
        };
        debug!(url = %final_url, chars = text.len(), "Page loaded");

        *self.page.lock().await = LoadedPage {
            url: final_url,
            title,
            text,
        };
        Ok(())
    }

    async fn get_text(&self) -> Result<String, BrowserError> {
        Ok(self.page.lock().await.text.clone())
    }

    async fn get_url(&self) -> Result<String, BrowserError> {
        Ok(self.page.lock().await.url.clone())
    }

    async fn get_title(&self) -> Result<String, BrowserError> {
        Ok(self.page.lock().await.title.clone())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        Ok(())
    }
}

/// Contents of the first `<title>` element, entity-decoded and trimmed.
pub fn extract_title(html: &str) -> String {
    TITLE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| decode_entities(m.as_str()).trim().to_string())
        .unwrap_or_default()
}

/// Reduce an HTML document to readable text.
///
/// Drops scripts, styles and comments, turns block elements into line breaks,
/// strips the remaining tags and collapses blank lines.
pub fn html_to_text(html: &str) -> String {
    let text = SCRIPT_OR_STYLE.replace_all(html, " ");
    let text = COMMENT.replace_all(&text, " ");
    let text = TITLE.replace_all(&text, " ");
    let text = BLOCK_TAG.replace_all(&text, "\n");
    let text = ANY_TAG.replace_all(&text, "");
    let text = decode_entities(&text);

    text.lines()
        .map(|line| SPACES.replace_all(line.trim(), " ").into_owned())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn ok_response(content_type: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn redirect_response(location: &str) -> String {
        format!(
            "HTTP/1.1 302 Found\r\nlocation: {location}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
        )
    }

    /// Serve canned responses by request path on a local port.
    async fn serve(routes: impl FnOnce(SocketAddr) -> HashMap<String, String>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes = routes(addr);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let routes = routes.clone();
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let request = String::from_utf8_lossy(&request);
                    let path = request.split_whitespace().nth(1).unwrap_or("/");
                    let response = routes.get(path).cloned().unwrap_or_else(|| {
                        "HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                            .to_string()
                    });
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_redirect_to_blocked_host_is_refused() {
        let addr = serve(|addr| {
            HashMap::from([(
                "/".to_string(),
                redirect_response(&format!("http://blocked.test:{}/secret", addr.port())),
            )])
        })
        .await;
        let config = BrowserConfig {
            blocked_domains: vec!["blocked.test".into()],
            ..Default::default()
        };
        let client = HttpPageClient::new(&config).unwrap();

        let err = client.navigate(&format!("http://{addr}/")).await.unwrap_err();
        match err {
            BrowserError::UrlBlocked { url } => assert!(url.starts_with("http://blocked.test:")),
            other => panic!("expected UrlBlocked, got {other:?}"),
        }
        assert_eq!(client.get_url().await.unwrap(), "about:blank");
        assert_eq!(client.get_text().await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_redirect_within_allowed_hosts_is_followed() {
        let addr = serve(|_| {
            HashMap::from([
                ("/hop".to_string(), redirect_response("/page")),
                (
                    "/page".to_string(),
                    ok_response("text/html", "<title>Landing</title><p>Arrived</p>"),
                ),
            ])
        })
        .await;
        let config = BrowserConfig {
            blocked_domains: vec!["blocked.test".into()],
            ..Default::default()
        };
        let client = HttpPageClient::new(&config).unwrap();

        client.navigate(&format!("http://{addr}/hop")).await.unwrap();
        assert_eq!(client.get_url().await.unwrap(), format!("http://{addr}/page"));
        assert_eq!(client.get_title().await.unwrap(), "Landing");
        assert_eq!(client.get_text().await.unwrap(), "Arrived");
    }

    #[tokio::test]
    async fn test_body_read_stops_at_limit() {
        let addr = serve(|_| {
            HashMap::from([(
                "/big".to_string(),
                ok_response("text/plain", &"a".repeat(200_000)),
            )])
        })
        .await;
        let config = BrowserConfig {
            max_body_bytes: 1024,
            ..Default::default()
        };
        let client = HttpPageClient::new(&config).unwrap();

        client.navigate(&format!("http://{addr}/big")).await.unwrap();
        assert_eq!(client.get_text().await.unwrap().len(), 1024);
    }

    #[test]
    fn test_html_to_text() {
        let html = r#"
        <html>
        <head><title>Test</title></head>
        <body>
            <h1>Hello World</h1>
            <p>This is a <b>test</b> paragraph.</p>
            <script>var x = 1;</script>
            <style>.foo { color: red; }</style>
            <!-- hidden note -->
            <ul>
                <li>Item 1</li>
                <li>Item 2</li>
            </ul>
        </body>
        </html>"#;

        let text = html_to_text(html);
        assert!(text.contains("Hello World"));
        assert!(text.contains("This is a test paragraph."));
        assert!(text.contains("Item 1\nItem 2"));
        assert!(!text.contains("var x = 1"));
        assert!(!text.contains("color: red"));
        assert!(!text.contains("hidden note"));
        assert!(!text.contains("Test"));
    }

    #[test]
    fn test_html_entities() {
        let text = html_to_text("<p>A &amp; B &lt; C &gt; D &quot;E&quot;</p>");
        assert_eq!(text, "A & B < C > D \"E\"");
    }

    #[test]
    fn test_amp_decoded_last() {
        assert_eq!(decode_entities("&amp;lt;"), "&lt;");
    }

    #[test]
    fn test_extract_title() {
        assert_eq!(
            extract_title("<html><head><TITLE> Hafnia alvei &amp; obesity </TITLE></head></html>"),
            "Hafnia alvei & obesity"
        );
        assert_eq!(extract_title("<p>no title</p>"), "");
    }

    #[tokio::test]
    async fn test_client_starts_blank() {
        let client = HttpPageClient::new(&BrowserConfig::default()).unwrap();
        assert_eq!(client.get_url().await.unwrap(), "about:blank");
        assert_eq!(client.get_text().await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_navigate_invalid_url_fails() {
        let client = HttpPageClient::new(&BrowserConfig::default()).unwrap();
        let err = client.navigate("not a url").await.unwrap_err();
        assert!(matches!(err, BrowserError::NavigationFailed { .. }));
    }
}
