//! Browsing actors — turn a natural-language command into a textual result.
//!
//! The planner only sees [`BrowsingActor`]. [`PageBrowsingActor`] is the real
//! implementation: a short LLM-driven loop of search and visit actions over a
//! [`PageClient`]. [`MockBrowsingActor`] replays scripted results for tests.

use super::cdp::PageClient;
use super::security::BrowserSecurityGuard;
use crate::brain::Brain;
use crate::config::{BrowserConfig, PromptConfig};
use crate::error::BrowserError;
use crate::research::prompts;
use async_trait::async_trait;
use regex::Regex;
use std::collections::VecDeque;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Executes a browsing command and reports what it found.
#[async_trait]
pub trait BrowsingActor: Send + Sync {
    async fn run(&self, task: &str) -> Result<String, BrowserError>;
}

/// Scripted actor for tests.
///
/// Results are returned in FIFO order; once the queue is empty every task
/// gets [`MockBrowsingActor::FALLBACK_RESULT`]. An optional delay is slept
/// before each result, which works with tokio's paused test clock.
pub struct MockBrowsingActor {
    results: Mutex<VecDeque<Result<String, BrowserError>>>,
    tasks: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl Default for MockBrowsingActor {
    fn default() -> Self {
        Self {
            results: Mutex::new(VecDeque::new()),
            tasks: Mutex::new(Vec::new()),
            delay: None,
        }
    }
}

impl MockBrowsingActor {
    pub const FALLBACK_RESULT: &'static str = "No results found.";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results<I, S>(results: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let actor = Self::new();
        for result in results {
            actor.queue_result(result);
        }
        actor
    }

    /// Sleep for `delay` before answering each task.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn queue_result(&self, result: impl Into<String>) {
        self.results.lock().unwrap().push_back(Ok(result.into()));
    }

    pub fn queue_error(&self, error: BrowserError) {
        self.results.lock().unwrap().push_back(Err(error));
    }

    /// Tasks received so far, in order.
    pub fn tasks(&self) -> Vec<String> {
        self.tasks.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowsingActor for MockBrowsingActor {
    async fn run(&self, task: &str) -> Result<String, BrowserError> {
        self.tasks.lock().unwrap().push(task.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.results.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(Self::FALLBACK_RESULT.to_string()))
    }
}

/// One action chosen by the model during a browsing step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserAction {
    Search(String),
    Visit(String),
    Done(String),
}

static ACTION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t*`>-]*(SEARCH|VISIT|DONE)[ \t]*:[ \t]*").expect("valid regex")
});

/// Read the first action line in a reply.
///
/// `SEARCH` and `VISIT` take the rest of their line; `DONE` takes everything
/// after the marker, so multi-line summaries survive. An action with an empty
/// argument is ignored.
pub fn parse_action(reply: &str) -> Option<BrowserAction> {
    for caps in ACTION_LINE.captures_iter(reply) {
        let (Some(whole), Some(kind)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let rest = &reply[whole.end()..];
        let action = match kind.as_str().to_ascii_uppercase().as_str() {
            "DONE" => BrowserAction::Done(rest.trim().to_string()),
            kind => {
                let arg = rest
                    .lines()
                    .next()
                    .unwrap_or("")
                    .trim()
                    .trim_matches(|c| matches!(c, '`' | '"' | '<' | '>'))
                    .to_string();
                if kind == "SEARCH" {
                    BrowserAction::Search(arg)
                } else {
                    BrowserAction::Visit(arg)
                }
            }
        };
        let empty = match &action {
            BrowserAction::Search(s) | BrowserAction::Visit(s) | BrowserAction::Done(s) => {
                s.is_empty()
            }
        };
        if !empty {
            return Some(action);
        }
    }
    None
}

/// Keep at most `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}\n[truncated]", &text[..cut]),
        None => text.to_string(),
    }
}

/// LLM-driven browsing over a [`PageClient`].
pub struct PageBrowsingActor {
    brain: Brain,
    client: Arc<dyn PageClient>,
    config: BrowserConfig,
    guard: BrowserSecurityGuard,
    step_template: String,
    summary_template: String,
}

impl PageBrowsingActor {
    pub fn new(brain: Brain, client: Arc<dyn PageClient>, config: BrowserConfig) -> Self {
        let guard = BrowserSecurityGuard::from_config(&config);
        Self {
            brain,
            client,
            config,
            guard,
            step_template: prompts::BROWSER_STEP_TEMPLATE.to_string(),
            summary_template: prompts::BROWSER_SUMMARY_TEMPLATE.to_string(),
        }
    }

    /// Use the browser templates from `prompts`.
    pub fn with_prompts(mut self, prompts: &PromptConfig) -> Self {
        self.step_template = prompts.browser_step.clone();
        self.summary_template = prompts.browser_summary.clone();
        self
    }

    pub fn brain(&self) -> &Brain {
        &self.brain
    }

    fn search_url(&self, query: &str) -> String {
        self.config
            .search_url_template
            .replace("{query}", &urlencoding::encode(query))
    }

    /// Load `url` and return `(heading, page text)`.
    async fn load(&self, url: &str) -> Result<(String, String), BrowserError> {
        self.client.navigate(url).await?;
        let title = self.client.get_title().await?;
        let current = self.client.get_url().await?;
        let text = truncate_chars(&self.client.get_text().await?, self.config.max_page_chars);
        let heading = if title.is_empty() {
            current
        } else {
            format!("{title} ({current})")
        };
        Ok((heading, text))
    }

    async fn summarize(&self, task: &str, notes: &[String]) -> Result<String, BrowserError> {
        let notes = if notes.is_empty() {
            "(no pages could be loaded)".to_string()
        } else {
            notes.join("\n\n---\n\n")
        };
        let prompt = prompts::render(
            &self.summary_template,
            &[("task", task), ("notes", notes.as_str())],
        )?;
        Ok(self.brain.predict(&prompt).await?.trim().to_string())
    }
}

#[async_trait]
impl BrowsingActor for PageBrowsingActor {
    /// Run up to `max_steps` browsing steps for `task`.
    ///
    /// Blocked URLs (including blocked redirect targets) and failed page loads
    /// are recorded in the step history and browsing continues. Completion service failures and other client errors
    /// abort the task.
    async fn run(&self, task: &str) -> Result<String, BrowserError> {
        let mut history: Vec<String> = Vec::new();
        let mut notes: Vec<String> = Vec::new();
        let mut page = "(no page loaded yet)".to_string();

        for step in 0..self.config.max_steps {
            let steps_left = (self.config.max_steps - step).to_string();
            let history_text = if history.is_empty() {
                "(none)".to_string()
            } else {
                history.join("\n")
            };
            let prompt = prompts::render(
                &self.step_template,
                &[
                    ("task", task),
                    ("history", history_text.as_str()),
                    ("page", page.as_str()),
                    ("steps_left", steps_left.as_str()),
                ],
            )?;
            let reply = self.brain.predict(&prompt).await?;

            let url = match parse_action(&reply) {
                None => {
                    debug!(step, "No browser action in reply; returning it as the result");
                    return Ok(reply.trim().to_string());
                }
                Some(BrowserAction::Done(summary)) => {
                    info!(step, "Browsing finished");
                    return Ok(summary);
                }
                Some(BrowserAction::Search(query)) => {
                    history.push(format!("{}. SEARCH: {query}", step + 1));
                    self.search_url(&query)
                }
                Some(BrowserAction::Visit(url)) => {
                    if let Err(err) = self.guard.check_url(&url) {
                        warn!(url = %url, "Blocked URL skipped");
                        history.push(format!("{}. VISIT: {url} -> {err}", step + 1));
                        continue;
                    }
                    history.push(format!("{}. VISIT: {url}", step + 1));
                    url
                }
            };

            debug!(step, url = %url, "Loading page");
            match self.load(&url).await {
                Ok((heading, text)) => {
                    page = format!("{heading}\n\n{text}");
                    notes.push(page.clone());
                }
                Err(BrowserError::NavigationFailed { message }) => {
                    warn!(url = %url, error = %message, "Page load failed");
                    if let Some(last) = history.last_mut() {
                        last.push_str(&format!(" -> failed: {message}"));
                    }
                }
                Err(err @ BrowserError::UrlBlocked { .. }) => {
                    warn!(url = %url, error = %err, "Page load redirected to a blocked URL");
                    if let Some(last) = history.last_mut() {
                        last.push_str(&format!(" -> {err}"));
                    }
                }
                Err(err) => return Err(err),
            }
        }

        info!(pages = notes.len(), "Browsing steps exhausted; summarizing");
        self.summarize(task, &notes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::MockLlmProvider;
    use crate::browser::MockPageClient;

    fn actor(
        replies: &[&str],
        config: BrowserConfig,
    ) -> (PageBrowsingActor, Arc<MockPageClient>, Arc<MockLlmProvider>) {
        let provider = Arc::new(MockLlmProvider::with_responses(replies.iter().copied()));
        let client = Arc::new(MockPageClient::new());
        let actor = PageBrowsingActor::new(Brain::new(provider.clone(), ""), client.clone(), config);
        (actor, client, provider)
    }

    #[test]
    fn test_parse_action_variants() {
        assert_eq!(
            parse_action("SEARCH: hafnia alvei mice"),
            Some(BrowserAction::Search("hafnia alvei mice".into()))
        );
        assert_eq!(
            parse_action("I'll open it.\nvisit: <https://en.wikipedia.org/wiki/Hafnia>"),
            Some(BrowserAction::Visit("https://en.wikipedia.org/wiki/Hafnia".into()))
        );
        assert_eq!(
            parse_action("DONE: Found two papers.\nNature (2020)"),
            Some(BrowserAction::Done("Found two papers.\nNature (2020)".into()))
        );
        assert_eq!(parse_action("Nothing actionable here."), None);
        assert_eq!(parse_action("SEARCH:   \nDONE: ok"), Some(BrowserAction::Done("ok".into())));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abc", 5), "abc");
        assert_eq!(truncate_chars("abcdef", 3), "abc\n[truncated]");
        assert_eq!(truncate_chars("ééé", 2), "éé\n[truncated]");
    }

    #[tokio::test]
    async fn test_search_then_done() {
        let (actor, client, provider) = actor(
            &["SEARCH: alvei mice", "DONE: Mice were studied (Nature, 2020)."],
            BrowserConfig::default(),
        );
        client.set_fallback("Results", "Hafnia alvei reduces weight gain in mice.");

        let result = actor.run("find animals").await.unwrap();
        assert_eq!(result, "Mice were studied (Nature, 2020).");
        assert_eq!(
            client.visited(),
            vec!["https://html.duckduckgo.com/html/?q=alvei%20mice"]
        );
        let second_prompt = &provider.prompts()[1];
        assert!(second_prompt.contains("Hafnia alvei reduces weight gain in mice."));
        assert!(second_prompt.contains("1. SEARCH: alvei mice"));
    }

    #[tokio::test]
    async fn test_blocked_visit_is_skipped() {
        let config = BrowserConfig {
            blocked_domains: vec!["evil.example".into()],
            ..Default::default()
        };
        let (actor, client, provider) = actor(&["VISIT: https://evil.example/x", "DONE: nothing"], config);

        let result = actor.run("task").await.unwrap();
        assert_eq!(result, "nothing");
        assert!(client.visited().is_empty());
        assert!(provider.prompts()[1].contains("URL blocked: https://evil.example/x"));
    }

    #[tokio::test]
    async fn test_reply_without_action_is_result() {
        let (actor, _, _) = actor(&["The answer is mice."], BrowserConfig::default());
        assert_eq!(actor.run("task").await.unwrap(), "The answer is mice.");
    }

    #[tokio::test]
    async fn test_steps_exhausted_summarizes_notes() {
        let config = BrowserConfig {
            max_steps: 1,
            max_page_chars: 10,
            ..Default::default()
        };
        let (actor, client, provider) = actor(
            &["VISIT: https://en.wikipedia.org/wiki/Hafnia", "Summary of findings"],
            config,
        );
        client.add_page(
            "https://en.wikipedia.org/wiki/Hafnia",
            "Hafnia",
            "0123456789abcdef",
        );

        let result = actor.run("task").await.unwrap();
        assert_eq!(result, "Summary of findings");
        let summary_prompt = &provider.prompts()[1];
        assert!(summary_prompt.contains("Hafnia (https://en.wikipedia.org/wiki/Hafnia)"));
        assert!(summary_prompt.contains("0123456789\n[truncated]"));
        assert!(!summary_prompt.contains("abcdef"));
    }

    #[tokio::test]
    async fn test_navigation_failure_is_noted() {
        let config = BrowserConfig {
            max_steps: 2,
            ..Default::default()
        };
        let (actor, client, provider) = actor(&["SEARCH: q", "DONE: gave up"], config);
        client.set_navigate_error(BrowserError::NavigationFailed {
            message: "HTTP 503".into(),
        });

        assert_eq!(actor.run("task").await.unwrap(), "gave up");
        assert!(provider.prompts()[1].contains("1. SEARCH: q -> failed: HTTP 503"));
    }

    #[tokio::test]
    async fn test_blocked_redirect_is_noted() {
        let config = BrowserConfig {
            max_steps: 2,
            ..Default::default()
        };
        let (actor, client, provider) =
            actor(&["VISIT: https://allowed.example/", "DONE: skipped"], config);
        client.set_navigate_error(BrowserError::UrlBlocked {
            url: "http://blocked.test/secret".into(),
        });

        assert_eq!(actor.run("task").await.unwrap(), "skipped");
        assert!(provider.prompts()[1].contains(
            "1. VISIT: https://allowed.example/ -> URL blocked: http://blocked.test/secret"
        ));
    }

    #[tokio::test]
    async fn test_llm_failure_aborts() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_error(crate::error::LlmError::Connection {
            message: "offline".into(),
        });
        let actor = PageBrowsingActor::new(
            Brain::new(provider, ""),
            Arc::new(MockPageClient::new()),
            BrowserConfig::default(),
        );
        let err = actor.run("task").await.unwrap_err();
        assert!(matches!(err, BrowserError::Planning { .. }));
    }

    #[tokio::test]
    async fn test_mock_actor_fifo_and_fallback() {
        let actor = MockBrowsingActor::with_results(["first"]);
        actor.queue_error(BrowserError::SessionError {
            message: "crashed".into(),
        });
        assert_eq!(actor.run("a").await.unwrap(), "first");
        assert!(actor.run("b").await.is_err());
        assert_eq!(actor.run("c").await.unwrap(), MockBrowsingActor::FALLBACK_RESULT);
        assert_eq!(actor.tasks(), vec!["a", "b", "c"]);
    }
}
