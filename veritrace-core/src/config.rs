//! Configuration system for Veritrace.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/veritrace/config.toml` and/or
//! `.veritrace/config.toml` in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

use crate::research::prompts;

/// The research question the reference session starts from.
pub const DEFAULT_INITIAL_COMMAND: &str = "Open the browser and search for: 'Animals mentioned in Ilias Lagkouvardos and Olga Tapia papers on the alvei species that also appear in the 2021 Wikipedia article about a multicenter, randomized, double-blind study.'";

/// Top-level configuration for a Veritrace session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VeritraceConfig {
    pub llm: LlmConfig,
    pub research: ResearchConfig,
    pub browser: BrowserConfig,
    pub prompts: PromptConfig,
}

/// Configuration for the completion provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name: "openai", "local", or any OpenAI-compatible endpoint.
    pub provider: String,
    /// Model identifier (e.g., "gpt-4o").
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Inline API key. Takes precedence over `api_key_env` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Optional base URL override for the API endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Maximum tokens to generate in a response.
    pub max_tokens: usize,
    /// Default temperature for generation.
    pub temperature: f32,
    /// Optional model override for the browsing actor's own completions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_model: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
            base_url: None,
            max_tokens: 4096,
            temperature: 0.7,
            browser_model: None,
        }
    }
}

impl LlmConfig {
    /// A copy of this config targeting the browser model, if one is set.
    pub fn for_browser(&self) -> LlmConfig {
        let mut config = self.clone();
        if let Some(model) = &self.browser_model {
            config.model = model.clone();
        }
        config
    }
}

/// Configuration for the research loop itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Wall-clock budget for a session, in seconds.
    pub time_budget_secs: u64,
    /// Command the session is seeded with when none is given.
    pub initial_command: String,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            time_budget_secs: 300,
            initial_command: DEFAULT_INITIAL_COMMAND.to_string(),
        }
    }
}

impl ResearchConfig {
    pub fn time_budget(&self) -> Duration {
        Duration::from_secs(self.time_budget_secs)
    }

    /// Validate this research config and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.time_budget_secs == 0 {
            warnings.push(
                "time_budget_secs is 0; sessions will time out before the first step".to_string(),
            );
        }
        if self.initial_command.trim().is_empty() {
            warnings.push("initial_command is empty".to_string());
        }
        warnings
    }
}

fn default_max_body_bytes() -> usize {
    4 * 1024 * 1024
}

/// Configuration for the browsing actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Maximum navigation steps per browsing task.
    pub max_steps: usize,
    /// Page text beyond this many characters is truncated before prompting.
    pub max_page_chars: usize,
    /// Response bodies are read up to this many bytes; the rest is dropped.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Search URL with a `{query}` placeholder.
    pub search_url_template: String,
    /// If non-empty, only these domains are allowed.
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    /// These domains are always blocked.
    #[serde(default)]
    pub blocked_domains: Vec<String>,
    /// Drive a real Chrome/Chromium instead of plain HTTP fetches.
    /// Requires the `browser` feature.
    pub use_chromium: bool,
    /// Path to the Chrome/Chromium binary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<String>,
    /// Whether to run headless (no visible window).
    pub headless: bool,
    /// Timeout for a single HTTP page fetch, in seconds.
    pub request_timeout_secs: u64,
    /// User agent sent by the HTTP page client.
    pub user_agent: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            max_steps: 6,
            max_page_chars: 6000,
            max_body_bytes: default_max_body_bytes(),
            search_url_template: "https://html.duckduckgo.com/html/?q={query}".to_string(),
            allowed_domains: Vec::new(),
            blocked_domains: Vec::new(),
            use_chromium: false,
            chrome_path: None,
            headless: true,
            request_timeout_secs: 30,
            user_agent: format!("veritrace/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl BrowserConfig {
    /// Validate this browser config and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.max_steps == 0 {
            warnings.push(
                "max_steps is 0; the browsing actor will only summarize an empty session"
                    .to_string(),
            );
        }
        if self.max_body_bytes == 0 {
            warnings.push("max_body_bytes is 0; every page will load empty".to_string());
        }
        if !self.search_url_template.contains("{query}") {
            warnings.push(format!(
                "search_url_template '{}' has no {{query}} placeholder",
                self.search_url_template
            ));
        }
        if self.use_chromium && !cfg!(feature = "browser") {
            warnings.push(
                "use_chromium is set but this build lacks the `browser` feature; falling back to HTTP"
                    .to_string(),
            );
        }
        warnings
    }
}

/// Prompt templates, written in Handlebars with `{{name}}` placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// System prompt sent ahead of every planning completion. Empty disables it.
    pub system: String,
    pub verify: String,
    pub extract_facts: String,
    pub route: String,
    pub next_command: String,
    pub browser_step: String,
    pub browser_summary: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system: prompts::SYSTEM_PROMPT.to_string(),
            verify: prompts::VERIFY_TEMPLATE.to_string(),
            extract_facts: prompts::EXTRACT_FACTS_TEMPLATE.to_string(),
            route: prompts::ROUTE_TEMPLATE.to_string(),
            next_command: prompts::NEXT_COMMAND_TEMPLATE.to_string(),
            browser_step: prompts::BROWSER_STEP_TEMPLATE.to_string(),
            browser_summary: prompts::BROWSER_SUMMARY_TEMPLATE.to_string(),
        }
    }
}

impl PromptConfig {
    /// Report templates that do not parse.
    pub fn validate(&self) -> Vec<String> {
        [
            ("verify", &self.verify),
            ("extract_facts", &self.extract_facts),
            ("route", &self.route),
            ("next_command", &self.next_command),
            ("browser_step", &self.browser_step),
            ("browser_summary", &self.browser_summary),
        ]
        .into_iter()
        .filter_map(|(name, template)| {
            prompts::check_template(template)
                .err()
                .map(|e| format!("{name} template is invalid: {e}"))
        })
        .collect()
    }
}

impl VeritraceConfig {
    /// Validate the whole configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for w in self.research.validate() {
            warnings.push(format!("[research] {}", w));
        }
        for w in self.browser.validate() {
            warnings.push(format!("[browser] {}", w));
        }
        for w in self.prompts.validate() {
            warnings.push(format!("[prompts] {}", w));
        }
        warnings
    }
}

/// Path of the user-level config file, if a home directory can be resolved.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "veritrace", "veritrace")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Path of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".veritrace").join("config.toml")
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `VERITRACE_`)
/// 3. An explicit config file (`--config`)
/// 4. Workspace-local config (`.veritrace/config.toml`)
/// 5. User config (`~/.config/veritrace/config.toml`)
/// 6. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    config_file: Option<&Path>,
    overrides: Option<&VeritraceConfig>,
) -> Result<VeritraceConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(VeritraceConfig::default()));

    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = config_file {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        figment = figment.merge(Toml::file(path));
    }

    // VERITRACE_LLM__MODEL, VERITRACE_RESEARCH__TIME_BUDGET_SECS, etc.
    figment = figment.merge(Env::prefixed("VERITRACE_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })
}

/// Write the default configuration to `.veritrace/config.toml` in the workspace.
///
/// Refuses to overwrite an existing file. Returns the path written.
pub fn write_default_config(workspace: &Path) -> anyhow::Result<PathBuf> {
    let path = workspace_config_path(workspace);
    if path.exists() {
        anyhow::bail!("config file already exists: {}", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(&VeritraceConfig::default())?;
    std::fs::write(&path, content)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = VeritraceConfig::default();
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.research.time_budget_secs, 300);
        assert_eq!(config.research.time_budget(), Duration::from_secs(300));
        assert_eq!(config.research.initial_command, DEFAULT_INITIAL_COMMAND);
        assert!(config.browser.search_url_template.contains("{query}"));
        assert!(config.prompts.verify.contains("{{browser_result}}"));
    }

    #[test]
    fn test_validate_reports_broken_prompt_template() {
        let mut config = VeritraceConfig::default();
        config.prompts.route = "History: {{route_history".to_string();
        let warnings = config.validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("[prompts] route template is invalid"));
    }

    #[test]
    fn test_default_config_has_no_warnings() {
        let config = VeritraceConfig::default();
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_validate_flags_zero_budget_and_bad_template() {
        let mut config = VeritraceConfig::default();
        config.research.time_budget_secs = 0;
        config.browser.search_url_template = "https://example.com/search".into();
        let warnings = config.validate();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].starts_with("[research]"));
        assert!(warnings[1].starts_with("[browser]"));
    }

    #[test]
    fn test_browser_model_override() {
        let mut llm = LlmConfig::default();
        assert_eq!(llm.for_browser().model, "gpt-4o");
        llm.browser_model = Some("gpt-4o-mini".into());
        assert_eq!(llm.for_browser().model, "gpt-4o-mini");
        assert_eq!(llm.model, "gpt-4o");
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = VeritraceConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: VeritraceConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized.llm.model, config.llm.model);
        assert_eq!(
            deserialized.research.time_budget_secs,
            config.research.time_budget_secs
        );
        assert_eq!(deserialized.prompts.route, config.prompts.route);
    }

    #[test]
    fn test_load_config_from_workspace_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(".veritrace");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("config.toml"),
            "[research]\ntime_budget_secs = 42\n\n[llm]\nmodel = \"gpt-4o-mini\"\n",
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None, None).unwrap();
        assert_eq!(config.research.time_budget_secs, 42);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        // Untouched sections keep their defaults.
        assert_eq!(config.browser.max_steps, 6);
    }

    #[test]
    fn test_load_config_explicit_file_beats_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(".veritrace");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("config.toml"),
            "[browser]\nmax_steps = 3\n",
        )
        .unwrap();
        let explicit = dir.path().join("custom.toml");
        std::fs::write(&explicit, "[browser]\nmax_steps = 9\n").unwrap();

        let config = load_config(Some(dir.path()), Some(&explicit), None).unwrap();
        assert_eq!(config.browser.max_steps, 9);
    }

    #[test]
    fn test_load_config_with_overrides() {
        let mut overrides = VeritraceConfig::default();
        overrides.research.time_budget_secs = 7;
        let config = load_config(None, None, Some(&overrides)).unwrap();
        assert_eq!(config.research.time_budget_secs, 7);
    }

    #[test]
    fn test_load_config_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let err = load_config(None, Some(&missing), None).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { path } if path == missing));
    }

    #[test]
    fn test_load_config_reports_type_errors() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[research]\ntime_budget_secs = \"soon\"\n").unwrap();
        let err = load_config(None, Some(&bad), None).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_write_default_config_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_default_config(dir.path()).unwrap();
        assert!(path.exists());
        let written: VeritraceConfig =
            toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.llm.model, "gpt-4o");

        assert!(write_default_config(dir.path()).is_err());
    }
}
