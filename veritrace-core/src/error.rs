//! Error types for the Veritrace research core.
//!
//! Uses `thiserror` for public API error types with structured error variants
//! covering the completion service, the browsing actor, and configuration.
//!
//! Malformed model replies are deliberately absent here: the research loop
//! degrades them locally and never surfaces them as errors.

use std::path::PathBuf;

/// Top-level error type for the Veritrace core library.
#[derive(Debug, thiserror::Error)]
pub enum VeritraceError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from completion provider interactions.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Unsupported provider: {provider}")]
    UnsupportedProvider { provider: String },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },

    #[error("Prompt template error: {message}")]
    PromptTemplate { message: String },
}

/// Errors from the browsing actor and its page clients.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BrowserError {
    #[error("Navigation failed: {message}")]
    NavigationFailed { message: String },

    #[error("Page content unavailable: {message}")]
    ContentUnavailable { message: String },

    #[error("URL blocked: {url}")]
    UrlBlocked { url: String },

    #[error("Browser session error: {message}")]
    SessionError { message: String },

    #[error("CDP error: {message}")]
    CdpError { message: String },

    #[error("Completion service failed during browsing: {message}")]
    Planning { message: String },
}

impl From<LlmError> for BrowserError {
    fn from(err: LlmError) -> Self {
        BrowserError::Planning {
            message: err.to_string(),
        }
    }
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// A type alias for results using the top-level `VeritraceError`.
pub type Result<T> = std::result::Result<T, VeritraceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_llm() {
        let err = VeritraceError::Llm(LlmError::ApiRequest {
            message: "connection refused".into(),
        });
        assert_eq!(
            err.to_string(),
            "LLM error: API request failed: connection refused"
        );
    }

    #[test]
    fn test_error_display_browser() {
        let err = VeritraceError::Browser(BrowserError::UrlBlocked {
            url: "https://evil.example".into(),
        });
        assert_eq!(
            err.to_string(),
            "Browser error: URL blocked: https://evil.example"
        );
    }

    #[test]
    fn test_error_display_config() {
        let err = VeritraceError::Config(ConfigError::FileNotFound {
            path: PathBuf::from("/nope/config.toml"),
        });
        assert_eq!(
            err.to_string(),
            "Configuration error: Configuration file not found: /nope/config.toml"
        );
    }

    #[test]
    fn test_llm_error_converts_into_browser_error() {
        let err: BrowserError = LlmError::RateLimited {
            retry_after_secs: 5,
        }
        .into();
        assert!(matches!(err, BrowserError::Planning { .. }));
        assert!(err.to_string().contains("retry after 5s"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: VeritraceError = io_err.into();
        assert!(matches!(err, VeritraceError::Io(_)));
    }
}
