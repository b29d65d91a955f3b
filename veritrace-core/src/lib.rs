//! # Veritrace Core
//!
//! Core library for the Veritrace research agent.
//! Provides the planning loop with its verifier and router, the LLM
//! interface (brain), browsing actors, configuration, and fundamental types.

pub mod brain;
pub mod browser;
pub mod config;
pub mod error;
pub mod providers;
pub mod research;
pub mod types;

// Re-export commonly used types at the crate root.
pub use brain::{Brain, LlmProvider, MockLlmProvider};
pub use browser::{BrowsingActor, MockBrowsingActor, PageBrowsingActor};
pub use config::{VeritraceConfig, load_config};
pub use error::{BrowserError, ConfigError, LlmError, Result, VeritraceError};
pub use research::{
    Fact, Planner, PlannerCallback, ResearchMemory, RouteName, SessionOutcome, SessionReport,
    VerificationRecord,
};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, TokenUsage};
