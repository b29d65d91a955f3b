//! Router — picks the next route from memory and the latest verification.
//!
//! The selection guidance lives in the prompt; the router trusts the model's
//! choice and only falls back to `continue_search` when no route can be read.

use super::memory::ResearchMemory;
use super::parse;
use super::prompts;
use super::verifier::VerificationRecord;
use crate::brain::Brain;
use crate::error::LlmError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// One of the five next-action categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteName {
    /// Credibility is low: search again to confirm key data.
    SupplementalValidation,
    /// Sources disagree: find an independent third source.
    ThirdPartyValidation,
    /// Specific details are missing: search for them.
    QueryMissingInfo,
    /// Not enough data yet: refine and keep searching.
    ContinueSearch,
    /// Enough verified data: compose the final answer.
    FinalizeAnswer,
}

impl RouteName {
    pub const ALL: [RouteName; 5] = [
        RouteName::SupplementalValidation,
        RouteName::ThirdPartyValidation,
        RouteName::QueryMissingInfo,
        RouteName::ContinueSearch,
        RouteName::FinalizeAnswer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteName::SupplementalValidation => "supplemental_validation",
            RouteName::ThirdPartyValidation => "third_party_validation",
            RouteName::QueryMissingInfo => "query_missing_info",
            RouteName::ContinueSearch => "continue_search",
            RouteName::FinalizeAnswer => "finalize_answer",
        }
    }

    /// The browsing instruction for a non-final route.
    ///
    /// `missing_info` is only used by `QueryMissingInfo`. Returns `None` for
    /// `FinalizeAnswer`, which ends the session instead.
    pub fn instruction(&self, missing_info: &[String]) -> Option<String> {
        let text = match self {
            RouteName::SupplementalValidation => {
                "Supplemental validation: Please perform an additional search to verify all key data."
                    .to_string()
            }
            RouteName::ThirdPartyValidation => {
                "Third-party validation: Please search for a trusted independent source to resolve the contradictions."
                    .to_string()
            }
            RouteName::QueryMissingInfo => {
                let missing = if missing_info.is_empty() {
                    "unspecified details".to_string()
                } else {
                    missing_info.join(", ")
                };
                format!(
                    "Query missing info: Please search specifically for additional details on {missing}."
                )
            }
            RouteName::ContinueSearch => {
                "Continue search: Please refine the query to gather more comprehensive information."
                    .to_string()
            }
            RouteName::FinalizeAnswer => return None,
        };
        Some(text)
    }
}

impl fmt::Display for RouteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a token that names no route.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown route: {0}")]
pub struct UnknownRoute(pub String);

impl FromStr for RouteName {
    type Err = UnknownRoute;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_lowercase();
        RouteName::ALL
            .into_iter()
            .find(|route| route.as_str() == token)
            .ok_or(UnknownRoute(token))
    }
}

/// Chooses routes through the completion service.
pub struct Router<'a> {
    brain: &'a Brain,
    template: &'a str,
}

impl<'a> Router<'a> {
    pub fn new(brain: &'a Brain, template: &'a str) -> Self {
        Self { brain, template }
    }

    /// Build the routing prompt for the current state.
    pub fn build_prompt(
        &self,
        memory: &ResearchMemory,
        verification: &VerificationRecord,
    ) -> Result<String, LlmError> {
        let history: Vec<String> = memory
            .route_history()
            .iter()
            .map(|r| r.as_str().to_string())
            .collect();
        let history = prompts::render_list(&history);
        let credibility = verification.credibility_label();
        let missing = prompts::render_list(&verification.missing_info);
        let contradictions = prompts::render_list(&verification.contradictions);
        let fact_count = memory.verified_facts().len().to_string();

        prompts::render(
            self.template,
            &[
                ("route_history", history.as_str()),
                ("credibility_score", credibility.as_str()),
                ("missing_info", missing.as_str()),
                ("contradictions", contradictions.as_str()),
                ("verified_fact_count", fact_count.as_str()),
            ],
        )
    }

    /// Ask for the next route and record it in `memory`.
    ///
    /// A reply without a readable `ROUTE:` line selects `ContinueSearch`. The
    /// chosen route is always appended to the route history.
    pub async fn decide_route(
        &self,
        memory: &mut ResearchMemory,
        verification: &VerificationRecord,
    ) -> Result<RouteName, LlmError> {
        let prompt = self.build_prompt(memory, verification)?;
        let reply = self.brain.predict(&prompt).await?;

        let route = match parse::parse_route(&reply) {
            Some(route) => route,
            None => {
                debug!("No route token in reply; defaulting to continue_search");
                RouteName::ContinueSearch
            }
        };

        memory.record_route(route);
        info!(route = %route, iteration = memory.route_history().len(), "Route decided");
        Ok(route)
    }
}
