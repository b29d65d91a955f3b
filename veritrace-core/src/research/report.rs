//! Final answer composition and the combined session report.

use super::memory::{Fact, ResearchMemory};
use super::router::RouteName;
use crate::types::TokenUsage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Conclusion used when no fact was verified.
pub const INSUFFICIENT_INFORMATION: &str = "Insufficient verified information.";

/// Annotation appended to a report whose session ran out of time.
pub const TIME_LIMIT_NOTICE: &str = "Research terminated due to time limit.";

/// Maximum number of distinct sources listed in a final answer.
pub const MAX_LISTED_SOURCES: usize = 3;

/// Distinct `(source, year)` pairs in first-occurrence order.
pub fn distinct_sources(facts: &[Fact]) -> Vec<(&str, i64)> {
    let mut seen = HashSet::new();
    facts
        .iter()
        .map(|f| (f.source.as_str(), f.year))
        .filter(|pair| seen.insert(*pair))
        .collect()
}

/// Summarize every fact, or [`INSUFFICIENT_INFORMATION`] when there are none.
pub fn compile_conclusion(facts: &[Fact]) -> String {
    if facts.is_empty() {
        return INSUFFICIENT_INFORMATION.to_string();
    }
    facts
        .iter()
        .map(|f| format!("Fact: {} | Source: {} ({})", f.fact, f.source, f.year))
        .collect::<Vec<_>>()
        .join(" ; ")
}

/// Compose the final answer from the verified facts in memory.
pub fn compose_final_answer(memory: &ResearchMemory) -> String {
    let facts = memory.verified_facts();
    let sources = distinct_sources(facts)
        .into_iter()
        .take(MAX_LISTED_SOURCES)
        .map(|(source, year)| format!("{source} ({year})"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "\nComprehensive Verified Sources:\n{sources}\n\nFinal Conclusion: {}",
        compile_conclusion(facts)
    )
}

/// Where a session ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    /// Still iterating.
    Searching,
    /// A final answer was produced.
    Finalized,
    /// The time budget ran out first.
    TimedOut,
}

impl SessionOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionOutcome::Searching)
    }
}

/// One completed iteration of the loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// 1-based step number.
    pub index: usize,
    pub command: String,
    pub result: String,
    pub route: RouteName,
    /// Refined command or final answer produced by this step.
    pub instruction: String,
}

/// Everything a session produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub initial_command: String,
    pub steps: Vec<StepRecord>,
    pub outcome: SessionOutcome,
    pub final_answer: Option<String>,
    pub memory: ResearchMemory,
    pub usage: TokenUsage,
    pub elapsed_secs: f64,
}

impl SessionReport {
    pub fn new(initial_command: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            initial_command: initial_command.into(),
            steps: Vec::new(),
            outcome: SessionOutcome::Searching,
            final_answer: None,
            memory: ResearchMemory::new(),
            usage: TokenUsage::default(),
            elapsed_secs: 0.0,
        }
    }

    /// Render the combined text report.
    ///
    /// Lists the initial command, every step's command and result, then
    /// either the final answer or the time-limit notice.
    pub fn render(&self) -> String {
        let mut out = format!("Initial Command: {}\n", self.initial_command);
        for step in &self.steps {
            out.push_str(&format!(
                "\nStep {} Command: {}\nResult:\n{}\n",
                step.index, step.command, step.result
            ));
        }
        match self.outcome {
            SessionOutcome::Finalized => {
                out.push('\n');
                out.push_str(self.final_answer.as_deref().unwrap_or_default());
            }
            SessionOutcome::TimedOut => {
                out.push('\n');
                out.push_str(TIME_LIMIT_NOTICE);
            }
            SessionOutcome::Searching => {}
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn memory_with(facts: &[Fact]) -> ResearchMemory {
        let mut memory = ResearchMemory::new();
        memory.merge_facts(facts.iter().cloned());
        memory
    }

    #[test]
    fn test_final_answer_without_facts() {
        let answer = compose_final_answer(&ResearchMemory::new());
        assert_eq!(
            answer,
            "\nComprehensive Verified Sources:\n\n\nFinal Conclusion: Insufficient verified information."
        );
    }

    #[test]
    fn test_final_answer_lists_three_distinct_sources() {
        let memory = memory_with(&[
            Fact::new("A", "S1", 2020),
            Fact::new("B", "S1", 2020),
            Fact::new("C", "S2", 2021),
            Fact::new("D", "S3", 2022),
            Fact::new("E", "S4", 2023),
        ]);
        let answer = compose_final_answer(&memory);

        let sources_block = answer
            .split("Comprehensive Verified Sources:\n")
            .nth(1)
            .and_then(|rest| rest.split("\n\nFinal Conclusion:").next())
            .unwrap();
        let lines: Vec<&str> = sources_block.lines().collect();
        assert_eq!(lines, vec!["S1 (2020)", "S2 (2021)", "S3 (2022)"]);
    }

    #[test]
    fn test_final_answer_conclusion_lists_every_fact() {
        let memory = memory_with(&[Fact::new("A", "S1", 2020), Fact::new("B", "S2", 2021)]);
        let answer = compose_final_answer(&memory);
        assert!(answer.ends_with(
            "Final Conclusion: Fact: A | Source: S1 (2020) ; Fact: B | Source: S2 (2021)"
        ));
    }

    #[test]
    fn test_distinct_sources_keeps_first_occurrence_order() {
        let facts = vec![
            Fact::new("x", "Nature", 2019),
            Fact::new("y", "Cell", 2020),
            Fact::new("z", "Nature", 2019),
            Fact::new("w", "Nature", 2021),
        ];
        assert_eq!(
            distinct_sources(&facts),
            vec![("Nature", 2019), ("Cell", 2020), ("Nature", 2021)]
        );
    }

    #[test]
    fn test_render_finalized_report() {
        let mut report = SessionReport::new("search X");
        report.steps.push(StepRecord {
            index: 1,
            command: "search X".into(),
            result: "result text".into(),
            route: RouteName::FinalizeAnswer,
            instruction: "ANSWER".into(),
        });
        report.outcome = SessionOutcome::Finalized;
        report.final_answer = Some("ANSWER".into());

        assert_eq!(
            report.render(),
            "Initial Command: search X\n\nStep 1 Command: search X\nResult:\nresult text\n\nANSWER"
        );
    }

    #[test]
    fn test_render_timed_out_report() {
        let mut report = SessionReport::new("search X");
        report.outcome = SessionOutcome::TimedOut;
        assert_eq!(
            report.render(),
            "Initial Command: search X\n\nResearch terminated due to time limit."
        );
    }

    #[test]
    fn test_outcome_terminal() {
        assert!(!SessionOutcome::Searching.is_terminal());
        assert!(SessionOutcome::Finalized.is_terminal());
        assert!(SessionOutcome::TimedOut.is_terminal());
    }

    #[test]
    fn test_report_serializes() {
        let report = SessionReport::new("q");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"], "searching");
        assert_eq!(json["initial_command"], "q");
        assert!(json["final_answer"].is_null());
    }
}
