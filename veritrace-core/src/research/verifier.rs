//! Verifier — credibility scoring and fact extraction for browsing results.

use super::memory::Fact;
use super::parse;
use super::prompts;
use crate::brain::Brain;
use crate::error::LlmError;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

/// Prefix of the summary carried by a degraded record.
pub const PARSE_FAILURE_PREFIX: &str = "Failed to parse JSON. Response: ";

/// Structured judgment of one browsing result.
///
/// Fields missing from the model's JSON fall back to their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    #[serde(default, deserialize_with = "lenient_score")]
    pub credibility_score: Option<u8>,
    #[serde(default)]
    pub missing_info: Vec<String>,
    #[serde(default)]
    pub contradictions: Vec<String>,
    #[serde(default)]
    pub needs_fresh_check: bool,
    #[serde(default)]
    pub verification_summary: String,
}

/// Read a score given as an integer, a fractional number (rounded) or a
/// numeric string. Anything else, including values outside `0..=255`, reads
/// as no score.
fn lenient_score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u8>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let number = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(number
        .map(f64::round)
        .filter(|n| (0.0..=255.0).contains(n))
        .map(|n| n as u8))
}

impl VerificationRecord {
    /// The record used when the model's reply could not be parsed.
    pub fn degraded(raw_reply: &str) -> Self {
        Self {
            verification_summary: format!("{PARSE_FAILURE_PREFIX}{raw_reply}"),
            ..Self::default()
        }
    }

    /// Whether this record came from an unparseable reply.
    pub fn is_degraded(&self) -> bool {
        self.verification_summary.starts_with(PARSE_FAILURE_PREFIX)
    }

    /// Credibility for display: the score, or `N/A` when absent.
    pub fn credibility_label(&self) -> String {
        self.credibility_score
            .map(|s| s.to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }
}

/// Scores browsing results and extracts facts through the completion service.
pub struct Verifier<'a> {
    brain: &'a Brain,
    verify_template: &'a str,
    extract_template: &'a str,
}

impl<'a> Verifier<'a> {
    pub fn new(brain: &'a Brain, verify_template: &'a str, extract_template: &'a str) -> Self {
        Self {
            brain,
            verify_template,
            extract_template,
        }
    }

    /// Score a browsing result.
    ///
    /// An unparseable reply yields [`VerificationRecord::degraded`]; only a
    /// failing completion service is an error.
    pub async fn verify(&self, browser_result: &str) -> Result<VerificationRecord, LlmError> {
        let prompt = prompts::render(self.verify_template, &[("browser_result", browser_result)])?;
        let reply = self.brain.predict(&prompt).await?;

        match parse::parse_json_object::<VerificationRecord>(&reply) {
            Some(record) => {
                debug!(
                    credibility = %record.credibility_label(),
                    missing = record.missing_info.len(),
                    contradictions = record.contradictions.len(),
                    "Verification parsed"
                );
                Ok(record)
            }
            None => {
                warn!(reply_chars = reply.len(), "Verification reply was not valid JSON; degrading");
                Ok(VerificationRecord::degraded(&reply))
            }
        }
    }

    /// Extract verifiable facts from `text`.
    ///
    /// Extraction is best-effort: an unparseable reply yields no facts.
    pub async fn extract_facts(&self, text: &str) -> Result<Vec<Fact>, LlmError> {
        let prompt = prompts::render(self.extract_template, &[("text", text)])?;
        let reply = self.brain.predict(&prompt).await?;

        Ok(parse::parse_json_array::<Fact>(&reply).unwrap_or_else(|| {
            debug!("Fact extraction reply was not a JSON fact array; ignoring");
            Vec::new()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::MockLlmProvider;
    use std::sync::Arc;

    fn brain_with(replies: &[&str]) -> (Brain, Arc<MockLlmProvider>) {
        let provider = Arc::new(MockLlmProvider::with_responses(replies.iter().copied()));
        (Brain::new(provider.clone(), ""), provider)
    }

    fn verifier(brain: &Brain) -> Verifier<'_> {
        Verifier::new(
            brain,
            prompts::VERIFY_TEMPLATE,
            prompts::EXTRACT_FACTS_TEMPLATE,
        )
    }

    #[tokio::test]
    async fn test_verify_parses_full_record() {
        let (brain, provider) = brain_with(&[r#"{
            "credibility_score": 4,
            "missing_info": ["publication year"],
            "contradictions": [],
            "needs_fresh_check": true,
            "verification_summary": "Mostly solid"
        }"#]);
        let record = verifier(&brain).verify("some page").await.unwrap();

        assert_eq!(record.credibility_score, Some(4));
        assert_eq!(record.missing_info, vec!["publication year"]);
        assert!(record.contradictions.is_empty());
        assert!(record.needs_fresh_check);
        assert_eq!(record.verification_summary, "Mostly solid");
        assert!(!record.is_degraded());
        assert!(provider.prompts()[0].contains("some page"));
    }

    #[tokio::test]
    async fn test_verify_defaults_missing_fields() {
        let (brain, _) = brain_with(&["{\"credibility_score\": 2}"]);
        let record = verifier(&brain).verify("x").await.unwrap();
        assert_eq!(record.credibility_score, Some(2));
        assert!(record.missing_info.is_empty());
        assert!(!record.needs_fresh_check);
        assert_eq!(record.verification_summary, "");
    }

    #[tokio::test]
    async fn test_verify_degrades_on_invalid_reply() {
        let (brain, _) = brain_with(&["The page looks trustworthy, score 5."]);
        let record = verifier(&brain).verify("x").await.unwrap();

        assert!(record.is_degraded());
        assert_eq!(record.credibility_score, None);
        assert!(
            record
                .verification_summary
                .contains("The page looks trustworthy, score 5.")
        );
        assert!(record.missing_info.is_empty());
        assert!(record.contradictions.is_empty());
        assert_eq!(record.credibility_label(), "N/A");
    }

    #[tokio::test]
    async fn test_verify_degrades_on_mistyped_fields() {
        let (brain, _) = brain_with(&["{\"missing_info\": \"dates\"}"]);
        let record = verifier(&brain).verify("x").await.unwrap();
        assert!(record.is_degraded());
    }

    #[tokio::test]
    async fn test_verify_reads_fractional_score_and_keeps_other_fields() {
        let (brain, _) = brain_with(&[
            r#"{"credibility_score": 4.5, "contradictions": ["counts differ"]}"#,
            r#"{"credibility_score": "3", "missing_info": ["year"]}"#,
            r#"{"credibility_score": "high", "contradictions": ["two dates"]}"#,
        ]);
        let verifier = verifier(&brain);

        let record = verifier.verify("x").await.unwrap();
        assert!(!record.is_degraded());
        assert_eq!(record.credibility_score, Some(5));
        assert_eq!(record.contradictions, vec!["counts differ".to_string()]);

        let record = verifier.verify("x").await.unwrap();
        assert_eq!(record.credibility_score, Some(3));
        assert_eq!(record.missing_info, vec!["year".to_string()]);

        let record = verifier.verify("x").await.unwrap();
        assert!(!record.is_degraded());
        assert_eq!(record.credibility_score, None);
        assert_eq!(record.contradictions, vec!["two dates".to_string()]);
    }

    #[tokio::test]
    async fn test_verify_propagates_service_failure() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_error(LlmError::Connection {
            message: "offline".into(),
        });
        let brain = Brain::new(provider, "");
        let err = verifier(&brain).verify("x").await.unwrap_err();
        assert!(matches!(err, LlmError::Connection { .. }));
    }

    #[tokio::test]
    async fn test_extract_facts_parses_array() {
        let (brain, provider) = brain_with(&[r#"[
            {"fact": "Hafnia alvei colonizes the gut", "source": "Nature", "year": 2020},
            {"fact": "Studied in mice", "source": "PubMed", "year": 2021}
        ]"#]);
        let facts = verifier(&brain).extract_facts("text body").await.unwrap();
        assert_eq!(
            facts,
            vec![
                Fact::new("Hafnia alvei colonizes the gut", "Nature", 2020),
                Fact::new("Studied in mice", "PubMed", 2021),
            ]
        );
        assert!(provider.prompts()[0].contains("text body"));
    }

    #[tokio::test]
    async fn test_extract_facts_empty_on_invalid_reply() {
        let (brain, _) = brain_with(&["No facts found, sorry."]);
        let facts = verifier(&brain).extract_facts("x").await.unwrap();
        assert!(facts.is_empty());
    }

    #[tokio::test]
    async fn test_extract_facts_empty_on_malformed_element() {
        let (brain, _) = brain_with(&[r#"[{"fact": "A", "source": "S"}]"#]);
        let facts = verifier(&brain).extract_facts("x").await.unwrap();
        assert!(facts.is_empty());
    }

    #[test]
    fn test_degraded_record_shape() {
        let record = VerificationRecord::degraded("raw");
        assert_eq!(record.verification_summary, "Failed to parse JSON. Response: raw");
        assert_eq!(record.credibility_score, None);
    }
}
