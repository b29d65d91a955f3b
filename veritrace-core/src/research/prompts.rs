//! Default prompt templates and their rendering.
//!
//! Templates are Handlebars: `{{name}}` is replaced by the variable's value,
//! verbatim. Single braces (the JSON examples) are plain text. Wording is
//! configuration: every template here can be replaced through `[prompts]` in
//! the config file.

use crate::error::LlmError;
use handlebars::Handlebars;
use std::sync::LazyLock;

static ENGINE: LazyLock<Handlebars<'static>> = LazyLock::new(|| {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(false);
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars
});

/// Persona sent as the system message of every planning completion.
pub const SYSTEM_PROMPT: &str = "\
# Role: Senior Research Validator

## Core Principles
1. Strict validation: every key claim must be confirmed by at least two independent, reliable sources.
2. Contradictions: conflicting data triggers a third, independent check.
3. Credibility: prefer academic journals, then institutional websites, then Wikipedia, then news, then personal blogs.
4. Format: follow the requested output format exactly. Numbers carry no units or symbols; names are written in full.

## Workflow
1. Initial search: gather a basic information framework.
2. Validation: cross-check key data points between sources, prefer studies from the last 3 years, and trace conclusions back to their evidence.
3. Final confirmation: only conclude once information is confirmed by two independent sources, free of major contradictions, and detailed enough for the original question.

## Output Format
Validation Conclusion: [verified/unverified]
Pending Items: [...]
Next Command: [next command]
or
FINAL ANSWER: [final answer in required format]

Only output FINAL ANSWER when all conditions are met.";

/// Placeholders: `{{browser_result}}`.
pub const VERIFY_TEMPLATE: &str = "\
## Browser Result
{{browser_result}}

## Validation Task
1. Score credibility (1-5).
2. Identify any missing information.
3. Detect any contradictions.
4. Evaluate timeliness (prefer results from the last 3 years).

Reply in the following JSON format:
{
  \"credibility_score\": int,
  \"missing_info\": [str],
  \"contradictions\": [str],
  \"needs_fresh_check\": bool,
  \"verification_summary\": str
}";

/// Placeholders: `{{text}}`.
pub const EXTRACT_FACTS_TEMPLATE: &str = "\
Extract all verifiable fact assertions from the following text. Return a JSON array where each element is formatted as:
{\"fact\": str, \"source\": str, \"year\": int}

Text:
{{text}}
";

/// Placeholders: `{{route_history}}`, `{{credibility_score}}`, `{{missing_info}}`,
/// `{{contradictions}}`, `{{verified_fact_count}}`.
pub const ROUTE_TEMPLATE: &str = "\
Current route history: {{route_history}}
Verified facts so far: {{verified_fact_count}}
Current verification details:
- Credibility Score: {{credibility_score}}
- Missing Info: {{missing_info}}
- Contradictions: {{contradictions}}

Based on the above, choose the best route from the following options:
1. supplemental_validation (if credibility < 4)
2. third_party_validation (if contradictions exist)
3. query_missing_info (if missing info is present)
4. continue_search (if more data is needed)
5. finalize_answer (if conditions are met: credibility >= 4, no contradictions, at least 2 verified facts)

Respond in the format: \"ROUTE: <option>\" with a brief reasoning.";

/// Placeholders: `{{credibility_score}}`, `{{missing_info}}`, `{{contradictions}}`,
/// `{{route}}`, `{{instruction}}`.
pub const NEXT_COMMAND_TEMPLATE: &str = "\
Current Verification Status:
Credibility Score: {{credibility_score}}
Missing Info: {{missing_info}}
Contradictions: {{contradictions}}

Chosen Route: {{route}}

Based on the above, the next command is:
{{instruction}}";

/// Placeholders: `{{task}}`, `{{history}}`, `{{page}}`, `{{steps_left}}`.
pub const BROWSER_STEP_TEMPLATE: &str = "\
You are operating a web browser to complete a research task.

## Task
{{task}}

## Actions so far
{{history}}

## Current page
{{page}}

You have {{steps_left}} step(s) left. Reply with exactly one action line:
SEARCH: <search query>
VISIT: <absolute url>
DONE: <a complete summary of what you found, naming sources and years>";

/// Placeholders: `{{task}}`, `{{notes}}`.
pub const BROWSER_SUMMARY_TEMPLATE: &str = "\
You browsed the web for the following task but ran out of steps.

## Task
{{task}}

## Pages visited
{{notes}}

Summarize everything relevant you found, naming sources and years.";

/// Render `template` with `vars`.
///
/// Variables the template does not name are ignored and names without a
/// variable render empty. Values are inserted as-is and never re-expanded.
pub fn render(template: &str, vars: &[(&str, &str)]) -> Result<String, LlmError> {
    let data: serde_json::Map<String, serde_json::Value> = vars
        .iter()
        .map(|(name, value)| (name.to_string(), serde_json::Value::from(*value)))
        .collect();
    ENGINE
        .render_template(template, &data)
        .map_err(|e| LlmError::PromptTemplate {
            message: e.to_string(),
        })
}

/// Check that `template` parses, without rendering it.
pub fn check_template(template: &str) -> Result<(), LlmError> {
    handlebars::Template::compile(template)
        .map(|_| ())
        .map_err(|e| LlmError::PromptTemplate {
            message: e.to_string(),
        })
}

/// Render a list the way prompts expect it: a JSON array of strings.
pub fn render_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}
