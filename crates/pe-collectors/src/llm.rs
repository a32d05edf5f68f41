//! The LLM seam used by the bio extractor, valuation estimator,
//! press-release, and news collectors (§4.4-§4.6, §6 external interfaces).
//!
//! `LlmClient` is injected at construction, never looked up from global
//! state, so a collector under test can be given a canned client. A cost
//! observer is passed to the *client*, not threaded through every call
//! site, which keeps the persister and the LLM client from needing to know
//! about each other.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use pe_core::error::{AppError, AppResult};
use pe_core::model::Source;

#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub json_mode: bool,
    /// Which collector this call is for, so the client's `CostObserver`
    /// can attribute the spend without the collector reaching into billing
    /// state itself.
    pub purpose: Source,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> AppResult<LlmResponse>;
}

/// Observes token usage as it happens, independent of what the caller does
/// with the response. Passed to the concrete client at construction so the
/// client never has to import the persister to report spend back (§9).
pub trait CostObserver: Send + Sync {
    fn record_usage(&self, source: Source, prompt_tokens: u32, completion_tokens: u32);
}

pub struct NoopCostObserver;

impl CostObserver for NoopCostObserver {
    fn record_usage(&self, _source: Source, _prompt_tokens: u32, _completion_tokens: u32) {}
}

/// Running per-`Source` token totals, held behind a mutex since `CostObserver`
/// is called from whatever collector happens to be running concurrently. A
/// production deployment could swap this for one that writes to a billing
/// table without touching collector code; this one just accumulates.
#[derive(Default)]
pub struct InMemoryCostObserver {
    totals: std::sync::Mutex<std::collections::HashMap<Source, TokenTotals>>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokenTotals {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl InMemoryCostObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn totals_for(&self, source: Source) -> TokenTotals {
        self.totals.lock().unwrap().get(&source).copied().unwrap_or_default()
    }
}

impl CostObserver for InMemoryCostObserver {
    fn record_usage(&self, source: Source, prompt_tokens: u32, completion_tokens: u32) {
        let mut totals = self.totals.lock().unwrap();
        let entry = totals.entry(source).or_default();
        entry.prompt_tokens += u64::from(prompt_tokens);
        entry.completion_tokens += u64::from(completion_tokens);
    }
}

/// Parses `text` as a JSON array of `T`, attempting a repair pass if direct
/// parsing fails (§4.4 step 5, §8.2 L3). LLM responses are occasionally
/// truncated mid-object or wrapped in a markdown code fence; the repair
/// strips fences, then truncates to the last complete `}` before the final
/// (possibly broken) element and closes the array.
pub fn parse_json_array_with_repair<T: DeserializeOwned>(text: &str) -> AppResult<Vec<T>> {
    let stripped = strip_code_fence(text);

    if let Ok(parsed) = serde_json::from_str::<Vec<T>>(stripped) {
        return Ok(parsed);
    }

    let repaired = repair_truncated_json_array(stripped);
    serde_json::from_str::<Vec<T>>(&repaired)
        .map_err(|e| AppError::parse(format!("LLM response not valid JSON even after repair: {e}")))
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        rest.trim().trim_end_matches("```").trim()
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest.trim().trim_end_matches("```").trim()
    } else {
        trimmed
    }
}

/// Finds the last top-level `}` that closes a balanced object starting
/// after the opening `[`, truncates there, and appends `]`. If the array
/// was already closed cleanly, this is a no-op modulo whitespace.
fn repair_truncated_json_array(text: &str) -> String {
    let start = match text.find('[') {
        Some(idx) => idx,
        None => return text.to_string(),
    };

    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    let mut last_complete_object_end: Option<usize> = None;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        let c = b as char;
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    last_complete_object_end = Some(i);
                }
            }
            _ => {}
        }
    }

    match last_complete_object_end {
        Some(end) => format!("{}]", &text[start..=end]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        name: String,
    }

    #[test]
    fn parses_clean_array() {
        let items: Vec<Item> = parse_json_array_with_repair(r#"[{"name":"a"},{"name":"b"}]"#).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn strips_markdown_fence() {
        let text = "```json\n[{\"name\":\"a\"}]\n```";
        let items: Vec<Item> = parse_json_array_with_repair(text).unwrap();
        assert_eq!(items, vec![Item { name: "a".to_string() }]);
    }

    #[test]
    fn repairs_truncated_trailing_element() {
        let text = r#"[{"name":"a"},{"name":"b"},{"name":"c"#;
        let items: Vec<Item> = parse_json_array_with_repair(text).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn in_memory_cost_observer_accumulates_per_source() {
        let observer = InMemoryCostObserver::new();
        observer.record_usage(Source::BioExtractor, 100, 20);
        observer.record_usage(Source::BioExtractor, 50, 10);
        observer.record_usage(Source::NewsApi, 5, 5);

        let bio_totals = observer.totals_for(Source::BioExtractor);
        assert_eq!(bio_totals.prompt_tokens, 150);
        assert_eq!(bio_totals.completion_tokens, 30);
        assert_eq!(observer.totals_for(Source::NewsApi).prompt_tokens, 5);
        assert_eq!(observer.totals_for(Source::PressRelease).prompt_tokens, 0);
    }
}
