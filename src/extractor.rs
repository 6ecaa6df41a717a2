use crate::llm::CompletionModel;
use crate::models::{Candidate, SeenSet};
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Below this many characters the page is assumed to be a block page or a failed render
pub const DEFAULT_MIN_PAGE_CHARS: usize = 500;
/// Context budget for the page excerpt sent to the model
pub const DEFAULT_MAX_PAGE_CHARS: usize = 25_000;

/// Turns rendered listing pages into new, unseen candidates via an LLM.
pub struct Extractor {
    model: Arc<dyn CompletionModel>,
    min_page_chars: usize,
    max_page_chars: usize,
}

impl Extractor {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self {
            model,
            min_page_chars: DEFAULT_MIN_PAGE_CHARS,
            max_page_chars: DEFAULT_MAX_PAGE_CHARS,
        }
    }

    pub fn with_limits(mut self, min_page_chars: usize, max_page_chars: usize) -> Self {
        self.min_page_chars = min_page_chars;
        self.max_page_chars = max_page_chars;
        self
    }

    /// Extract listings matching `criteria` that are not in `seen`.
    ///
    /// Short pages and unparseable model output both yield an empty list.
    /// Only the model call itself can fail.
    pub async fn extract(
        &self,
        page: &str,
        criteria: &str,
        seen: &SeenSet,
    ) -> Result<Vec<Candidate>> {
        let page_chars = page.chars().count();
        if page_chars < self.min_page_chars {
            info!(
                "Page has only {} characters (need {}), skipping analysis",
                page_chars, self.min_page_chars
            );
            return Ok(Vec::new());
        }

        let excerpt = truncate_chars(page, self.max_page_chars);
        if excerpt.len() < page.len() {
            debug!(
                "Truncated page from {} to {} characters",
                page_chars, self.max_page_chars
            );
        }

        let prompt = build_prompt(excerpt, criteria, seen);
        info!("Analyzing {} characters with the model...", excerpt.chars().count());

        let raw = self
            .model
            .complete(&prompt)
            .await
            .context("LLM completion failed")?;

        let parsed = parse_candidates(&raw);
        let candidates = retain_unseen(parsed, seen);
        info!("Model proposed {} new candidate(s)", candidates.len());

        Ok(candidates)
    }
}

pub fn build_prompt(page: &str, criteria: &str, seen: &SeenSet) -> String {
    let seen_json = serde_json::to_string(seen.as_slice()).unwrap_or_else(|_| "[]".to_string());

    format!(
        r#"You are a rental listing assistant.
Below is the markdown rendering of a property search results page.

--- PAGE START ---
{page}
--- PAGE END ---

Task:
1. Find every listing on the page that matches: {criteria}
2. Skip any listing whose URL appears in this list of already reported URLs: {seen_json}
3. Skip listings marked as unavailable, sold, rented or taken.
4. Use absolute URLs (starting with http:// or https://) for each listing.

Answer with a JSON array only, no prose and no code fences:
[{{"title": "...", "price": "...", "url": "...", "reason": "why it matches"}}]
If nothing new matches, answer with []."#
    )
}

/// Remove a markdown code fence (```` ```json ```` ... ```` ``` ````) around the payload.
pub fn strip_code_fences(raw: &str) -> &str {
    let text = raw.trim();
    let Some(open) = text.find("```") else {
        return text;
    };

    // Skip the info string, e.g. `json`
    let body = text[open + 3..].trim_start_matches(|c: char| c.is_ascii_alphabetic());
    let body = match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    };
    body.trim()
}

/// Parse a model reply into candidates.
///
/// Non-JSON or non-array replies are logged with the raw text and produce no
/// candidates. Array elements of the wrong shape are dropped individually.
pub fn parse_candidates(raw: &str) -> Vec<Candidate> {
    let cleaned = strip_code_fences(raw);

    let items = match serde_json::from_str::<Value>(cleaned) {
        Ok(Value::Array(items)) => items,
        Ok(_) => {
            warn!(raw = %raw, "LLM returned JSON that is not an array");
            return Vec::new();
        }
        Err(e) => {
            warn!(raw = %raw, "LLM did not return valid JSON: {}", e);
            return Vec::new();
        }
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Candidate>(item) {
            Ok(candidate) => Some(candidate),
            Err(e) => {
                debug!("Dropping malformed candidate: {}", e);
                None
            }
        })
        .collect()
}

/// The prompt only asks the model to skip seen URLs; this enforces it.
fn retain_unseen(candidates: Vec<Candidate>, seen: &SeenSet) -> Vec<Candidate> {
    let mut emitted = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| {
            if seen.contains(&c.url) {
                debug!(url = %c.url, "Model returned an already seen listing");
                return false;
            }
            emitted.insert(c.url.clone())
        })
        .collect()
}

fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{page_of_len as page, ScriptedModel};

    const LISTING_42: &str = r#"[{"title":"Cozy 2BHK","price":"32,000","url":"https://example.test/listing/42","reason":"matches budget"}]"#;

    #[test]
    fn fenced_reply_parses_like_inner_array() {
        let fenced = format!("```json\n{}\n```", LISTING_42);
        assert_eq!(parse_candidates(&fenced), parse_candidates(LISTING_42));
        assert_eq!(parse_candidates(&fenced).len(), 1);

        let bare_fence = format!("```\n{}\n```", LISTING_42);
        assert_eq!(parse_candidates(&bare_fence).len(), 1);

        let with_preamble = format!("Here you go:\n```json\n{}\n```\nGood luck!", LISTING_42);
        assert_eq!(parse_candidates(&with_preamble).len(), 1);
    }

    #[test]
    fn strip_code_fences_leaves_plain_payload() {
        assert_eq!(strip_code_fences("  []  "), "[]");
        assert_eq!(strip_code_fences("```json[]```"), "[]");
    }

    #[test]
    fn prose_reply_yields_nothing() {
        assert!(parse_candidates("I could not find any matching flats, sorry.").is_empty());
    }

    #[test]
    fn non_array_reply_yields_nothing() {
        assert!(parse_candidates(r#"{"title":"Cozy 2BHK"}"#).is_empty());
    }

    #[test]
    fn malformed_elements_are_dropped_individually() {
        let raw = r#"[
            {"title":"Missing url","price":"1","reason":"r"},
            {"title":"Ok","price":15000,"url":"https://example.test/1","reason":"r"},
            "just a string"
        ]"#;
        let parsed = parse_candidates(raw);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].price, "15000");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn prompt_lists_seen_urls() {
        let seen = SeenSet::from(vec!["https://example.test/listing/1".to_string()]);
        let prompt = build_prompt("page", "2BHK under 45k", &seen);
        assert!(prompt.contains(r#"["https://example.test/listing/1"]"#));
        assert!(prompt.contains("2BHK under 45k"));
    }

    #[tokio::test]
    async fn short_page_skips_model() {
        let model = Arc::new(ScriptedModel::replying(LISTING_42));
        let extractor = Extractor::new(model.clone());

        let out = extractor
            .extract(&page(400), "2BHK", &SeenSet::new())
            .await
            .unwrap();

        assert!(out.is_empty());
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn long_page_is_truncated_before_prompting() {
        let model = Arc::new(ScriptedModel::replying("[]"));
        let extractor = Extractor::new(model.clone()).with_limits(10, 1_000);

        let text = format!("{}{}", page(1_000), "TAIL-MARKER");
        extractor.extract(&text, "2BHK", &SeenSet::new()).await.unwrap();

        let prompt = model.last_prompt().unwrap();
        assert!(!prompt.contains("TAIL-MARKER"));
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn seen_urls_are_filtered_even_if_model_returns_them() {
        let model = Arc::new(ScriptedModel::replying(LISTING_42));
        let extractor = Extractor::new(model.clone());
        let seen = SeenSet::from(vec!["https://example.test/listing/42".to_string()]);

        let out = extractor.extract(&page(12_000), "2BHK", &seen).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn duplicate_urls_in_one_reply_collapse() {
        let reply = r#"[
            {"title":"A","price":"1","url":"https://example.test/1","reason":"r"},
            {"title":"A again","price":"1","url":"https://example.test/1","reason":"r"}
        ]"#;
        let extractor = Extractor::new(Arc::new(ScriptedModel::replying(reply)));

        let out = extractor
            .extract(&page(600), "any", &SeenSet::new())
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "A");
    }

    #[tokio::test]
    async fn repeated_runs_are_idempotent() {
        let extractor = Extractor::new(Arc::new(ScriptedModel::replying(LISTING_42)));
        let seen = SeenSet::from(vec!["https://example.test/other".to_string()]);
        let text = page(5_000);

        let first = extractor.extract(&text, "2BHK", &seen).await.unwrap();
        let second = extractor.extract(&text, "2BHK", &seen).await.unwrap();

        assert_eq!(first, second);
        assert!(first.iter().all(|c| !seen.contains(&c.url)));
    }

    #[tokio::test]
    async fn model_failure_propagates() {
        let extractor = Extractor::new(Arc::new(ScriptedModel::failing("connection reset")));
        let result = extractor.extract(&page(600), "2BHK", &SeenSet::new()).await;
        assert!(result.is_err());
    }
}
