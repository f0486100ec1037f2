//! Parse model output into typed selections.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

/// One entry of a model's batch answer, or a single-item answer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AiSelection {
    #[serde(default)]
    pub full_name: String,
    #[serde(default, rename = "matchScore", deserialize_with = "lenient_score")]
    pub match_score: Option<f64>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default, rename = "whyMatches")]
    pub why_matches: Vec<String>,
    #[serde(default, rename = "firstSteps")]
    pub first_steps: Vec<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
}

/// Accept numbers and numeric strings; anything else is absent.
fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').parse().ok(),
        _ => None,
    })
}

/// Remove a surrounding markdown code fence, with or without a language tag.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
    body.trim_end().trim_end_matches("```").trim()
}

fn outermost(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Entries of the outermost JSON array. Entries that do not fit the schema
/// are skipped.
pub fn parse_selections(text: &str) -> Result<Vec<AiSelection>> {
    let body = strip_code_fences(text);
    let array = outermost(body, '[', ']').ok_or_else(|| anyhow!("no JSON array in response"))?;
    let values: Vec<Value> = serde_json::from_str(array)?;
    let total = values.len();
    let selections: Vec<AiSelection> = values
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect();
    if selections.len() < total {
        debug!(
            skipped = total - selections.len(),
            "skipped malformed selection entries"
        );
    }
    Ok(selections)
}

/// The outermost JSON object of a single-item answer.
pub fn parse_explanation(text: &str) -> Result<AiSelection> {
    let body = strip_code_fences(text);
    let object = outermost(body, '{', '}').ok_or_else(|| anyhow!("no JSON object in response"))?;
    Ok(serde_json::from_str(object)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences_variants() {
        assert_eq!(strip_code_fences("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  [2]  "), "[2]");
        assert_eq!(strip_code_fences("```json[3]```"), "[3]");
    }

    #[test]
    fn test_parse_selections_with_prose_around_array() {
        let text = r#"Here you go:
```json
[
  {"full_name": "a/b", "matchScore": 91, "summary": "Great", "whyMatches": ["Rust"],
   "firstSteps": ["Clone"], "difficulty": "Easy"},
  {"full_name": "c/d", "matchScore": "80"},
  "garbage",
  {"full_name": "e/f", "whyMatches": "not a list"}
]
```
Hope this helps!"#;
        let selections = parse_selections(text).unwrap();
        assert_eq!(selections.len(), 2);
        assert_eq!(selections[0].full_name, "a/b");
        assert_eq!(selections[0].match_score, Some(91.0));
        assert_eq!(selections[0].difficulty.as_deref(), Some("Easy"));
        assert_eq!(selections[1].match_score, Some(80.0));
        assert!(selections[1].why_matches.is_empty());
    }

    #[test]
    fn test_parse_selections_rejects_non_json() {
        assert!(parse_selections("I could not find anything").is_err());
        assert!(parse_selections("[not json]").is_err());
    }

    #[test]
    fn test_empty_array_is_ok_and_empty() {
        assert!(parse_selections("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_explanation_object() {
        let e = parse_explanation(
            "```json\n{\"summary\": \"Fits your CLI work\", \"matchScore\": 70.5, \"difficulty\": \"Hard\"}\n```",
        )
        .unwrap();
        assert_eq!(e.summary.as_deref(), Some("Fits your CLI work"));
        assert_eq!(e.match_score, Some(70.5));
        assert!(e.full_name.is_empty());
    }
}
