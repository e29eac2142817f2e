use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::{Result, UpgradeError};
use crate::manifest::one_or_many;

/// Parsed completion output. Never persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpgradeResult {
    #[serde(alias = "updated_code")]
    pub updated_code: String,
    pub summary: String,
    #[serde(alias = "next_steps", deserialize_with = "one_or_many")]
    pub next_steps: Vec<String>,
}

/// Parses completion text, first as a bare JSON object and then from any
/// triple-backtick fenced block it contains.
pub fn parse_response(raw: &str) -> Result<UpgradeResult> {
    let strict_error = match parse_strict(raw) {
        Ok(result) => return validate_result(result, raw),
        Err(err) => err,
    };

    let blocks = extract_fenced_blocks(raw);
    if blocks.is_empty() {
        return Err(UpgradeError::malformed(
            format!("not a JSON object and no fenced block found: {strict_error}"),
            raw,
        ));
    }

    let mut last_error = None;
    for block in blocks {
        match parse_strict(block) {
            Ok(result) => return validate_result(result, raw),
            Err(err) => last_error = Some(err),
        }
    }

    let detail = last_error
        .map(|err| err.to_string())
        .unwrap_or_else(|| strict_error.to_string());
    Err(UpgradeError::malformed(
        format!("no fenced block held a valid upgrade object: {detail}"),
        raw,
    ))
}

/// Direct structured parse of the whole text.
pub fn parse_strict(text: &str) -> serde_json::Result<UpgradeResult> {
    serde_json::from_str(text.trim())
}

/// Inner contents of the fenced blocks in `text`, in the order they should be
/// tried: each shortest block first, then the span from the first opening
/// fence to the last closing fence (covers code that itself contains fences).
pub fn extract_fenced_blocks(text: &str) -> Vec<&str> {
    let mut blocks: Vec<&str> = shortest_fence_pattern()
        .captures_iter(text)
        .filter_map(|captures| captures.get(1))
        .map(|inner| inner.as_str().trim())
        .filter(|inner| !inner.is_empty())
        .collect();

    if let Some(widest) = widest_fence_pattern()
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|inner| inner.as_str().trim())
    {
        if !widest.is_empty() && !blocks.contains(&widest) {
            blocks.push(widest);
        }
    }

    blocks
}

fn validate_result(result: UpgradeResult, raw: &str) -> Result<UpgradeResult> {
    if result.updated_code.trim().is_empty() {
        return Err(UpgradeError::malformed("updatedCode is empty", raw));
    }
    Ok(result)
}

fn shortest_fence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)```[ \t]*(?i:json)?[ \t]*\r?\n?(.*?)```")
            .expect("fenced block pattern must compile")
    })
}

fn widest_fence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)```[ \t]*(?i:json)?[ \t]*\r?\n?(.*)```")
            .expect("fenced block pattern must compile")
    })
}
