//! JSON extraction utilities for parsing LLM responses.
//!
//! Models wrap JSON in markdown fences, prefix it with reasoning, or append
//! commentary. Extraction tries, in order:
//! 1. The whole (trimmed) content
//! 2. A ```json fenced block
//! 3. Any fenced block containing an object
//! 4. The largest balanced `{...}` span that parses
//!
//! # Example
//!
//! ```
//! use gapforge::utils::json_extraction::extract_json_object;
//!
//! let response = "Sure! {\"verdict\": \"solved\", \"confidence\": 0.9} Hope that helps.";
//! let json = extract_json_object(response).unwrap();
//! assert!(json.starts_with("{\"verdict\""));
//! ```

use regex::Regex;
use serde::de::DeserializeOwned;
use thiserror::Error;

const PREVIEW_CHARS: usize = 80;

/// Error type for JSON extraction failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum JsonExtractionError {
    #[error("No JSON object found in response. Content starts with: '{content_preview}'")]
    NotFound { content_preview: String },

    #[error("JSON object did not match the expected shape: {0}")]
    Invalid(String),
}

/// Index of the `}` closing the object that starts at the beginning of `s`.
///
/// String literals and escape sequences are skipped.
pub fn find_matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

fn is_json_object(candidate: &str) -> bool {
    matches!(
        serde_json::from_str::<serde_json::Value>(candidate),
        Ok(serde_json::Value::Object(_))
    )
}

fn object_in(block: &str) -> Option<String> {
    let start = block.find('{')?;
    let end = find_matching_brace(&block[start..])?;
    let candidate = &block[start..=start + end];
    is_json_object(candidate).then(|| candidate.to_string())
}

fn from_fenced_block(content: &str, pattern: &str) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    let found = re
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .find_map(|m| object_in(m.as_str()));
    found
}

fn largest_balanced_object(content: &str) -> Option<String> {
    content
        .char_indices()
        .filter(|&(_, c)| c == '{')
        .filter_map(|(start, _)| {
            let end = find_matching_brace(&content[start..])?;
            let candidate = &content[start..=start + end];
            is_json_object(candidate).then_some(candidate)
        })
        .max_by_key(|candidate| candidate.len())
        .map(str::to_string)
}

/// Extracts the JSON object an LLM response most likely intends as its answer.
pub fn extract_json_object(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.starts_with('{') && is_json_object(trimmed) {
        return Some(trimmed.to_string());
    }

    from_fenced_block(content, r"```json\s*\n?([\s\S]*?)\n?```")
        .or_else(|| from_fenced_block(content, r"```(?:\w+)?\s*\n?([\s\S]*?)\n?```"))
        .or_else(|| largest_balanced_object(content))
}

/// Extracts and deserializes a JSON object from an LLM response.
pub fn parse_json_response<T: DeserializeOwned>(content: &str) -> Result<T, JsonExtractionError> {
    let json = extract_json_object(content).ok_or_else(|| JsonExtractionError::NotFound {
        content_preview: content.trim().chars().take(PREVIEW_CHARS).collect(),
    })?;
    serde_json::from_str(&json).map_err(|e| JsonExtractionError::Invalid(e.to_string()))
}
