//! Extraction of a single JSON value from free-form model text.
//!
//! Model replies are untrusted and semi-structured: the JSON the caller
//! asked for may arrive bare, wrapped in a fenced code block, or buried
//! in prose. A fenced block, when present, takes precedence over
//! anything else in the reply.

use crate::{Error, Result};

/// Pull the first syntactically complete JSON value out of `text`.
///
/// Priority order: the interior of a triple-backtick fence (optionally
/// tagged `json`) if one exists, otherwise a balanced-bracket scan from
/// the first `{` or `[`. Brace and bracket characters inside string
/// literals do not affect nesting depth.
pub fn extract_json(text: &str) -> Result<serde_json::Value> {
    if let Some(interior) = fenced_block(text) {
        let trimmed = interior.trim();
        if let Ok(value) = serde_json::from_str(trimmed) {
            return Ok(value);
        }
        // The fence keeps precedence: scan inside it, never the prose
        // around it.
        return scan_balanced(trimmed)
            .ok_or_else(|| Error::Parse("fenced block does not contain valid JSON".to_string()));
    }

    scan_balanced(text)
        .ok_or_else(|| Error::Parse("no balanced JSON value in response text".to_string()))
}

/// Interior of the first triple-backtick fence, with an optional `json`
/// language tag stripped.
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let rest = &text[open + 3..];
    let close = rest.find("```")?;
    let interior = &rest[..close];
    Some(interior.strip_prefix("json").unwrap_or(interior))
}

/// Walk candidate start positions until one parses.
fn scan_balanced(text: &str) -> Option<serde_json::Value> {
    let mut from = 0;
    while let Some(offset) = text[from..].find(['{', '[']) {
        let start = from + offset;
        if let Some(end) = balanced_end(text.as_bytes(), start) {
            if let Ok(value) = serde_json::from_str(&text[start..=end]) {
                return Some(value);
            }
        }
        from = start + 1;
    }
    None
}

/// Index of the byte that returns nesting depth to zero, starting from
/// an opener at `start`. String literals are skipped wholesale,
/// including escaped quotes and escaped backslashes.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    const NESTED: &str = r#"{"plan": {"steps": ["a", "b"]}, "note": "brace } inside", "done": true}"#;

    #[test]
    fn bare_object() {
        let value = extract_json(NESTED).unwrap();
        assert_eq!(value["note"], "brace } inside");
    }

    #[test]
    fn fenced_block_with_tag() {
        let text = format!("Here is the result:\n```json\n{NESTED}\n```\nLet me know.");
        assert_eq!(extract_json(&text).unwrap(), extract_json(NESTED).unwrap());
    }

    #[test]
    fn fenced_block_without_tag() {
        let text = format!("```\n{NESTED}\n```");
        assert_eq!(extract_json(&text).unwrap(), extract_json(NESTED).unwrap());
    }

    #[test]
    fn surrounded_by_prose() {
        let text = format!("Sure! The answer is {NESTED} and that should be all.");
        assert_eq!(extract_json(&text).unwrap(), extract_json(NESTED).unwrap());
    }

    #[test]
    fn fence_takes_precedence_over_prose_json() {
        let text = format!("{{\"decoy\": 1}}\n```json\n{NESTED}\n```");
        let value = extract_json(&text).unwrap();
        assert_eq!(value["done"], json!(true));
    }

    #[test]
    fn bare_array() {
        let value = extract_json("prefix [1, 2, {\"k\": \"]\"}] suffix").unwrap();
        assert_eq!(value, json!([1, 2, {"k": "]"}]));
    }

    #[test]
    fn escaped_quotes_inside_strings() {
        let text = r#"reply: {"quote": "she said \"hi\\\" there", "n": 1}"#;
        let value = extract_json(text).unwrap();
        assert_eq!(value["n"], json!(1));
    }

    #[test]
    fn unbalanced_candidate_is_skipped() {
        let text = "broken { \"a\": 1 then later {\"b\": 2}";
        let value = extract_json(text).unwrap();
        assert_eq!(value, json!({"b": 2}));
    }

    #[test]
    fn no_json_fails() {
        let err = extract_json("I could not produce a structured answer.").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn empty_text_fails() {
        assert!(extract_json("").is_err());
    }
}
