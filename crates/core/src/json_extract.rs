//! JSON-in-prose extraction for LLM responses.
//!
//! Models are instructed to answer with bare JSON but routinely wrap it in
//! prose or code fences anyway. The contract here is explicit: take the first
//! balanced `{...}` region of the text (string- and escape-aware), then parse
//! it against the expected shape. Anything else fails the attempt.

use serde::de::DeserializeOwned;

use crate::errors::CoreError;

/// Returns the first balanced brace-delimited region of `text`, or `None`
/// when no such region exists. Braces inside JSON strings do not count.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
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
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Extracts the first balanced JSON object from `text` and parses it as `T`.
/// Failures map to `CoreError::Provider` — malformed output is a transient
/// provider fault, retried at the stage level.
pub fn parse_json_object<T: DeserializeOwned>(text: &str) -> Result<T, CoreError> {
    let region = extract_json_object(text).ok_or_else(|| {
        CoreError::Provider("response contained no balanced JSON object".to_string())
    })?;
    serde_json::from_str(region)
        .map_err(|e| CoreError::Provider(format!("response JSON did not match expected shape: {e}")))
}
