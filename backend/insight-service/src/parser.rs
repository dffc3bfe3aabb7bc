//! Sanitation and parsing of generated insight text
//!
//! Generated text is untrusted. The only cleanup performed is removal of a
//! surrounding markdown code fence; everything else must already be valid
//! JSON matching `InsightPayload`.

use tracing::warn;

use crate::error::{InsightError, Result};
use crate::models::InsightPayload;

const FENCE: &str = "```";

/// Remove surrounding markdown fences.
///
/// Each pass removes one leading fence (optionally tagged `json`) and one
/// trailing fence; passes repeat until the text stops changing, so the
/// result is a fixed point and stripping it again is a no-op.
pub fn strip_code_fences(text: &str) -> &str {
    let mut body = strip_fence_pair(text);
    loop {
        let next = strip_fence_pair(body);
        if next.len() == body.len() {
            return body;
        }
        body = next;
    }
}

fn strip_fence_pair(text: &str) -> &str {
    let mut body = text.trim();

    if let Some(rest) = body.strip_prefix(FENCE) {
        body = match rest.find('\n') {
            // Anything on the fence line is the language tag
            Some(newline) if is_language_tag(&rest[..newline]) => &rest[newline + 1..],
            Some(_) => rest,
            None => strip_inline_tag(rest),
        };
    }

    body = body.trim();
    if let Some(rest) = body.strip_suffix(FENCE) {
        body = rest;
    }

    body.trim()
}

fn is_language_tag(line: &str) -> bool {
    let tag = line.trim();
    tag.is_empty() || tag.eq_ignore_ascii_case("json")
}

/// Single-line fenced output such as "```json {...}```"
fn strip_inline_tag(rest: &str) -> &str {
    let trimmed = rest.trim_start();
    match trimmed.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => &trimmed[4..],
        _ => trimmed,
    }
}

/// Parse and validate generated text for `industry`
pub fn parse_insight_payload(industry: &str, raw: &str) -> Result<InsightPayload> {
    let cleaned = strip_code_fences(raw);
    if cleaned.is_empty() {
        return Err(InsightError::malformed(industry, "empty response"));
    }

    let payload: InsightPayload = serde_json::from_str(cleaned).map_err(|e| {
        warn!(industry = %industry, error = %e, "Generated insights are not valid JSON");
        InsightError::malformed(industry, e.to_string())
    })?;

    payload.validate().map_err(|reason| {
        warn!(industry = %industry, reason = %reason, "Generated insights failed validation");
        InsightError::malformed(industry, reason)
    })?;

    Ok(payload)
}
