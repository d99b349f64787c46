//! Helpers for digging structured JSON out of model replies.
//!
//! Models asked for strict JSON still routinely wrap it in Markdown code
//! fences or chat filler. The stages parse replies into typed structures
//! immediately at this boundary; anything unparseable is rejected there
//! rather than propagated downstream.

/// Extract the JSON payload from a model reply.
///
/// Strips a surrounding ``` / ```json fence if present, otherwise falls back
/// to the outermost `{...}` or `[...]` span. Returns the trimmed original
/// when neither applies (the caller's serde parse will produce the error).
pub fn extract_json(reply: &str) -> &str {
    let trimmed = reply.trim();

    if let Some(inner) = strip_fence(trimmed) {
        return inner;
    }

    // Fall back to the outermost bracket span.
    let open = trimmed.find(['{', '[']);
    if let Some(start) = open {
        let close = match &trimmed[start..start + 1] {
            "{" => trimmed.rfind('}'),
            _ => trimmed.rfind(']'),
        };
        if let Some(end) = close
            && end > start
        {
            return trimmed[start..=end].trim();
        }
    }

    trimmed
}

fn strip_fence(s: &str) -> Option<&str> {
    let rest = s.strip_prefix("```")?;
    // Drop an optional language tag on the fence line.
    let body_start = rest.find('\n')?;
    let body = &rest[body_start + 1..];
    let inner = body.strip_suffix("```").or_else(|| {
        body.rfind("\n```")
            .map(|idx| &body[..idx])
    })?;
    Some(inner.trim())
}
