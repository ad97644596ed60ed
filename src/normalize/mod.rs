//! Free-text normalization for raw clinical fields.
//!
//! Source rows arrive with loosely typed columns (blank strings, numbers
//! stored as text). Everything here degrades to "absent" instead of
//! failing the caller.

#[cfg(test)]
mod tests;

/// Truncation marker appended when a field is cut.
const TRUNCATION_MARKER: &str = "...";

/// Return the trimmed string, or `None` when the value is missing or
/// blank after trimming.
#[inline]
pub fn clean_string(value: Option<&str>) -> Option<String> {
    let normalized = value?.trim();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized.to_string())
    }
}

/// Parse a numeric or numeric-string value. Non-finite results are
/// rejected.
#[inline]
pub fn coerce_number(value: Option<&str>) -> Option<f64> {
    let parsed: f64 = clean_string(value)?.parse().ok()?;
    parsed.is_finite().then_some(parsed)
}

/// Cap `text` to at most `max_chars` characters, appending a truncation
/// marker when cut. The marker's own length is reserved inside the cap.
#[inline]
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(TRUNCATION_MARKER.len());
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}
