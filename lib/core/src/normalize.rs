//! Text normalization shared by matching, grouping and keyword comparison.

/// Lowercase `text` and drop everything outside `[a-z0-9\s]`.
///
/// Total and idempotent: `normalize(&normalize(s)) == normalize(s)`.
pub fn normalize(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace())
        .collect()
}

/// Parse a display price such as `"₹1,299.00"` into a number.
///
/// Every character except ASCII digits and `.` is stripped first. Parsing
/// stops at a second decimal point, so `"1.2.3"` yields `1.2`. Returns `None`
/// when nothing numeric is left.
pub fn parse_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let end = cleaned
        .match_indices('.')
        .nth(1)
        .map(|(idx, _)| idx)
        .unwrap_or(cleaned.len());

    cleaned[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}
