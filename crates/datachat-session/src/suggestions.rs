use once_cell::sync::Lazy;
use regex::Regex;

static LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:#{1,6}\s*)?\*\*\s*(?:下一步建议|next\s+step\s+suggestions?)\s*[:：]?\s*\*\*\s*[:：]?\s*$",
    )
    .expect("suggestion label regex")
});

static ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d+\.\s+(\S.*?)\s*$").expect("suggestion item regex"));

/// Pulls the numbered "next step" list out of a (possibly partial) answer.
///
/// Collection starts at the first non-empty line after the emphasized label
/// and stops at a blank line or the first line that is not `<n>. item`.
pub fn extract_suggestions(text: &str) -> Vec<String> {
    let mut lines = text.lines();
    if !lines.by_ref().any(|line| LABEL.is_match(line)) {
        return Vec::new();
    }

    let mut items = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            if items.is_empty() {
                continue;
            }
            break;
        }
        match ITEM.captures(line) {
            Some(caps) => items.push(caps[1].to_string()),
            None => break,
        }
    }
    items
}
