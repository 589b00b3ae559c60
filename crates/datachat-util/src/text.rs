/// Cuts `s` to at most `max_chars` characters, marking the cut with `…`.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Collapses a JSON-ish value into a single display line.
pub fn one_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("散点图绘制", 3), "散点…");
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[test]
    fn one_line_collapses_whitespace() {
        assert_eq!(one_line("{\n  \"x\": 1\n}"), "{ \"x\": 1 }");
    }
}
