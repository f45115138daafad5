/// Parse a number as displayed in the UI or read by OCR, e.g. `"$6,409.12"`,
/// `"52.3%"` or `" 0.035 "`. Returns `None` for anything else.
pub fn parse_number_text(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .trim_start_matches('$')
        .trim_end_matches('%')
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    cleaned.parse::<f64>().ok().filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_display_numbers() {
        assert_eq!(parse_number_text("$6,409.12"), Some(6409.12));
        assert_eq!(parse_number_text("52.3%"), Some(52.3));
        assert_eq!(parse_number_text(" 0.035 "), Some(0.035));
        assert_eq!(parse_number_text("1 250"), Some(1250.0));
    }

    #[test]
    fn test_parse_rejects_non_numbers() {
        assert_eq!(parse_number_text(""), None);
        assert_eq!(parse_number_text("n/a"), None);
        assert_eq!(parse_number_text("inf"), None);
    }
}
