use once_cell::sync::Lazy;
use regex::Regex;

static NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)$").expect("numeric pattern is valid"));

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// A cleaned cell, or `None` when the cell is missing or blank.
pub fn non_empty(cell: Option<&str>) -> Option<String> {
    cell.map(clean_str).filter(|s| !s.is_empty())
}

/// Collapse runs of whitespace into single spaces.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse an animal-unit count as OCR hands it over: thousands separators and
/// stray inner spaces are dropped, anything that is still not a plain decimal
/// number yields `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let compact: String = clean_str(raw)
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if !NUMERIC.is_match(&compact) {
        return None;
    }
    compact.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_str_trims_and_unquotes() {
        assert_eq!(clean_str("  North Pasture "), "North Pasture");
        assert_eq!(clean_str("\" quoted \""), "quoted");
        assert_eq!(clean_str("\""), "\"");
    }

    #[test]
    fn non_empty_treats_blank_as_missing() {
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some("   ")), None);
        assert_eq!(non_empty(Some(" x ")), Some("x".to_string()));
    }

    #[test]
    fn parse_number_accepts_ocr_variants() {
        assert_eq!(parse_number("12"), Some(12.0));
        assert_eq!(parse_number(" 1,250 "), Some(1250.0));
        assert_eq!(parse_number("3.5"), Some(3.5));
        assert_eq!(parse_number("1 2"), Some(12.0));
        assert_eq!(parse_number(".5"), Some(0.5));
    }

    #[test]
    fn parse_number_rejects_non_numeric() {
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("twelve"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("12a"), None);
    }
}
