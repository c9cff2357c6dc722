//! Localized number parsing for tables and percentages.
//!
//! Values are written with `.` as thousands separator and `,` as decimal
//! separator ("1.234,56").

/// Parse a table cell into a number.
///
/// Drops `.` and spaces, maps `,` to `.`, then keeps only digits, `.` and
/// `-`. Empty or sign-only input has no value.
pub fn parse_localized(value: &str) -> Option<f64> {
    let normalized: String = value
        .trim()
        .replace(['.', ' '], "")
        .replace(',', ".")
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    match normalized.as_str() {
        "" | "-" | "." | "-." => None,
        s => s.parse().ok(),
    }
}

/// Parse the numeric part of a percentage token ("101", "99,5", "1.000").
pub fn parse_percentage(token: &str) -> Option<f64> {
    token.replace('.', "").replace(',', ".").parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_localized() {
        assert_eq!(parse_localized("1.234,56"), Some(1234.56));
        assert_eq!(parse_localized(" -20 "), Some(-20.0));
        assert_eq!(parse_localized("R$ 1 000,00"), Some(1000.0));
        assert_eq!(parse_localized("100"), Some(100.0));
    }

    #[test]
    fn test_parse_localized_no_value() {
        assert_eq!(parse_localized(""), None);
        assert_eq!(parse_localized("-"), None);
        assert_eq!(parse_localized("n/a"), None);
        assert_eq!(parse_localized("-,"), None);
        assert_eq!(parse_localized("1,2,3"), None);
    }

    #[test]
    fn test_parse_percentage() {
        assert_eq!(parse_percentage("101"), Some(101.0));
        assert_eq!(parse_percentage("99,5"), Some(99.5));
        assert_eq!(parse_percentage("100.5"), Some(1005.0));
    }
}
