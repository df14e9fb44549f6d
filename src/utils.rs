/// Mobile operator prefixes that may follow the +998 country code.
const OPERATOR_CODES: [&str; 8] = ["90", "91", "93", "94", "95", "97", "98", "99"];

/// Normalizes an Uzbek phone number to the canonical `+998XXXXXXXXX` form.
///
/// Accepts the number with or without the leading `+`, with or without the
/// country code, and with any mix of spaces, dashes, dots and parentheses.
/// Returns `None` when the digits do not form a valid number with an
/// allow-listed operator code.
pub fn normalize_phone(input: &str) -> Option<String> {
    let cleaned: String = input
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();

    let national = if let Some(rest) = cleaned.strip_prefix("+998") {
        rest
    } else if let Some(rest) = cleaned.strip_prefix("998") {
        rest
    } else {
        cleaned.as_str()
    };

    if national.len() != 9 || !national.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if !OPERATOR_CODES.contains(&&national[..2]) {
        return None;
    }

    Some(format!("+998{national}"))
}

/// Safely truncates a string to a maximum character length (not bytes).
/// This is UTF-8 safe and will not panic on multi-byte characters.
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.char_indices()
        .nth(max_chars)
        .map_or(s.to_string(), |(pos, _)| s[..pos].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_full_international_form() {
        assert_eq!(
            normalize_phone("+998901234567").as_deref(),
            Some("+998901234567")
        );
    }

    #[test]
    fn normalizes_without_plus_or_country_code() {
        assert_eq!(
            normalize_phone("998911234567").as_deref(),
            Some("+998911234567")
        );
        assert_eq!(
            normalize_phone("971234567").as_deref(),
            Some("+998971234567")
        );
    }

    #[test]
    fn strips_separators() {
        assert_eq!(
            normalize_phone("+998 (90) 123-45-67").as_deref(),
            Some("+998901234567")
        );
        assert_eq!(
            normalize_phone("90.123.45.67").as_deref(),
            Some("+998901234567")
        );
    }

    #[test]
    fn rejects_unknown_operator_code() {
        assert_eq!(normalize_phone("+998921234567"), None);
        assert_eq!(normalize_phone("921234567"), None);
    }

    #[test]
    fn rejects_wrong_length_and_garbage() {
        assert_eq!(normalize_phone("+99890123456"), None);
        assert_eq!(normalize_phone("+9989012345678"), None);
        assert_eq!(normalize_phone("hello"), None);
        assert_eq!(normalize_phone(""), None);
        assert_eq!(normalize_phone("9012345ab"), None);
    }

    #[test]
    fn test_truncate_str_unicode() {
        let s = "Саломатлик учун!";
        assert_eq!(truncate_str(s, 10), "Саломатлик");
        assert_eq!(truncate_str(s, 50), "Саломатлик учун!");
    }
}
