use std::borrow::Cow;

/// Replaces every occurrence of `search`, reusing the original string when nothing matches.
///
/// An empty `search` never matches.
pub fn replace_literal<'a>(value: &'a str, search: &str, replacement: &str) -> Cow<'a, str> {
    if search.is_empty() || !value.contains(search) {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(value.replace(search, replacement))
    }
}

/// True when the value is empty or whitespace only.
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_literal_borrows_when_no_match() {
        let result = replace_literal("2020-01-01", "/", "-");
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(replace_literal("a/b/c", "/", "-").as_ref(), "a-b-c");
    }

    #[test]
    fn blank_detection_ignores_whitespace() {
        assert!(is_blank("   "));
        assert!(is_blank(""));
        assert!(!is_blank(" x "));
    }
}
