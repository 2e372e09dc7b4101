use std::borrow;

/// Caps a string for display without splitting a codepoint. The stored value
/// is never affected; only the rendering is shortened.
pub fn truncate_display(text: &str, max_chars: usize) -> borrow::Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => borrow::Cow::Owned(text[..index].to_string()),
        None => borrow::Cow::Borrowed(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_truncate_display() {
        assert_eq!(truncate_display("short", 10), "short");
        assert_eq!(truncate_display("exactly", 7), "exactly");
        assert_eq!(truncate_display("overlong", 4), "over");
        assert_eq!(truncate_display("", 4), "");
    }

    #[test]
    fn test_truncate_display_multibyte() {
        /* must cut between codepoints, not inside one */
        assert_eq!(truncate_display("añejo", 2), "añ");
        assert_eq!(truncate_display("日本語テキスト", 3), "日本語");
    }
}
