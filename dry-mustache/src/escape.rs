//! HTML escaping

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static HTML_SPECIAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"[&<>"']"#).expect("valid escape pattern"));

/// Escapes `& < > " '` for inclusion in HTML
///
/// Borrows the input when there is nothing to escape.
pub fn escape_html(content: &str) -> Cow<'_, str> {
    HTML_SPECIAL.replace_all(content, |captures: &Captures| match &captures[0] {
        "&" => "&amp;",
        "<" => "&lt;",
        ">" => "&gt;",
        "\"" => "&quot;",
        _ => "&apos;",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn escapes_special_characters() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&apos;s&lt;/a&gt;"
        );
    }

    #[test]
    fn plain_text_is_borrowed() {
        assert!(matches!(escape_html("plain"), Cow::Borrowed("plain")));
    }
}
