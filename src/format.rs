//! Lightweight markup transform for message and citation text.
//!
//! Converts the small markdown subset the backend emits into HTML. This is
//! deliberately a sequence of pattern replacements, not a markdown parser:
//! unbalanced brackets or asterisks simply fail to match and pass through.
//!
//! # Transform order
//!
//! | Step | Syntax | Markup |
//! |------|--------|--------|
//! | 1 | `\n` | `<br>` |
//! | 2 | `[label](url)` | `<a href="url" target="_blank">label</a>` |
//! | 3 | `**text**` | `<strong>text</strong>` |
//! | 4 | `*text*` | `<em>text</em>` |
//! | 5 | `` `text` `` | `<code>text</code>` |
//! | 6 | `[n]` | numbered citation reference span |
//! | 7 | `[KBn]`, `[WEBn]` | legacy citation reference span |
//!
//! Bold runs before italic so `**x**` is never consumed as two italics.
//! Links run before citation references so `[1](url)` stays a link.

use once_cell::sync::Lazy;
use regex::Regex;

static LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("literal regex"));
static BOLD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("literal regex"));
static ITALIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*]+)\*").expect("literal regex"));
static CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").expect("literal regex"));
static NUMERIC_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\d+)\]").expect("literal regex"));
static LEGACY_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[((?:KB|WEB)\d+)\]").expect("literal regex"));
static REFERENCE_SPAN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<span class="citation-ref">\[(?:<strong>)?(\d+|(?:KB|WEB)\d+)(?:</strong>)?\]</span>"#)
        .expect("literal regex")
});

/// Format message text as display markup. Empty input yields an empty string.
pub fn format_message(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let text = escape_html(text);
    let text = text.replace('\n', "<br>");
    let text = LINK_RE.replace_all(&text, r#"<a href="${2}" target="_blank">${1}</a>"#);
    let text = BOLD_RE.replace_all(&text, "<strong>${1}</strong>");
    let text = ITALIC_RE.replace_all(&text, "<em>${1}</em>");
    let text = CODE_RE.replace_all(&text, "<code>${1}</code>");
    let text = NUMERIC_REF_RE.replace_all(
        &text,
        r#"<span class="citation-ref">[<strong>${1}</strong>]</span>"#,
    );
    let text = LEGACY_REF_RE.replace_all(&text, r#"<span class="citation-ref">[${1}]</span>"#);

    text.into_owned()
}

/// Escape the characters that would otherwise be interpreted as markup.
///
/// None of these characters take part in the transform patterns, so
/// escaping first leaves the replacement behavior unchanged.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

/// Labels of the citation reference spans in formatted markup, in order:
/// `"1"` for a numeric reference, `"KB1"` for a legacy one.
pub fn reference_labels(markup: &str) -> Vec<String> {
    REFERENCE_SPAN_RE
        .captures_iter(markup)
        .map(|c| c[1].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(format_message(""), "");
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(format_message("hello world"), "hello world");
    }

    #[test]
    fn test_line_breaks() {
        assert_eq!(format_message("a\nb\n\nc"), "a<br>b<br><br>c");
    }

    #[test]
    fn test_link() {
        assert_eq!(
            format_message("see [docs](https://x.io/a?b=1)"),
            r#"see <a href="https://x.io/a?b=1" target="_blank">docs</a>"#
        );
    }

    #[test]
    fn test_bold_and_italic() {
        assert_eq!(
            format_message("**bold** and *it*"),
            "<strong>bold</strong> and <em>it</em>"
        );
    }

    #[test]
    fn test_inline_code() {
        assert_eq!(format_message("run `kbchat stats`"), "run <code>kbchat stats</code>");
    }

    #[test]
    fn test_numeric_reference() {
        assert_eq!(
            format_message("fact [12]."),
            r#"fact <span class="citation-ref">[<strong>12</strong>]</span>."#
        );
    }

    #[test]
    fn test_legacy_reference() {
        assert_eq!(
            format_message("[KB3] and [WEB1]"),
            r#"<span class="citation-ref">[KB3]</span> and <span class="citation-ref">[WEB1]</span>"#
        );
    }

    #[test]
    fn test_bold_wraps_reference_span() {
        assert_eq!(
            format_message("**[1]**"),
            r#"<strong><span class="citation-ref">[<strong>1</strong>]</span></strong>"#
        );
    }

    #[test]
    fn test_link_label_is_not_a_reference() {
        assert_eq!(
            format_message("[1](http://x)"),
            r#"<a href="http://x" target="_blank">1</a>"#
        );
    }

    #[test]
    fn test_malformed_markdown_passes_through() {
        assert_eq!(format_message("**open and [broken"), "**open and [broken");
        assert_eq!(format_message("a * b"), "a * b");
        assert_eq!(format_message("[x](no close"), "[x](no close");
    }

    #[test]
    fn test_markup_characters_are_escaped() {
        assert_eq!(
            format_message("<script>\"x\" & y</script>"),
            "&lt;script&gt;&quot;x&quot; &amp; y&lt;/script&gt;"
        );
    }

    #[test]
    fn test_reference_labels_mixed() {
        let out = format_message("**[3]** then [WEB2], not [x] or [4](http://y)");
        assert_eq!(reference_labels(&out), vec!["3", "WEB2"]);
        assert!(reference_labels("").is_empty());
    }

    #[test]
    fn test_rewritten_scenario() {
        let out = format_message("See [1] and [2].");
        assert_eq!(reference_labels(&out), vec!["1", "2"]);
        assert!(out.contains("[<strong>1</strong>]"));
        assert!(out.contains("[<strong>2</strong>]"));
    }
}
