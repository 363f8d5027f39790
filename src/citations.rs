//! Citation marker rewriting.
//!
//! The backend tags citations in answer text by source type and position:
//! `[KB1]` for the first citation when it came from the knowledge base,
//! `[WEB2]` for the second when it came from a web search, and so on.
//! Before display these legacy tags are rewritten to positional numeric
//! references (`[1]`, `[2]`, …) that line up with the citation list.

use crate::models::Citation;

/// Legacy tag for the citation at 0-based `index`, without brackets.
///
/// ```
/// use kbchat::citations::legacy_tag;
/// use kbchat::models::Citation;
///
/// assert_eq!(legacy_tag(0, &Citation::new("a", "Knowledge Base: doc1")), "KB1");
/// assert_eq!(legacy_tag(1, &Citation::new("b", "http://x")), "WEB2");
/// ```
pub fn legacy_tag(index: usize, citation: &Citation) -> String {
    let kind = if citation.is_knowledge_base() {
        "KB"
    } else {
        "WEB"
    };
    format!("{}{}", kind, index + 1)
}

/// Rewrite every bracketed legacy tag in `text` to its numeric reference.
///
/// Replacement is global and exact on the bracketed tag. Tags are distinct
/// per index, so the order of application does not change the result.
/// Text that already uses numeric references is returned unchanged.
pub fn rewrite_markers(text: &str, citations: &[Citation]) -> String {
    let mut rewritten = text.to_string();
    for (i, citation) in citations.iter().enumerate() {
        let tag = format!("[{}]", legacy_tag(i, citation));
        if rewritten.contains(&tag) {
            rewritten = rewritten.replace(&tag, &format!("[{}]", i + 1));
        }
    }
    rewritten
}
