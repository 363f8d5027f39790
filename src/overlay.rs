//! Citation detail overlay.
//!
//! Shows every source of one message, numbered the same way the
//! references in the message text are. The overlay is either hidden or
//! visible; it becomes visible only through a successful
//! [`CitationOverlay::show`] and is hidden again by an explicit close or a
//! pointer interaction outside its content area.

use crate::format::{escape_html, format_message};
use crate::models::{CitationList, MessageId};
use crate::registry::CitationRegistry;

/// Where a pointer interaction landed while the overlay is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerTarget {
    /// Inside the overlay's content box.
    Content,
    /// On the backdrop surrounding the content.
    Backdrop,
}

/// Result of asking the overlay to show a message's citations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowOutcome {
    Shown,
    /// Unknown id or no citations. The overlay state is left untouched.
    NotFound,
}

/// Visible overlay contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayContent {
    pub message_id: MessageId,
    pub citations: CitationList,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OverlayState {
    #[default]
    Hidden,
    Visible(OverlayContent),
}

#[derive(Debug, Default)]
pub struct CitationOverlay {
    state: OverlayState,
}

impl CitationOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `id` and show its citations.
    ///
    /// A failed lookup is a no-op, not an error: if the overlay was already
    /// showing another message it keeps showing it.
    pub fn show(&mut self, registry: &CitationRegistry, id: &MessageId) -> ShowOutcome {
        match registry.lookup(id) {
            Some(citations) => {
                tracing::debug!(message_id = %id, count = citations.len(), "showing citations");
                self.state = OverlayState::Visible(OverlayContent {
                    message_id: id.clone(),
                    citations,
                });
                ShowOutcome::Shown
            }
            None => {
                tracing::debug!(message_id = %id, "no citations registered");
                ShowOutcome::NotFound
            }
        }
    }

    pub fn close(&mut self) {
        self.state = OverlayState::Hidden;
    }

    /// Route a pointer interaction. Anything outside the content closes
    /// the overlay.
    pub fn pointer(&mut self, target: PointerTarget) {
        if target == PointerTarget::Backdrop {
            self.close();
        }
    }

    pub fn is_visible(&self) -> bool {
        matches!(self.state, OverlayState::Visible(_))
    }

    pub fn state(&self) -> &OverlayState {
        &self.state
    }

    pub fn content(&self) -> Option<&OverlayContent> {
        match &self.state {
            OverlayState::Visible(content) => Some(content),
            OverlayState::Hidden => None,
        }
    }

    /// Plain-text listing, one `[n]: content, source` line per citation.
    /// Empty when hidden.
    pub fn render_text(&self) -> String {
        self.content().map(OverlayContent::render_text).unwrap_or_default()
    }

    /// Overlay markup. Empty when hidden.
    pub fn render_html(&self) -> String {
        self.content().map(OverlayContent::render_html).unwrap_or_default()
    }
}

impl OverlayContent {
    pub fn render_text(&self) -> String {
        self.citations
            .iter()
            .enumerate()
            .map(|(i, c)| format!("[{}]: {}, {}", i + 1, c.text, c.source))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn render_html(&self) -> String {
        let mut html = String::from(
            r#"<h3>Citations<span class="close-modal">&times;</span></h3>"#,
        );
        for (i, citation) in self.citations.iter().enumerate() {
            html.push_str(&format!(
                concat!(
                    r#"<div class="modal-citation">"#,
                    r#"<div class="citation-number">[{}]</div>"#,
                    r#"<div class="citation-content">{}"#,
                    r#"<div class="citation-source">Source: {}</div>"#,
                    "</div></div>"
                ),
                i + 1,
                format_message(&citation.text),
                escape_html(&citation.source),
            ));
        }
        html
    }
}
