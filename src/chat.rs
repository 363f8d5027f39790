//! Chat view: the session-scoped state behind the conversation panel.
//!
//! A [`ChatView`] owns everything that lives for one conversation: the
//! message history, the [`CitationRegistry`] of every cited answer, and the
//! [`CitationOverlay`]. It is created when the view is mounted, emptied by
//! [`ChatView::reset`], and dropped with the view.
//!
//! # Rendering
//!
//! ```text
//! raw text + citations
//!        │ register()            → message id (only when citations exist)
//!        │ rewrite_markers()     → [KB1]/[WEB2] become [1]/[2]
//!        │ format_message()      → markup
//!        ▼
//! RenderedMessage { markup, reference spans, message id }
//!        │ activate_reference()
//!        ▼
//! CitationOverlay::show(id)
//! ```
//!
//! Reference spans are collected from the finished markup at render time,
//! so activating one is a synchronous call on the [`RenderedMessage`]; no
//! interaction wiring depends on when the markup is displayed.

use async_trait::async_trait;
use chrono::Local;
use std::sync::{Mutex, MutexGuard};

use crate::citations::rewrite_markers;
use crate::client::ApiError;
use crate::config::ChatConfig;
use crate::format::{escape_html, format_message, reference_labels};
use crate::models::{
    ChatRequest, ChatResponse, Citation, CitationList, Message, MessageId, Sender,
};
use crate::overlay::{CitationOverlay, OverlayState, PointerTarget, ShowOutcome};
use crate::registry::CitationRegistry;
use crate::ui::{InFlight, LoadingIndicators, Panel};

/// First assistant message of every conversation. Survives [`ChatView::reset`].
pub const WELCOME_MESSAGE: &str = "Hello! Ask me anything about the documents in your \
knowledge base. I can also search the web, and I'll cite my sources.";

/// Shown after `Error: ` when the backend gave no usable message.
pub const ERROR_FALLBACK: &str = "Failed to get response";

/// The chat endpoint, as consumed by [`ChatView`].
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError>;
}

/// Which retrieval sources the backend should consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub use_knowledge_search: bool,
    pub use_web_search: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            use_knowledge_search: true,
            use_web_search: false,
        }
    }
}

impl From<&ChatConfig> for SearchOptions {
    fn from(config: &ChatConfig) -> Self {
        Self {
            use_knowledge_search: config.use_knowledge_search,
            use_web_search: config.use_web_search,
        }
    }
}

/// A message as displayed, with its reference spans already collected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub sender: Sender,
    /// Registry key; `None` for messages without citations.
    pub message_id: Option<MessageId>,
    /// Text after legacy markers were rewritten.
    pub display_text: String,
    /// Body markup (the inside of `message-content`).
    pub content_html: String,
    /// Label of every reference span in `content_html`, in order.
    pub references: Vec<String>,
}

impl RenderedMessage {
    fn render(
        text: &str,
        sender: Sender,
        citations: &[Citation],
        message_id: Option<MessageId>,
    ) -> Self {
        let display_text = if citations.is_empty() {
            text.to_string()
        } else {
            rewrite_markers(text, citations)
        };
        let content_html = format_message(&display_text);
        let references = reference_labels(&content_html);
        Self {
            sender,
            message_id,
            display_text,
            content_html,
            references,
        }
    }

    /// Reference spans open the overlay only on messages with citations.
    pub fn is_interactive(&self) -> bool {
        self.message_id.is_some() && !self.references.is_empty()
    }

    /// Full message markup including the sender label.
    pub fn html(&self) -> String {
        let id_attr = self
            .message_id
            .as_ref()
            .map(|id| format!(r#" data-message-id="{}""#, escape_html(id.as_str())))
            .unwrap_or_default();
        format!(
            concat!(
                r#"<div class="message message-{}"{}>"#,
                r#"<div class="message-sender">{}</div>"#,
                r#"<div class="message-content">{}</div>"#,
                "</div>"
            ),
            self.sender.css_class(),
            id_attr,
            self.sender.label(),
            self.content_html
        )
    }

    /// Terminal rendering: sender label, then the rewritten text.
    pub fn plain_text(&self) -> String {
        format!("{}: {}", self.sender.label(), self.display_text)
    }
}

/// What happened to a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The backend answered; this is the rendered answer.
    Answered(RenderedMessage),
    /// The request failed; this is the rendered `Error: …` message.
    Failed(RenderedMessage),
    /// Input was blank. Nothing was sent.
    Empty,
    /// Another submission is still waiting for its answer. Nothing was sent.
    Busy,
}

#[derive(Debug, Default)]
struct SessionState {
    /// Messages exchanged in this conversation (excludes the welcome).
    history: Vec<Message>,
    /// Everything on screen, welcome first.
    rendered: Vec<RenderedMessage>,
    registry: CitationRegistry,
    overlay: CitationOverlay,
}

/// Session-scoped chat view state.
pub struct ChatView<B> {
    backend: B,
    state: Mutex<SessionState>,
    loading: LoadingIndicators,
    in_flight: InFlight,
}

impl<B: ChatBackend> ChatView<B> {
    pub fn new(backend: B) -> Self {
        Self::with_loading(backend, LoadingIndicators::new())
    }

    /// Share loading indicators with the rest of the UI.
    pub fn with_loading(backend: B, loading: LoadingIndicators) -> Self {
        let state = SessionState {
            rendered: vec![welcome()],
            ..SessionState::default()
        };
        Self {
            backend,
            state: Mutex::new(state),
            loading,
            in_flight: InFlight::new(),
        }
    }

    /// Send `input` to the backend and render the reply.
    ///
    /// Rejects blank input and overlapping submissions. The chat loading
    /// indicator is shown for the duration of the request and cleared on
    /// every exit path. Failures are rendered as an assistant message
    /// reading `Error: <message>`; they are never returned as errors.
    pub async fn submit(&self, input: &str, options: SearchOptions) -> SubmitOutcome {
        let message = input.trim();
        if message.is_empty() {
            return SubmitOutcome::Empty;
        }
        let Some(_in_flight) = self.in_flight.try_begin() else {
            tracing::debug!("chat request already in flight, ignoring submission");
            return SubmitOutcome::Busy;
        };

        self.add_message(message, Sender::User, Vec::<Citation>::new());

        let request = ChatRequest {
            message: message.to_string(),
            use_knowledge_search: options.use_knowledge_search,
            use_web_search: options.use_web_search,
        };
        let result = {
            let _loading = self.loading.begin(Panel::Chat);
            self.backend.chat(&request).await
        };

        match result {
            Ok(reply) => {
                tracing::debug!(citations = reply.citations.len(), "chat answered");
                SubmitOutcome::Answered(self.add_message(
                    &reply.response,
                    Sender::Assistant,
                    reply.citations,
                ))
            }
            Err(e) => {
                tracing::warn!(error = %e, "chat request failed");
                let text = format!("Error: {}", e.user_message(ERROR_FALLBACK));
                SubmitOutcome::Failed(self.add_message(&text, Sender::Assistant, Vec::<Citation>::new()))
            }
        }
    }

    /// Append a message to the conversation and render it.
    ///
    /// Citations, when present, are registered under a fresh message id
    /// before the text is rewritten and formatted.
    pub fn add_message(
        &self,
        text: &str,
        sender: Sender,
        citations: impl Into<CitationList>,
    ) -> RenderedMessage {
        let citations: CitationList = citations.into();
        let mut state = self.lock();

        let id = state.registry.register(citations.clone());
        let rendered = RenderedMessage::render(text, sender, &citations, id.clone());

        state.history.push(Message {
            text: text.to_string(),
            sender,
            citations,
            id,
            timestamp: Local::now(),
        });
        state.rendered.push(rendered.clone());
        rendered
    }

    /// Handle a click on one of `message`'s reference spans.
    pub fn activate_reference(&self, message: &RenderedMessage) -> ShowOutcome {
        match (&message.message_id, message.references.is_empty()) {
            (Some(id), false) => self.show_citations(id),
            _ => ShowOutcome::NotFound,
        }
    }

    /// Open the overlay for `id`. Unknown ids are a no-op.
    pub fn show_citations(&self, id: &MessageId) -> ShowOutcome {
        let mut state = self.lock();
        let SessionState {
            registry, overlay, ..
        } = &mut *state;
        overlay.show(registry, id)
    }

    pub fn close_overlay(&self) {
        self.lock().overlay.close();
    }

    pub fn overlay_pointer(&self, target: PointerTarget) {
        self.lock().overlay.pointer(target);
    }

    pub fn overlay_state(&self) -> OverlayState {
        self.lock().overlay.state().clone()
    }

    pub fn overlay_visible(&self) -> bool {
        self.lock().overlay.is_visible()
    }

    /// `[n]: content, source` lines for the open overlay; empty when hidden.
    pub fn overlay_text(&self) -> String {
        self.lock().overlay.render_text()
    }

    pub fn overlay_html(&self) -> String {
        self.lock().overlay.render_html()
    }

    /// Citations registered under `id`.
    pub fn lookup(&self, id: &MessageId) -> Option<CitationList> {
        self.lock().registry.lookup(id)
    }

    /// Id of the most recent message that carries citations.
    pub fn last_cited_message(&self) -> Option<MessageId> {
        self.lock()
            .history
            .iter()
            .rev()
            .find_map(|m| m.id.clone())
    }

    /// Start a new conversation. Keeps only the welcome message; every
    /// previously issued message id stops resolving.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.history.clear();
        state.rendered.truncate(1);
        state.registry.clear();
        state.overlay.close();
    }

    pub fn history(&self) -> Vec<Message> {
        self.lock().history.clone()
    }

    pub fn messages(&self) -> Vec<RenderedMessage> {
        self.lock().rendered.clone()
    }

    /// Markup for the whole message list.
    pub fn transcript_html(&self) -> String {
        self.lock()
            .rendered
            .iter()
            .map(RenderedMessage::html)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_loading(Panel::Chat)
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_busy()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn welcome() -> RenderedMessage {
    RenderedMessage::render(WELCOME_MESSAGE, Sender::Assistant, &[], None)
}

/// Render a saved `/api/chat` response outside of any session.
///
/// The response gets its own registry, so the returned id is only
/// meaningful together with the returned citation list.
pub fn render_response(response: &ChatResponse) -> (RenderedMessage, CitationOverlay) {
    let mut registry = CitationRegistry::new();
    let id = registry.register(response.citations.clone());
    let rendered = RenderedMessage::render(
        &response.response,
        Sender::Assistant,
        &response.citations,
        id.clone(),
    );
    let mut overlay = CitationOverlay::new();
    if let Some(id) = &id {
        overlay.show(&registry, id);
    }
    (rendered, overlay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use tokio::sync::Notify;

    /// Backend that replays scripted results and records what it was sent.
    #[derive(Default)]
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<ChatResponse, ApiError>>>,
        requests: Mutex<Vec<ChatRequest>>,
        loading: Option<LoadingIndicators>,
        saw_loading: Mutex<Vec<bool>>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedBackend {
        fn replying(replies: Vec<Result<ChatResponse, ApiError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(loading) = &self.loading {
                self.saw_loading
                    .lock()
                    .unwrap()
                    .push(loading.is_loading(Panel::Chat));
            }
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::Status { status: 500 }))
        }
    }

    fn cited_reply() -> ChatResponse {
        ChatResponse {
            response: "See [KB1] and [WEB2].".into(),
            citations: vec![
                Citation::new("A", "Knowledge Base: doc1"),
                Citation::new("B", "http://x"),
            ],
        }
    }

    #[test]
    fn test_new_view_has_welcome_only() {
        let view = ChatView::new(ScriptedBackend::default());
        let messages = view.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender, Sender::Assistant);
        assert!(view.history().is_empty());
    }

    #[test]
    fn test_add_message_registers_and_rewrites() {
        let view = ChatView::new(ScriptedBackend::default());
        let cited = cited_reply();
        let rendered = view.add_message(&cited.response, Sender::Assistant, cited.citations.clone());

        assert_eq!(rendered.display_text, "See [1] and [2].");
        assert_eq!(rendered.references, vec!["1", "2"]);
        assert!(rendered.is_interactive());
        let id = rendered.message_id.clone().unwrap();
        assert_eq!(&*view.lookup(&id).unwrap(), cited.citations.as_slice());

        let html = rendered.html();
        assert!(html.starts_with(&format!(
            r#"<div class="message message-ai" data-message-id="{}">"#,
            id
        )));
        assert!(html.contains(r#"<div class="message-sender">AI Assistant</div>"#));
    }

    #[test]
    fn test_message_without_citations_has_no_id() {
        let view = ChatView::new(ScriptedBackend::default());
        let rendered = view.add_message("plain [1]", Sender::User, Vec::<Citation>::new());
        assert!(rendered.message_id.is_none());
        assert!(!rendered.is_interactive());
        assert_eq!(view.activate_reference(&rendered), ShowOutcome::NotFound);
        assert!(!view.overlay_visible());
        assert!(rendered.html().starts_with(r#"<div class="message message-user">"#));
    }

    #[test]
    fn test_displayed_references_match_citation_count() {
        let view = ChatView::new(ScriptedBackend::default());
        let cited = cited_reply();
        let rendered = view.add_message(&cited.response, Sender::Assistant, cited.citations.clone());
        let id = rendered.message_id.clone().unwrap();
        let count = view.lookup(&id).unwrap().len();
        let mut numbers: Vec<usize> = rendered
            .references
            .iter()
            .map(|r| r.parse().unwrap())
            .collect();
        numbers.sort_unstable();
        numbers.dedup();
        assert_eq!(numbers, (1..=count).collect::<Vec<_>>());
    }

    #[test]
    fn test_activate_reference_opens_overlay() {
        let view = ChatView::new(ScriptedBackend::default());
        let cited = cited_reply();
        let rendered = view.add_message(&cited.response, Sender::Assistant, cited.citations);
        assert_eq!(view.activate_reference(&rendered), ShowOutcome::Shown);
        assert!(view.overlay_visible());
        assert_eq!(
            view.overlay_text(),
            "[1]: A, Knowledge Base: doc1\n[2]: B, http://x"
        );
        view.overlay_pointer(PointerTarget::Content);
        assert!(view.overlay_visible());
        view.overlay_pointer(PointerTarget::Backdrop);
        assert!(!view.overlay_visible());
    }

    #[test]
    fn test_reset_invalidates_ids() {
        let view = ChatView::new(ScriptedBackend::default());
        let cited = cited_reply();
        let rendered = view.add_message(&cited.response, Sender::Assistant, cited.citations);
        let id = rendered.message_id.clone().unwrap();
        view.activate_reference(&rendered);

        view.reset();

        assert!(view.lookup(&id).is_none());
        assert!(!view.overlay_visible());
        assert_eq!(view.show_citations(&id), ShowOutcome::NotFound);
        assert_eq!(view.messages().len(), 1);
        assert!(view.history().is_empty());
        assert!(view.last_cited_message().is_none());
    }

    #[tokio::test]
    async fn test_submit_success() {
        let view = ChatView::new(ScriptedBackend::replying(vec![Ok(cited_reply())]));
        let options = SearchOptions {
            use_knowledge_search: false,
            use_web_search: true,
        };
        let outcome = view.submit("  what is X?  ", options).await;

        let SubmitOutcome::Answered(answer) = outcome else {
            panic!("expected an answer, got {:?}", outcome);
        };
        assert_eq!(answer.display_text, "See [1] and [2].");
        assert_eq!(view.last_cited_message(), answer.message_id);

        let history = view.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].text, "what is X?");
        assert_eq!(history[0].sender, Sender::User);
        assert!(history[0].citations.is_empty());
        assert_eq!(history[1].text, "See [KB1] and [WEB2].");

        let sent = view.backend.requests.lock().unwrap();
        assert_eq!(
            sent[0],
            ChatRequest {
                message: "what is X?".into(),
                use_knowledge_search: false,
                use_web_search: true,
            }
        );
    }

    #[tokio::test]
    async fn test_submit_failure_renders_error_and_clears_loading() {
        let loading = LoadingIndicators::new();
        let backend = ScriptedBackend {
            loading: Some(loading.clone()),
            ..ScriptedBackend::replying(vec![Err(ApiError::Backend {
                status: 500,
                message: "overloaded".into(),
            })])
        };
        let view = ChatView::with_loading(backend, loading);

        let outcome = view.submit("hi", SearchOptions::default()).await;
        let SubmitOutcome::Failed(msg) = outcome else {
            panic!("expected failure, got {:?}", outcome);
        };
        assert_eq!(msg.display_text, "Error: overloaded");
        assert_eq!(msg.sender, Sender::Assistant);
        assert!(msg.message_id.is_none());
        assert_eq!(*view.backend.saw_loading.lock().unwrap(), vec![true]);
        assert!(!view.is_loading());
        assert!(!view.is_busy());
    }

    #[tokio::test]
    async fn test_submit_unparseable_error_uses_fallback() {
        let view = ChatView::new(ScriptedBackend::replying(vec![Err(ApiError::Status {
            status: 502,
        })]));
        let SubmitOutcome::Failed(msg) = view.submit("hi", SearchOptions::default()).await else {
            panic!("expected failure");
        };
        assert_eq!(msg.display_text, "Error: Failed to get response");
    }

    #[tokio::test]
    async fn test_submit_blank_input() {
        let view = ChatView::new(ScriptedBackend::default());
        assert_eq!(
            view.submit("   \n", SearchOptions::default()).await,
            SubmitOutcome::Empty
        );
        assert!(view.history().is_empty());
        assert!(view.backend.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_submit_is_rejected() {
        let gate = Arc::new(Notify::new());
        let backend = ScriptedBackend {
            gate: Some(gate.clone()),
            ..ScriptedBackend::replying(vec![Ok(cited_reply())])
        };
        let view = ChatView::new(backend);

        let first = view.submit("one", SearchOptions::default());
        let second = async {
            let outcome = view.submit("two", SearchOptions::default()).await;
            gate.notify_one();
            outcome
        };
        let (first, second) = tokio::join!(first, second);

        assert!(matches!(first, SubmitOutcome::Answered(_)));
        assert_eq!(second, SubmitOutcome::Busy);
        assert_eq!(view.backend.requests.lock().unwrap().len(), 1);
        assert!(!view.is_busy());
    }

    #[test]
    fn test_render_response_offline() {
        let (rendered, overlay) = render_response(&cited_reply());
        assert_eq!(rendered.references, vec!["1", "2"]);
        assert!(overlay.is_visible());
        assert!(overlay.render_text().starts_with("[1]: A"));

        let (rendered, overlay) = render_response(&ChatResponse {
            response: "no sources".into(),
            citations: vec![],
        });
        assert!(rendered.message_id.is_none());
        assert!(!overlay.is_visible());
    }

    #[tokio::test]
    async fn test_cancelled_submit_clears_loading_and_busy() {
        let backend = ScriptedBackend {
            gate: Some(Arc::new(Notify::new())),
            ..ScriptedBackend::default()
        };
        let view = ChatView::new(backend);

        let pending = view.submit("hi", SearchOptions::default());
        let result = tokio::time::timeout(std::time::Duration::from_millis(50), pending).await;
        assert!(result.is_err());

        assert!(!view.is_loading());
        assert!(!view.is_busy());
        assert_eq!(view.history().len(), 1);
        assert_eq!(view.backend.requests.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_overlay_state_follows_show_and_close() {
        let view = ChatView::new(ScriptedBackend::default());
        assert_eq!(view.overlay_state(), OverlayState::Hidden);

        let cited = cited_reply();
        let rendered = view.add_message(&cited.response, Sender::Assistant, cited.citations.clone());
        let id = rendered.message_id.clone().unwrap();
        view.activate_reference(&rendered);

        let OverlayState::Visible(content) = view.overlay_state() else {
            panic!("overlay should be visible");
        };
        assert_eq!(content.message_id, id);
        assert_eq!(&*content.citations, cited.citations.as_slice());

        view.close_overlay();
        assert_eq!(view.overlay_state(), OverlayState::Hidden);
    }

    #[test]
    fn test_transcript_html_lists_every_message() {
        let view = ChatView::new(ScriptedBackend::default());
        view.add_message("a <b>", Sender::User, Vec::<Citation>::new());
        let cited = cited_reply();
        let answer = view.add_message(&cited.response, Sender::Assistant, cited.citations);

        let html = view.transcript_html();
        let blocks: Vec<&str> = html.split('\n').collect();
        assert_eq!(blocks.len(), 3);
        assert!(blocks[0].starts_with(r#"<div class="message message-ai">"#));
        assert!(blocks[1].contains("a &lt;b&gt;"));
        assert_eq!(blocks[2], answer.html());

        view.reset();
        assert_eq!(view.transcript_html(), view.messages()[0].html());
    }
}
