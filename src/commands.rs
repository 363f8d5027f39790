//! Command runners behind the `kbchat` binary.
//!
//! Each `run_*` function loads what it needs from [`Config`], drives one of
//! the panel state machines against the live backend, and prints to stdout.
//! Logging goes to stderr, so stdout stays usable in pipelines.

use anyhow::{bail, Context, Result};
use chrono::Local;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::chat::{render_response, ChatView, RenderedMessage, SearchOptions, SubmitOutcome};
use crate::client::ApiClient;
use crate::collection::{format_bytes, CollectionBrowser, StatsSummary};
use crate::config::Config;
use crate::models::{ChatResponse, MessageId};
use crate::overlay::ShowOutcome;
use crate::upload::{SourceKind, StoreDocumentRequest, UploadInput, Uploader};

/// Search toggles given on the command line, layered over `[chat]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchFlags {
    pub web: bool,
    pub no_knowledge: bool,
}

impl SearchFlags {
    fn resolve(self, config: &Config) -> SearchOptions {
        let mut options = SearchOptions::from(&config.chat);
        if self.web {
            options.use_web_search = true;
        }
        if self.no_knowledge {
            options.use_knowledge_search = false;
        }
        options
    }
}

fn client(config: &Config) -> Result<ApiClient> {
    ApiClient::new(&config.api).context("Failed to build HTTP client")
}

// ============ chat / repl / render ============

/// Ask a single question and print the answer with its citations.
pub async fn run_chat(config: &Config, message: &str, flags: SearchFlags, html: bool) -> Result<()> {
    let view = ChatView::new(client(config)?);

    match view.submit(message, flags.resolve(config)).await {
        SubmitOutcome::Answered(answer) => {
            if html {
                view.activate_reference(&answer);
                println!("{}", view.transcript_html());
                if view.overlay_visible() {
                    println!("{}", view.overlay_html());
                }
            } else {
                print_answer(&answer);
                if view.activate_reference(&answer) == ShowOutcome::Shown {
                    println!();
                    println!("{}", view.overlay_text());
                }
            }
            Ok(())
        }
        SubmitOutcome::Failed(msg) => bail!("{}", failure_reason(&msg)),
        SubmitOutcome::Empty => bail!("message must not be empty"),
        SubmitOutcome::Busy => bail!("another request is in flight"),
    }
}

/// Interactive conversation on stdin.
///
/// Lines are sent as questions. Slash commands: `/cite [id]` shows the
/// citations of the given (or most recent cited) message, `/close` hides
/// them, `/clear` starts a new conversation, `/quit` exits.
pub async fn run_repl(config: &Config, flags: SearchFlags) -> Result<()> {
    let view = ChatView::new(client(config)?);
    let options = flags.resolve(config);
    let interactive = atty::is(atty::Stream::Stdin);

    for msg in view.messages() {
        print_answer(&msg);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if interactive {
            print!("> ");
            std::io::stdout().flush()?;
        }
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit", _) | ("/exit", _) => break,
            ("/clear", _) => {
                view.reset();
                println!("Started a new conversation.");
            }
            ("/close", _) => view.close_overlay(),
            ("/cite", arg) => {
                let id = match arg.trim() {
                    "" => view.last_cited_message(),
                    id => Some(MessageId::new(id)),
                };
                match id.map(|id| view.show_citations(&id)) {
                    Some(ShowOutcome::Shown) => println!("{}", view.overlay_text()),
                    _ => println!("No citations to show."),
                }
            }
            _ => match view.submit(line, options).await {
                SubmitOutcome::Answered(msg) | SubmitOutcome::Failed(msg) => print_answer(&msg),
                SubmitOutcome::Empty | SubmitOutcome::Busy => {}
            },
        }
    }

    Ok(())
}

/// Render a saved `/api/chat` response without contacting the backend.
pub fn run_render(path: &Path, html: bool) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let response: ChatResponse = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a chat response", path.display()))?;

    let (rendered, overlay) = render_response(&response);
    if html {
        println!("{}", rendered.html());
        if overlay.is_visible() {
            println!("{}", overlay.render_html());
        }
    } else {
        print_answer(&rendered);
        if overlay.is_visible() {
            println!();
            println!("{}", overlay.render_text());
        }
    }
    Ok(())
}

/// The error text of a failed answer, without its `Error: ` prefix.
fn failure_reason(msg: &RenderedMessage) -> &str {
    msg.display_text
        .strip_prefix("Error: ")
        .unwrap_or(&msg.display_text)
}

fn print_answer(msg: &RenderedMessage) {
    match &msg.message_id {
        Some(id) => println!("{}  ({})", msg.plain_text(), id),
        None => println!("{}", msg.plain_text()),
    }
}

// ============ collection ============

/// Print one page of stored documents.
pub async fn run_docs_list(config: &Config, page: u32, per_page: Option<u32>) -> Result<()> {
    let per_page = per_page.unwrap_or(config.collection.per_page).max(1);
    let mut browser = CollectionBrowser::new(client(config)?, per_page);

    if !browser.load(page).await {
        bail!("{}", alert_text(browser.alert()));
    }
    if let Some(summary) = browser.refresh_stats().await {
        print_stats_header(&summary);
        println!();
    }

    let cards = browser.cards(Local::now());
    if cards.is_empty() {
        println!("No documents found.");
        return Ok(());
    }

    println!(
        "{:<38} {:<32} {:<10} {:>7} {:>9}  {}",
        "ID", "TITLE", "TYPE", "WORDS", "SIZE", "ADDED"
    );
    println!("{}", "-".repeat(112));
    for card in &cards {
        println!(
            "{:<38} {:<32} {:<10} {:>7} {:>9}  {}",
            card.id,
            truncate(&card.title, 32),
            card.source_type,
            card.words,
            card.size.as_deref().unwrap_or("-"),
            card.date
        );
        println!("    {}", truncate(&card.preview, 100));
    }

    if let Some(pagination) = browser.pagination() {
        println!();
        println!("{}", pagination);
    }
    Ok(())
}

/// Delete documents by id. Asks for confirmation unless `yes` is set.
pub async fn run_docs_delete(config: &Config, ids: &[String], yes: bool) -> Result<()> {
    if ids.is_empty() {
        bail!("no document ids given");
    }
    if !yes && !confirm(&format!("Delete {} document(s)?", ids.len()))? {
        println!("Aborted.");
        return Ok(());
    }

    let mut browser = CollectionBrowser::new(client(config)?, config.collection.per_page);
    let ok = match ids {
        [id] => browser.delete_document(id).await,
        _ => {
            for id in ids {
                browser.toggle_selection(id, true);
            }
            browser.delete_selected().await.is_some()
        }
    };

    let message = alert_text(browser.alert());
    if !ok {
        bail!("{}", message);
    }
    println!("{}", message);
    Ok(())
}

/// Print collection statistics.
pub async fn run_stats(config: &Config) -> Result<()> {
    let api = client(config)?;
    let stats = api
        .collection_stats()
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message("Failed to load collection stats")))?;
    let summary = StatsSummary::from(&stats);

    print_stats_header(&summary);
    if stats.total_size > 0 {
        println!("  Raw size:   {}", format_bytes(stats.total_size));
    }
    println!("  Backend:    {}", api.base_url());
    Ok(())
}

fn print_stats_header(summary: &StatsSummary) {
    println!("Knowledge Base");
    println!("==============");
    println!("  Documents:  {}", summary.document_count);
    println!("  Storage:    {}", summary.storage_size);
}

// ============ upload ============

/// Where `extract` and `store` read their source from.
#[derive(Debug, Clone)]
pub enum SourceArg {
    File(PathBuf),
    Url(String),
}

impl From<SourceArg> for UploadInput {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::File(path) => UploadInput::File(path),
            SourceArg::Url(url) => UploadInput::Url(url),
        }
    }
}

/// Extract text from a file or URL and print it.
pub async fn run_extract(config: &Config, kind: SourceKind, source: SourceArg) -> Result<()> {
    let uploader = Uploader::new(client(config)?, config.upload.max_upload_bytes);
    let extracted = uploader
        .extract(kind, &source.into())
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message("Failed to extract content")))?;

    eprintln!("{}", alert_text(uploader.alert()));
    println!("{}", extracted.content);
    Ok(())
}

/// What `store` should put in the knowledge base.
#[derive(Debug, Clone)]
pub enum StoreInput {
    /// Literal text, stored as-is.
    Text(String),
    /// Extracted first, then stored.
    Extract(SourceKind, SourceArg),
}

impl StoreInput {
    /// Extract from `source`. Without an explicit kind, files are typed by
    /// extension (falling back to text) and URLs are treated as websites.
    pub fn extract(kind: Option<SourceKind>, source: SourceArg) -> Self {
        let kind = kind.unwrap_or_else(|| match &source {
            SourceArg::File(path) => SourceKind::from_path(path).unwrap_or(SourceKind::Text),
            SourceArg::Url(_) => SourceKind::Website,
        });
        StoreInput::Extract(kind, source)
    }
}

/// Store a document and print its id.
pub async fn run_store(
    config: &Config,
    title: &str,
    input: StoreInput,
    source: Option<String>,
) -> Result<()> {
    let uploader = Uploader::new(client(config)?, config.upload.max_upload_bytes);

    let mut request = match input {
        StoreInput::Text(text) => StoreDocumentRequest::manual(text, title),
        StoreInput::Extract(kind, arg) => {
            let extracted = uploader
                .extract(kind, &arg.into())
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message("Failed to extract content")))?;
            StoreDocumentRequest::from_extracted(&extracted, Some(title))
        }
    };
    if let Some(source) = source {
        request.source = source;
    }

    let id = uploader
        .store(&request)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message("Failed to store document")))?;

    println!("{}", alert_text(uploader.alert()));
    if let Some(id) = id {
        println!("  id: {}", id);
    }
    Ok(())
}

// ============ helpers ============

fn alert_text(alert: Option<crate::ui::Alert>) -> String {
    alert.map(|a| a.to_string()).unwrap_or_default()
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
