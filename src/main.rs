//! # kbchat CLI
//!
//! Chat with a knowledge-base backend from the terminal and manage the
//! documents it answers from.
//!
//! ## Usage
//!
//! ```bash
//! kbchat --config ./config/kbchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kbchat chat "<question>"` | Ask one question, print the answer and its citations |
//! | `kbchat repl` | Interactive conversation with `/cite`, `/close`, `/clear`, `/quit` |
//! | `kbchat render <file>` | Render a saved `/api/chat` response offline |
//! | `kbchat docs list` | List stored documents, one page at a time |
//! | `kbchat docs delete <id>...` | Delete documents |
//! | `kbchat stats` | Show collection statistics |
//! | `kbchat extract` | Extract text from a file or URL |
//! | `kbchat store` | Store a document in the knowledge base |
//!
//! ## Examples
//!
//! ```bash
//! # Ask with web search enabled
//! kbchat chat "What changed in the 2.0 release?" --web
//!
//! # Page through the collection
//! kbchat docs list --page 2
//!
//! # Extract a PDF and store it under a title
//! kbchat store --title "Handbook" --kind pdf --file handbook.pdf
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kbchat::commands::{self, SearchFlags, SourceArg, StoreInput};
use kbchat::config;
use kbchat::upload::SourceKind;

/// kbchat: chat with a knowledge base and manage its documents.
///
/// Network commands read the backend address from `--config` (or the
/// `KBCHAT_BASE_URL` environment variable). A missing config file means
/// defaults.
#[derive(Parser)]
#[command(name = "kbchat", version, about = "Chat with a knowledge base, with numbered citations")]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/kbchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question.
    Chat {
        /// The question to send.
        message: String,

        /// Also search the web.
        #[arg(long)]
        web: bool,

        /// Do not search the knowledge base.
        #[arg(long)]
        no_knowledge: bool,

        /// Print message and citation markup instead of plain text.
        #[arg(long)]
        html: bool,
    },

    /// Interactive conversation on stdin.
    Repl {
        /// Also search the web.
        #[arg(long)]
        web: bool,

        /// Do not search the knowledge base.
        #[arg(long)]
        no_knowledge: bool,
    },

    /// Render a saved `/api/chat` JSON response without a backend.
    Render {
        /// Path to the response JSON.
        path: PathBuf,

        /// Print markup instead of plain text.
        #[arg(long)]
        html: bool,
    },

    /// Browse and delete stored documents.
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },

    /// Show collection statistics.
    Stats,

    /// Extract text from a file or URL and print it.
    Extract {
        /// Source type: text, pdf, youtube, audio, image, website.
        #[arg(long)]
        kind: SourceKind,

        /// Local file to upload (text, pdf, audio, image).
        #[arg(long, conflicts_with = "url", required_unless_present = "url")]
        file: Option<PathBuf>,

        /// URL to fetch (youtube, website).
        #[arg(long)]
        url: Option<String>,
    },

    /// Store a document in the knowledge base.
    ///
    /// With `--text` the text is stored as typed. With `--file` or `--url`
    /// the content is extracted first, using `--kind` (default: inferred
    /// from the file extension, website for URLs).
    Store {
        /// Document title.
        #[arg(long)]
        title: String,

        /// Literal document text.
        #[arg(long, conflicts_with_all = ["file", "url"], required_unless_present_any = ["file", "url"])]
        text: Option<String>,

        /// Local file to extract.
        #[arg(long, conflicts_with = "url")]
        file: Option<PathBuf>,

        /// URL to extract.
        #[arg(long)]
        url: Option<String>,

        /// Source type used for extraction.
        #[arg(long)]
        kind: Option<SourceKind>,

        /// Override the recorded source.
        #[arg(long)]
        source: Option<String>,
    },
}

#[derive(Subcommand)]
enum DocsAction {
    /// List one page of documents.
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Documents per page (default from `[collection].per_page`).
        #[arg(long)]
        per_page: Option<u32>,
    },

    /// Delete documents by id.
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,

        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kbchat=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Offline; no config needed
    if let Commands::Render { path, html } = &cli.command {
        return commands::run_render(path, *html);
    }

    let cfg = config::load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Chat {
            message,
            web,
            no_knowledge,
            html,
        } => {
            commands::run_chat(&cfg, &message, SearchFlags { web, no_knowledge }, html).await?;
        }
        Commands::Repl { web, no_knowledge } => {
            commands::run_repl(&cfg, SearchFlags { web, no_knowledge }).await?;
        }
        Commands::Render { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
        Commands::Docs { action } => match action {
            DocsAction::List { page, per_page } => {
                commands::run_docs_list(&cfg, page, per_page).await?;
            }
            DocsAction::Delete { ids, yes } => {
                commands::run_docs_delete(&cfg, &ids, yes).await?;
            }
        },
        Commands::Stats => {
            commands::run_stats(&cfg).await?;
        }
        Commands::Extract { kind, file, url } => {
            commands::run_extract(&cfg, kind, source_arg(file, url)).await?;
        }
        Commands::Store {
            title,
            text,
            file,
            url,
            kind,
            source,
        } => {
            let input = match text {
                Some(text) => StoreInput::Text(text),
                None => StoreInput::extract(kind, source_arg(file, url)),
            };
            commands::run_store(&cfg, &title, input, source).await?;
        }
    }

    Ok(())
}

/// clap guarantees exactly one of the two is present.
fn source_arg(file: Option<PathBuf>, url: Option<String>) -> SourceArg {
    match file {
        Some(path) => SourceArg::File(path),
        None => SourceArg::Url(url.unwrap_or_default()),
    }
}
