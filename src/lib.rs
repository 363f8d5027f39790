//! # kbchat
//!
//! Client for a knowledge-base chat service that answers with numbered
//! citations.
//!
//! The backend answers questions from a document collection (and
//! optionally the web) and returns the answer text together with the
//! sources it drew on. This crate turns those answers into display markup
//! whose `[n]` references open a per-message citation overlay, and drives
//! the collection and upload panels that manage the knowledge base itself.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  ChatResponse   ┌───────────┐  markup + ids  ┌──────────┐
//! │ ApiClient│────────────────▶│  ChatView  │───────────────▶│ Terminal │
//! │ (reqwest)│                 │ registry   │                │  / HTML  │
//! └────┬─────┘                 │ overlay    │◀── [n] click ──└──────────┘
//!      │                       └───────────┘
//!      ├──────────▶ CollectionBrowser (list, stats, delete)
//!      └──────────▶ Uploader (extract, store)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Citations, messages, chat wire types |
//! | [`citations`] | Legacy `[KBn]`/`[WEBn]` marker rewriting |
//! | [`format`] | Markdown-subset to markup transform |
//! | [`registry`] | Session-scoped message id → citations map |
//! | [`overlay`] | Citation detail overlay state machine |
//! | [`chat`] | Conversation state and submission flow |
//! | [`client`] | HTTP client for the backend API |
//! | [`collection`] | Document listing, pagination, deletion |
//! | [`upload`] | Content extraction and document storage |
//! | [`ui`] | Loading indicators and alerts |
//! | [`config`] | TOML configuration parsing |
//! | [`commands`] | CLI command runners |

pub mod chat;
pub mod citations;
pub mod client;
pub mod collection;
pub mod commands;
pub mod config;
pub mod format;
pub mod models;
pub mod overlay;
pub mod registry;
pub mod ui;
pub mod upload;
