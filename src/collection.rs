//! Paginated document collection browser.
//!
//! Lists the documents stored in the knowledge base a page at a time,
//! tracks a selection for bulk deletion, and summarises collection
//! statistics. Wire types for the collection endpoints live here too.

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

use crate::client::ApiError;
use crate::ui::{Alert, Alerts, LoadingIndicators, Panel};

/// Page links shown around the current page.
const MAX_PAGE_LINKS: u32 = 5;

// ═══════════════════════════════════════════════════════════════════════
// Wire types
// ═══════════════════════════════════════════════════════════════════════

/// One stored document as returned by `GET /api/get-documents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(default)]
    pub payload: DocumentPayload,
}

/// Metadata the backend keeps alongside each document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub preview: Option<String>,
    /// ISO-8601 upload time, usually without an offset.
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub words: Option<u64>,
    #[serde(default)]
    pub chars: Option<u64>,
    /// Document size in bytes.
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentsPage {
    #[serde(default)]
    pub documents: Vec<DocumentRecord>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub per_page: u32,
    #[serde(default)]
    pub total_pages: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    #[serde(default)]
    pub vectors_count: u64,
    #[serde(default)]
    pub total_size: u64,
    #[serde(default)]
    pub total_size_formatted: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteSelectedResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub deleted_count: u64,
    #[serde(default)]
    pub total_requested: u64,
}

/// Point ids may be UUID strings or unsigned integers.
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "document id must be a string or number, got {}",
            other
        ))),
    }
}

/// The collection endpoints, as consumed by [`CollectionBrowser`].
#[async_trait]
pub trait CollectionBackend: Send + Sync {
    async fn get_documents(&self, page: u32, per_page: u32) -> Result<DocumentsPage, ApiError>;
    async fn collection_stats(&self) -> Result<CollectionStats, ApiError>;
    async fn delete_document(&self, id: &str) -> Result<(), ApiError>;
    async fn delete_selected(&self, ids: &[String]) -> Result<DeleteSelectedResponse, ApiError>;
}

// ═══════════════════════════════════════════════════════════════════════
// Display helpers
// ═══════════════════════════════════════════════════════════════════════

/// A document prepared for display, with every fallback applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentCard {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub date: String,
    pub source_type: String,
    pub source: String,
    pub words: u64,
    pub chars: u64,
    pub size: Option<String>,
    pub selected: bool,
}

impl DocumentRecord {
    pub fn card(&self, now: DateTime<Local>, selected: bool) -> DocumentCard {
        let p = &self.payload;
        DocumentCard {
            id: self.id.clone(),
            title: p.title.clone().unwrap_or_else(|| "Untitled Document".to_string()),
            preview: p
                .preview
                .clone()
                .unwrap_or_else(|| "No preview available".to_string()),
            date: p
                .timestamp
                .as_deref()
                .map(|ts| format_relative_date(ts, now))
                .unwrap_or_else(|| "Unknown date".to_string()),
            source_type: p.source_type.clone().unwrap_or_else(|| "unknown".to_string()),
            source: p.source.clone().unwrap_or_else(|| "Unknown source".to_string()),
            words: p.words.unwrap_or(0),
            chars: p.chars.unwrap_or(0),
            size: p.size.map(format_bytes),
            selected,
        }
    }
}

/// Header line values for the collection panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSummary {
    pub document_count: String,
    pub storage_size: String,
}

impl From<&CollectionStats> for StatsSummary {
    fn from(stats: &CollectionStats) -> Self {
        let n = stats.vectors_count;
        Self {
            document_count: format!("{} Document{}", n, if n == 1 { "" } else { "s" }),
            storage_size: stats
                .total_size_formatted
                .clone()
                .unwrap_or_else(|| "0 KB".to_string()),
        }
    }
}

/// Format an upload timestamp relative to `now`.
///
/// Under a week old: `just now`, `3 minutes ago`, `1 hour ago`, `2 days ago`.
/// Older: `Oct 19, 2026`. Unparseable input is returned as-is.
pub fn format_relative_date(timestamp: &str, now: DateTime<Local>) -> String {
    let Some(date) = parse_timestamp(timestamp) else {
        return timestamp.to_string();
    };

    let diff_sec = (now - date).num_seconds();
    let diff_min = diff_sec.div_euclid(60);
    let diff_hour = diff_min.div_euclid(60);
    let diff_day = diff_hour.div_euclid(24);

    if diff_day < 1 {
        if diff_hour < 1 {
            if diff_min < 1 {
                return "just now".to_string();
            }
            return format!("{} minute{} ago", diff_min, plural(diff_min));
        }
        return format!("{} hour{} ago", diff_hour, plural(diff_hour));
    }
    if diff_day < 7 {
        return format!("{} day{} ago", diff_day, plural(diff_day));
    }
    date.format("%b %-d, %Y").to_string()
}

fn plural(n: i64) -> &'static str {
    if n > 1 {
        "s"
    } else {
        ""
    }
}

fn parse_timestamp(ts: &str) -> Option<DateTime<Local>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Local));
    }
    // Offset-less timestamps are local time.
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
}

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Pagination
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub page: u32,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub prev: Option<u32>,
    pub pages: Vec<PageLink>,
    pub next: Option<u32>,
}

/// Page links for `current` of `total`. `None` when there is one page or fewer.
pub fn paginate(current: u32, total: u32) -> Option<Pagination> {
    if total <= 1 {
        return None;
    }
    let start = current.saturating_sub(MAX_PAGE_LINKS / 2).max(1);
    let end = total.min(start + MAX_PAGE_LINKS - 1);
    Some(Pagination {
        prev: (current > 1).then(|| current - 1),
        pages: (start..=end)
            .map(|page| PageLink {
                page,
                active: page == current,
            })
            .collect(),
        next: (current < total).then(|| current + 1),
    })
}

impl std::fmt::Display for Pagination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", if self.prev.is_some() { "«" } else { " " })?;
        for link in &self.pages {
            if link.active {
                write!(f, " [{}]", link.page)?;
            } else {
                write!(f, " {}", link.page)?;
            }
        }
        write!(f, " {}", if self.next.is_some() { "»" } else { " " })
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Browser
// ═══════════════════════════════════════════════════════════════════════

/// State of the collection panel.
pub struct CollectionBrowser<B> {
    backend: B,
    per_page: u32,
    current_page: u32,
    total_pages: u32,
    documents: Vec<DocumentRecord>,
    selected: BTreeSet<String>,
    stats: Option<CollectionStats>,
    loading: LoadingIndicators,
    alerts: Alerts,
}

impl<B: CollectionBackend> CollectionBrowser<B> {
    pub fn new(backend: B, per_page: u32) -> Self {
        Self {
            backend,
            per_page: per_page.max(1),
            current_page: 1,
            total_pages: 1,
            documents: Vec::new(),
            selected: BTreeSet::new(),
            stats: None,
            loading: LoadingIndicators::new(),
            alerts: Alerts::new(),
        }
    }

    /// Share loading indicators and alerts with the rest of the UI.
    pub fn with_ui(mut self, loading: LoadingIndicators, alerts: Alerts) -> Self {
        self.loading = loading;
        self.alerts = alerts;
        self
    }

    /// Load `page`. Clears the selection. Failures become an alert and
    /// leave the previous documents in place.
    pub async fn load(&mut self, page: u32) -> bool {
        let page = page.max(1);
        self.current_page = page;
        let _loading = self.loading.begin(Panel::Collection);

        match self.backend.get_documents(page, self.per_page).await {
            Ok(result) => {
                tracing::debug!(page, count = result.documents.len(), "loaded documents");
                self.total_pages = result.total_pages.max(1);
                self.selected.clear();
                self.documents = result.documents;
                true
            }
            Err(e) => {
                self.alerts.show(
                    Panel::Collection,
                    Alert::error(e.user_message("Failed to load documents")),
                );
                false
            }
        }
    }

    /// Refresh the statistics header. Failures are logged only.
    pub async fn refresh_stats(&mut self) -> Option<StatsSummary> {
        match self.backend.collection_stats().await {
            Ok(stats) => {
                let summary = StatsSummary::from(&stats);
                self.stats = Some(stats);
                Some(summary)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load collection stats");
                None
            }
        }
    }

    /// Reload the current page and the statistics.
    pub async fn refresh(&mut self) {
        self.reload_current().await;
        self.refresh_stats().await;
    }

    pub fn toggle_selection(&mut self, id: &str, selected: bool) {
        if selected {
            self.selected.insert(id.to_string());
        } else {
            self.selected.remove(id);
        }
    }

    pub async fn delete_document(&mut self, id: &str) -> bool {
        let result = {
            let _loading = self.loading.begin(Panel::Collection);
            self.backend.delete_document(id).await
        };
        match result {
            Ok(()) => {
                self.selected.remove(id);
                self.refresh().await;
                self.alerts.show(
                    Panel::Collection,
                    Alert::success("Document deleted successfully"),
                );
                true
            }
            Err(e) => {
                self.alerts.show(
                    Panel::Collection,
                    Alert::error(e.user_message("Failed to delete document")),
                );
                false
            }
        }
    }

    /// Delete every selected document in one request.
    pub async fn delete_selected(&mut self) -> Option<u64> {
        if self.selected.is_empty() {
            self.alerts
                .show(Panel::Collection, Alert::error("No documents selected"));
            return None;
        }
        let ids: Vec<String> = self.selected.iter().cloned().collect();
        let result = {
            let _loading = self.loading.begin(Panel::Collection);
            self.backend.delete_selected(&ids).await
        };
        match result {
            Ok(resp) => {
                self.selected.clear();
                self.refresh().await;
                self.alerts.show(
                    Panel::Collection,
                    Alert::success(format!(
                        "Successfully deleted {} document(s)",
                        resp.deleted_count
                    )),
                );
                Some(resp.deleted_count)
            }
            Err(e) => {
                self.alerts.show(
                    Panel::Collection,
                    Alert::error(e.user_message("Failed to delete documents")),
                );
                None
            }
        }
    }

    /// Reload the current page, stepping back if deletions emptied it.
    async fn reload_current(&mut self) {
        if self.load(self.current_page).await
            && self.documents.is_empty()
            && self.current_page > self.total_pages
        {
            self.load(self.total_pages).await;
        }
    }

    pub fn cards(&self, now: DateTime<Local>) -> Vec<DocumentCard> {
        self.documents
            .iter()
            .map(|d| d.card(now, self.selected.contains(&d.id)))
            .collect()
    }

    pub fn pagination(&self) -> Option<Pagination> {
        paginate(self.current_page, self.total_pages)
    }

    pub fn documents(&self) -> &[DocumentRecord] {
        &self.documents
    }

    pub fn selected(&self) -> impl Iterator<Item = &str> {
        self.selected.iter().map(String::as_str)
    }

    /// Bulk delete is only offered while something is selected.
    pub fn can_delete_selected(&self) -> bool {
        !self.selected.is_empty()
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn stats(&self) -> Option<&CollectionStats> {
        self.stats.as_ref()
    }

    pub fn alert(&self) -> Option<Alert> {
        self.alerts.current(Panel::Collection)
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_loading(Panel::Collection)
    }
}
