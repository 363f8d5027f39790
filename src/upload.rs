//! Document upload: extract text from a source, then store it.
//!
//! Ingestion is a two-step flow. The content of a file or URL is first sent
//! to the backend for extraction (plain text, PDF, audio transcription,
//! image OCR, YouTube transcript, or web page text); the extracted text can
//! then be reviewed and stored in the knowledge base under a title.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::client::ApiError;
use crate::ui::{Alert, Alerts, LoadingIndicators, Panel};

/// Kind of source content is extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Text,
    Pdf,
    Youtube,
    Audio,
    Image,
    Website,
}

impl SourceKind {
    pub const ALL: [SourceKind; 6] = [
        SourceKind::Text,
        SourceKind::Pdf,
        SourceKind::Youtube,
        SourceKind::Audio,
        SourceKind::Image,
        SourceKind::Website,
    ];

    /// `source_type` value on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Text => "text",
            SourceKind::Pdf => "pdf",
            SourceKind::Youtube => "youtube",
            SourceKind::Audio => "audio",
            SourceKind::Image => "image",
            SourceKind::Website => "website",
        }
    }

    /// Whether this kind is uploaded as a file (as opposed to a URL).
    pub fn takes_file(&self) -> bool {
        !matches!(self, SourceKind::Youtube | SourceKind::Website)
    }

    /// File kind whose accepted extensions include `path`'s extension.
    pub fn from_path(path: &Path) -> Option<SourceKind> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        SourceKind::ALL
            .into_iter()
            .find(|k| k.allowed_extensions().contains(&ext.as_str()))
    }

    /// Accepted file extensions (lowercase). Empty for URL kinds.
    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            SourceKind::Text => &["txt"],
            SourceKind::Pdf => &["pdf"],
            SourceKind::Audio => &["mp3", "wav"],
            SourceKind::Image => &["jpg", "jpeg", "png"],
            SourceKind::Youtube | SourceKind::Website => &[],
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!(
                    "unknown source kind '{}' (expected one of: text, pdf, youtube, audio, image, website)",
                    s
                )
            })
    }
}

/// What the user points the uploader at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadInput {
    File(PathBuf),
    Url(String),
}

/// Body sent to `POST /api/extract-content` alongside the source type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractPayload {
    File { file_name: String, bytes: Vec<u8> },
    Url(String),
}

/// Result of a successful extraction, ready to be reviewed and stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    pub kind: SourceKind,
    pub content: String,
    /// File name or URL.
    pub suggested_title: String,
    /// File name or URL, recorded as the document's source.
    pub source: String,
}

/// Body of `POST /api/store-document`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDocumentRequest {
    pub text: String,
    pub title: String,
    pub source_type: String,
    pub source: String,
}

impl StoreDocumentRequest {
    /// Text typed or pasted directly, with no extraction step.
    pub fn manual(text: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            title: title.into(),
            source_type: "manual".to_string(),
            source: "User input".to_string(),
        }
    }

    /// Store extracted content, optionally under a different title.
    pub fn from_extracted(extracted: &ExtractedContent, title: Option<&str>) -> Self {
        Self {
            text: extracted.content.clone(),
            title: title
                .map(str::to_string)
                .unwrap_or_else(|| extracted.suggested_title.clone()),
            source_type: extracted.kind.as_str().to_string(),
            source: extracted.source.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDocumentResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Please select a file")]
    MissingFile,
    #[error("Please enter a valid URL")]
    MissingUrl,
    #[error("unsupported file type for {kind} upload: {file} (allowed: {allowed})")]
    UnsupportedType {
        kind: SourceKind,
        file: String,
        allowed: String,
    },
    #[error("file is too large: {size} bytes (limit {max} bytes)")]
    TooLarge { size: u64, max: u64 },
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("No content to store")]
    EmptyContent,
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl UploadError {
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            UploadError::Api(e) => e.user_message(fallback),
            other => other.to_string(),
        }
    }
}

/// The upload endpoints, as consumed by [`Uploader`].
#[async_trait]
pub trait UploadBackend: Send + Sync {
    async fn extract_content(
        &self,
        kind: SourceKind,
        payload: ExtractPayload,
    ) -> Result<String, ApiError>;
    async fn store_document(
        &self,
        request: &StoreDocumentRequest,
    ) -> Result<StoreDocumentResponse, ApiError>;
}

/// Check that `input` fits `kind` before anything is read or sent.
pub fn validate_input(kind: SourceKind, input: &UploadInput) -> Result<(), UploadError> {
    match input {
        UploadInput::Url(url) if !kind.takes_file() => {
            if url.trim().is_empty() {
                return Err(UploadError::MissingUrl);
            }
            Ok(())
        }
        UploadInput::File(path) if kind.takes_file() => {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase)
                .unwrap_or_default();
            if !kind.allowed_extensions().contains(&ext.as_str()) {
                return Err(UploadError::UnsupportedType {
                    kind,
                    file: file_name(path),
                    allowed: kind.allowed_extensions().join(", "),
                });
            }
            Ok(())
        }
        UploadInput::Url(_) => Err(UploadError::MissingFile),
        UploadInput::File(_) => Err(UploadError::MissingUrl),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// State of the upload panel.
pub struct Uploader<B> {
    backend: B,
    max_upload_bytes: u64,
    loading: LoadingIndicators,
    alerts: Alerts,
}

impl<B: UploadBackend> Uploader<B> {
    pub fn new(backend: B, max_upload_bytes: u64) -> Self {
        Self {
            backend,
            max_upload_bytes,
            loading: LoadingIndicators::new(),
            alerts: Alerts::new(),
        }
    }

    pub fn with_ui(mut self, loading: LoadingIndicators, alerts: Alerts) -> Self {
        self.loading = loading;
        self.alerts = alerts;
        self
    }

    /// Extract the text of `input`. The outcome is also posted as an alert.
    pub async fn extract(
        &self,
        kind: SourceKind,
        input: &UploadInput,
    ) -> Result<ExtractedContent, UploadError> {
        let _loading = self.loading.begin(Panel::Upload);
        let result = self.extract_inner(kind, input).await;
        match &result {
            Ok(_) => self
                .alerts
                .show(Panel::Upload, Alert::success("Content extracted successfully")),
            Err(e) => self.alerts.show(
                Panel::Upload,
                Alert::error(e.user_message("Failed to extract content")),
            ),
        }
        result
    }

    async fn extract_inner(
        &self,
        kind: SourceKind,
        input: &UploadInput,
    ) -> Result<ExtractedContent, UploadError> {
        validate_input(kind, input)?;

        let (payload, label) = match input {
            UploadInput::File(path) => {
                let meta = tokio::fs::metadata(path).await.map_err(|e| UploadError::Io {
                    path: path.clone(),
                    source: e,
                })?;
                if meta.len() > self.max_upload_bytes {
                    return Err(UploadError::TooLarge {
                        size: meta.len(),
                        max: self.max_upload_bytes,
                    });
                }
                let bytes = tokio::fs::read(path).await.map_err(|e| UploadError::Io {
                    path: path.clone(),
                    source: e,
                })?;
                let name = file_name(path);
                (
                    ExtractPayload::File {
                        file_name: name.clone(),
                        bytes,
                    },
                    name,
                )
            }
            UploadInput::Url(url) => {
                let url = url.trim().to_string();
                (ExtractPayload::Url(url.clone()), url)
            }
        };

        tracing::debug!(%kind, source = %label, "extracting content");
        let content = self.backend.extract_content(kind, payload).await?;

        Ok(ExtractedContent {
            kind,
            content,
            suggested_title: label.clone(),
            source: label,
        })
    }

    /// Store a document and return its id (when the backend reports one).
    pub async fn store(
        &self,
        request: &StoreDocumentRequest,
    ) -> Result<Option<String>, UploadError> {
        if request.text.trim().is_empty() {
            let err = UploadError::EmptyContent;
            self.alerts
                .show(Panel::Upload, Alert::error(err.to_string()));
            return Err(err);
        }

        let mut request = request.clone();
        if request.title.trim().is_empty() {
            request.title = "Untitled Document".to_string();
        }

        let result = {
            let _loading = self.loading.begin(Panel::Upload);
            self.backend.store_document(&request).await
        };
        match result {
            Ok(resp) => {
                self.alerts
                    .show(Panel::Upload, Alert::success("Document stored successfully"));
                Ok(resp.id)
            }
            Err(e) => {
                let err = UploadError::from(e);
                self.alerts.show(
                    Panel::Upload,
                    Alert::error(err.user_message("Failed to store document")),
                );
                Err(err)
            }
        }
    }

    pub fn alert(&self) -> Option<Alert> {
        self.alerts.current(Panel::Upload)
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_loading(Panel::Upload)
    }
}
