//! HTTP client for the knowledge-base backend.
//!
//! Wraps every endpoint the application consumes:
//!
//! | Method | Path | Used by |
//! |--------|------|---------|
//! | `POST` | `/api/chat` | chat view |
//! | `POST` | `/api/extract-content` | upload panel |
//! | `POST` | `/api/store-document` | upload panel |
//! | `GET` | `/api/get-documents` | collection browser |
//! | `GET` | `/api/get-collection-stats` | collection browser |
//! | `DELETE` | `/api/delete-document/{id}` | collection browser |
//! | `POST` | `/api/delete-selected-documents` | collection browser |
//!
//! # Error Contract
//!
//! Non-2xx responses carry `{"error": "<message>"}`. When the body cannot
//! be parsed (or has no `error` field) the failure is reported by status
//! alone. Requests are never retried.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

use crate::chat::ChatBackend;
use crate::collection::{
    CollectionBackend, CollectionStats, DeleteSelectedResponse, DocumentsPage,
};
use crate::config::ApiConfig;
use crate::models::{ChatRequest, ChatResponse, ErrorResponse};
use crate::upload::{
    ExtractPayload, SourceKind, StoreDocumentRequest, StoreDocumentResponse, UploadBackend,
};

/// Every way a backend call can fail.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    /// Non-2xx status with a structured `{"error": …}` body.
    #[error("{message}")]
    Backend { status: u16, message: String },
    /// Non-2xx status whose body could not be interpreted.
    #[error("HTTP error: {status}")]
    Status { status: u16 },
    /// 2xx status with a body of the wrong shape.
    #[error("invalid response from server: {0}")]
    Decode(String),
    /// Rejected before sending.
    #[error("{0}")]
    InvalidInput(String),
}

impl ApiError {
    /// Human-readable message for display.
    ///
    /// `fallback` replaces the bare status line when the server gave no
    /// usable error message.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Status { .. } => fallback.to_string(),
            other => other.to_string(),
        }
    }

    /// HTTP status, when a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Backend { status, .. } | ApiError::Status { status } => Some(*status),
            _ => None,
        }
    }
}

/// Async client for the backend API. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http: builder.build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError> {
        tracing::debug!(
            kb = request.use_knowledge_search,
            web = request.use_web_search,
            "POST /api/chat"
        );
        let resp = self
            .http
            .post(self.url("/api/chat"))
            .json(request)
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn extract_content(
        &self,
        kind: SourceKind,
        payload: ExtractPayload,
    ) -> Result<String, ApiError> {
        #[derive(serde::Deserialize)]
        struct Extracted {
            content: String,
        }

        let form = Form::new().text("source_type", kind.as_str());
        let form = match payload {
            ExtractPayload::File { file_name, bytes } => {
                form.part("file", Part::bytes(bytes).file_name(file_name))
            }
            ExtractPayload::Url(url) => form.text("url", url),
        };
        let resp = self
            .http
            .post(self.url("/api/extract-content"))
            .multipart(form)
            .send()
            .await?;
        let extracted: Extracted = decode(resp).await?;
        Ok(extracted.content)
    }

    pub async fn store_document(
        &self,
        request: &StoreDocumentRequest,
    ) -> Result<StoreDocumentResponse, ApiError> {
        let resp = self
            .http
            .post(self.url("/api/store-document"))
            .json(request)
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn get_documents(&self, page: u32, per_page: u32) -> Result<DocumentsPage, ApiError> {
        let resp = self
            .http
            .get(self.url("/api/get-documents"))
            .query(&[("page", page), ("per_page", per_page)])
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn collection_stats(&self) -> Result<CollectionStats, ApiError> {
        let resp = self
            .http
            .get(self.url("/api/get-collection-stats"))
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn delete_document(&self, id: &str) -> Result<(), ApiError> {
        if id.trim().is_empty() {
            return Err(ApiError::InvalidInput("document id must not be empty".into()));
        }
        let mut url = reqwest::Url::parse(&self.url("/api/delete-document"))
            .map_err(|e| ApiError::InvalidInput(format!("invalid base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidInput("invalid base URL".into()))?
            .push(id);
        let resp = self.http.delete(url).send().await?;
        let _: serde_json::Value = decode(resp).await?;
        Ok(())
    }

    pub async fn delete_selected(&self, ids: &[String]) -> Result<DeleteSelectedResponse, ApiError> {
        let resp = self
            .http
            .post(self.url("/api/delete-selected-documents"))
            .json(&serde_json::json!({ "ids": ids }))
            .send()
            .await?;
        decode(resp).await
    }
}

/// Turn a response into `T`, or into the matching [`ApiError`].
async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
    let status = resp.status();
    let body = resp.bytes().await?;

    if !status.is_success() {
        let err = match serde_json::from_slice::<ErrorResponse>(&body) {
            Ok(ErrorResponse {
                error: Some(message),
            }) if !message.is_empty() => ApiError::Backend {
                status: status.as_u16(),
                message,
            },
            _ => ApiError::Status {
                status: status.as_u16(),
            },
        };
        tracing::warn!(status = status.as_u16(), error = %err, "backend request failed");
        return Err(err);
    }

    serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

// ============ Backend trait impls ============

#[async_trait]
impl ChatBackend for ApiClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError> {
        ApiClient::chat(self, request).await
    }
}

#[async_trait]
impl CollectionBackend for ApiClient {
    async fn get_documents(&self, page: u32, per_page: u32) -> Result<DocumentsPage, ApiError> {
        ApiClient::get_documents(self, page, per_page).await
    }

    async fn collection_stats(&self) -> Result<CollectionStats, ApiError> {
        ApiClient::collection_stats(self).await
    }

    async fn delete_document(&self, id: &str) -> Result<(), ApiError> {
        ApiClient::delete_document(self, id).await
    }

    async fn delete_selected(&self, ids: &[String]) -> Result<DeleteSelectedResponse, ApiError> {
        ApiClient::delete_selected(self, ids).await
    }
}

#[async_trait]
impl UploadBackend for ApiClient {
    async fn extract_content(
        &self,
        kind: SourceKind,
        payload: ExtractPayload,
    ) -> Result<String, ApiError> {
        ApiClient::extract_content(self, kind, payload).await
    }

    async fn store_document(
        &self,
        request: &StoreDocumentRequest,
    ) -> Result<StoreDocumentResponse, ApiError> {
        ApiClient::store_document(self, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_fallback_only_for_bare_status() {
        let backend = ApiError::Backend {
            status: 500,
            message: "overloaded".into(),
        };
        assert_eq!(backend.user_message("Failed to get response"), "overloaded");
        assert_eq!(backend.status(), Some(500));

        let bare = ApiError::Status { status: 502 };
        assert_eq!(bare.to_string(), "HTTP error: 502");
        assert_eq!(bare.user_message("Failed to get response"), "Failed to get response");

        let invalid = ApiError::InvalidInput("bad".into());
        assert_eq!(invalid.user_message("x"), "bad");
        assert_eq!(invalid.status(), None);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::new(&ApiConfig {
            base_url: "http://localhost:5000/".into(),
            timeout_secs: None,
        })
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000");
        assert_eq!(client.url("/api/chat"), "http://localhost:5000/api/chat");
    }
}
