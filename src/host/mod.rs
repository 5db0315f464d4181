//! Host Capabilities
//!
//! Executors never touch the network, the browser or a model directly;
//! they go through the [`Host`] trait. A host decides what it can offer:
//! the command-line host in [`cli`] reads pages and calls webhooks over
//! HTTP and talks to an OpenAI-compatible model endpoint, while audio
//! capture, transcription and speech synthesis stay unsupported.
//!
//! Missing capabilities are reported as [`HostError::Unsupported`], never
//! as silent no-ops.

pub mod cli;

#[cfg(test)]
pub mod testing;

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use serde_json::Value;

use crate::error::HostError;

pub use cli::{CliHost, LmSettings};

/// Text extracted from the active page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageContent {
    pub url: String,
    pub title: Option<String>,
    pub text: String,
}

/// An outgoing HTTP call.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl HttpResponse {
    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Everything a model needs for one generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    pub stream: bool,
}

/// Incremental text deltas produced by a streaming generation.
pub type DeltaStream = BoxStream<'static, Result<String, HostError>>;

/// Result of a generation call.
pub enum Generation {
    /// The whole response at once
    Complete(String),
    /// Partial-content deltas, to be concatenated in order
    Stream(DeltaStream),
}

impl std::fmt::Debug for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete(text) => f.debug_tuple("Complete").field(text).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Capabilities an executor may call out to.
#[async_trait]
pub trait Host: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &str {
        "host"
    }

    /// URL of the page the pipeline is attached to.
    async fn active_page_url(&self) -> Result<String, HostError>;

    /// Asks for access to an origin. `Ok(false)` means the user declined.
    async fn request_origin_permission(&self, origin: &str) -> Result<bool, HostError>;

    /// Extracts readable content from the active page.
    async fn extract_page_content(&self) -> Result<PageContent, HostError>;

    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, HostError>;

    /// Opens `url` in a new tab or window.
    async fn open_tab(&self, url: &str) -> Result<(), HostError>;

    async fn generate(&self, request: GenerationRequest) -> Result<Generation, HostError>;

    /// Records audio; the payload format is host-defined.
    async fn capture_audio(&self, _duration: Option<Duration>) -> Result<Value, HostError> {
        Err(HostError::unsupported("Audio capture"))
    }

    async fn transcribe(&self, _audio: &Value, _language: Option<&str>) -> Result<String, HostError> {
        Err(HostError::unsupported("Transcription"))
    }

    async fn synthesize_speech(&self, _text: &str, _voice: Option<&str>) -> Result<Value, HostError> {
        Err(HostError::unsupported("Speech synthesis"))
    }
}
