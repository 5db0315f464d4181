//! Scripted host used by unit tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value;

use super::{Generation, GenerationRequest, Host, HttpRequest, HttpResponse, PageContent};
use crate::error::HostError;

/// A host whose answers are fixed up front and whose calls are recorded.
pub struct ScriptedHost {
    pub page_url: String,
    pub page_text: String,
    pub grant_permission: bool,
    /// Response to every fetch; `Err` simulates a transport failure
    pub fetch_result: Result<HttpResponse, HostError>,
    /// Chunks returned by generation, streamed when the request asks for it
    pub generation_chunks: Vec<String>,
    pub generation_error: Option<HostError>,
    pub audio: Option<Value>,

    pub fetched: Mutex<Vec<HttpRequest>>,
    pub generations: Mutex<Vec<GenerationRequest>>,
    pub opened_tabs: Mutex<Vec<String>>,
    pub extractions: Mutex<usize>,
}

impl Default for ScriptedHost {
    fn default() -> Self {
        Self {
            page_url: "https://example.com/article".to_string(),
            page_text: "Page body".to_string(),
            grant_permission: true,
            fetch_result: Ok(HttpResponse {
                status: 200,
                status_text: "OK".to_string(),
                body: String::new(),
            }),
            generation_chunks: vec!["Hello".to_string(), ", world".to_string()],
            generation_error: None,
            audio: None,
            fetched: Mutex::new(Vec::new()),
            generations: Mutex::new(Vec::new()),
            opened_tabs: Mutex::new(Vec::new()),
            extractions: Mutex::new(0),
        }
    }
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fetch_result(mut self, result: Result<HttpResponse, HostError>) -> Self {
        self.fetch_result = result;
        self
    }

    pub fn with_chunks(mut self, chunks: &[&str]) -> Self {
        self.generation_chunks = chunks.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn last_fetch(&self) -> Option<HttpRequest> {
        self.fetched.lock().unwrap().last().cloned()
    }

    pub fn last_generation(&self) -> Option<GenerationRequest> {
        self.generations.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Host for ScriptedHost {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn active_page_url(&self) -> Result<String, HostError> {
        Ok(self.page_url.clone())
    }

    async fn request_origin_permission(&self, _origin: &str) -> Result<bool, HostError> {
        Ok(self.grant_permission)
    }

    async fn extract_page_content(&self) -> Result<PageContent, HostError> {
        *self.extractions.lock().unwrap() += 1;
        Ok(PageContent {
            url: self.page_url.clone(),
            title: Some("Example".to_string()),
            text: self.page_text.clone(),
        })
    }

    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, HostError> {
        self.fetched.lock().unwrap().push(request);
        self.fetch_result.clone()
    }

    async fn open_tab(&self, url: &str) -> Result<(), HostError> {
        self.opened_tabs.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn generate(&self, request: GenerationRequest) -> Result<Generation, HostError> {
        let streaming = request.stream;
        self.generations.lock().unwrap().push(request);

        if let Some(err) = &self.generation_error {
            return Err(err.clone());
        }

        if streaming {
            let chunks: Vec<Result<String, HostError>> =
                self.generation_chunks.iter().cloned().map(Ok).collect();
            Ok(Generation::Stream(stream::iter(chunks).boxed()))
        } else {
            Ok(Generation::Complete(self.generation_chunks.concat()))
        }
    }

    async fn capture_audio(&self, _duration: Option<Duration>) -> Result<Value, HostError> {
        self.audio
            .clone()
            .ok_or_else(|| HostError::unsupported("Audio capture"))
    }
}
