//! Command-Line Host
//!
//! A constrained host for running pipelines outside a browser:
//! - The "active page" is whatever URL was passed with `--page`
//! - Page reads and webhooks go over HTTP with `ureq`
//! - Generation targets an OpenAI-compatible chat-completions endpoint,
//!   streaming server-sent events back through a channel
//! - Opening a tab only logs the URL
//!
//! Blocking HTTP work runs on tokio's blocking pool so the engine's
//! cooperative loop is never stalled on a socket.
//!
//! # Environment
//!
//! - `STEPLINE_LM_ENDPOINT`: chat-completions URL (default: local Ollama)
//! - `STEPLINE_LM_API_KEY`: bearer token, if the endpoint needs one
//! - `STEPLINE_LM_MODEL`: model used when a step doesn't name one

use std::env;
use std::io::{BufRead, BufReader};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::{Generation, GenerationRequest, Host, HttpRequest, HttpResponse, PageContent};
use crate::error::HostError;
use crate::workflow::wildcards::origin_of;

/// Default OpenAI-compatible endpoint (a local Ollama server).
const DEFAULT_LM_ENDPOINT: &str = "http://localhost:11434/v1/chat/completions";

const DEFAULT_LM_MODEL: &str = "llama3.2";

/// Buffered deltas between the reader thread and the engine.
const STREAM_BUFFER: usize = 64;

/// Model endpoint settings, read once from the environment.
pub static LM_SETTINGS: Lazy<LmSettings> = Lazy::new(LmSettings::from_env);

/// Where and how to reach the language model.
#[derive(Debug, Clone, PartialEq)]
pub struct LmSettings {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl LmSettings {
    /// Reads `STEPLINE_LM_*` variables, falling back to a local endpoint.
    pub fn from_env() -> Self {
        let endpoint = env::var("STEPLINE_LM_ENDPOINT")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LM_ENDPOINT.to_string());
        let api_key = env::var("STEPLINE_LM_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let model = env::var("STEPLINE_LM_MODEL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LM_MODEL.to_string());

        Self {
            endpoint,
            api_key,
            model,
        }
    }
}

/// Host used by the `stepline` binary.
#[derive(Debug, Clone)]
pub struct CliHost {
    page_url: Option<String>,
    lm: LmSettings,
}

impl CliHost {
    /// Creates a host with the environment's model settings and no active page.
    pub fn new() -> Self {
        Self {
            page_url: None,
            lm: LM_SETTINGS.clone(),
        }
    }

    /// Sets the URL treated as the active page.
    pub fn set_page_url(&mut self, url: impl Into<String>) {
        self.page_url = Some(url.into());
    }

    /// Replaces the model settings read from the environment.
    pub fn set_lm_settings(&mut self, settings: LmSettings) {
        self.lm = settings;
    }

    fn page_url(&self) -> Result<&str, HostError> {
        self.page_url.as_deref().ok_or_else(|| HostError::Unsupported {
            capability: "Page access".to_string(),
            hint: "Pass --page URL to choose the page to read.".to_string(),
        })
    }
}

impl Default for CliHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Host for CliHost {
    fn name(&self) -> &str {
        "cli"
    }

    async fn active_page_url(&self) -> Result<String, HostError> {
        self.page_url().map(str::to_string)
    }

    async fn request_origin_permission(&self, origin: &str) -> Result<bool, HostError> {
        let granted = origin.starts_with("https://") || origin.starts_with("http://");
        debug!("Origin permission for {}: {}", origin, granted);
        Ok(granted)
    }

    async fn extract_page_content(&self) -> Result<PageContent, HostError> {
        let url = self.page_url()?.to_string();
        let response = self.fetch(HttpRequest::new("GET", url.clone())).await?;

        if !response.is_success() {
            return Err(HostError::Network(format!(
                "Page {} answered {} {}",
                url, response.status, response.status_text
            )));
        }

        Ok(PageContent {
            title: extract_title(&response.body),
            text: html_to_text(&response.body),
            url,
        })
    }

    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, HostError> {
        debug!("{} {}", request.method, request.url);
        run_blocking(move || send_request(&request)).await
    }

    async fn open_tab(&self, url: &str) -> Result<(), HostError> {
        if origin_of(url).is_none() {
            return Err(HostError::Io(format!("Cannot open '{}': not an absolute URL", url)));
        }
        info!("Open in browser: {}", url);
        Ok(())
    }

    async fn generate(&self, request: GenerationRequest) -> Result<Generation, HostError> {
        let body = chat_completion_body(&self.lm, &request);
        let endpoint = self.lm.endpoint.clone();
        let api_key = self.lm.api_key.clone();

        if !request.stream {
            let text = run_blocking(move || {
                let response = lm_request(&endpoint, api_key.as_deref())
                    .send_json(body)
                    .map_err(lm_error)?;
                let reply: Value = response
                    .into_json()
                    .map_err(|e| HostError::Generation(format!("Unreadable response: {}", e)))?;
                parse_completion(&reply)
            })
            .await?;
            return Ok(Generation::Complete(text));
        }

        let (tx, rx) = mpsc::channel::<Result<String, HostError>>(STREAM_BUFFER);

        tokio::task::spawn_blocking(move || {
            let response = match lm_request(&endpoint, api_key.as_deref()).send_json(body) {
                Ok(response) => response,
                Err(e) => {
                    let _ = tx.blocking_send(Err(lm_error(e)));
                    return;
                }
            };

            for line in BufReader::new(response.into_reader()).lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        let _ = tx.blocking_send(Err(HostError::Io(e.to_string())));
                        return;
                    }
                };

                match parse_sse_line(&line) {
                    SseEvent::Delta(text) => {
                        if tx.blocking_send(Ok(text)).is_err() {
                            return;
                        }
                    }
                    SseEvent::Done => return,
                    SseEvent::Ignore => {}
                }
            }
        });

        let deltas = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(Generation::Stream(deltas.boxed()))
    }
}

/// Runs blocking work on tokio's blocking pool.
async fn run_blocking<T, F>(work: F) -> Result<T, HostError>
where
    F: FnOnce() -> Result<T, HostError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| HostError::Io(format!("Background task failed: {}", e)))?
}

/// Performs an HTTP call; non-2xx statuses are returned, not raised.
fn send_request(request: &HttpRequest) -> Result<HttpResponse, HostError> {
    let mut call = ureq::request(&request.method, &request.url);
    for (name, value) in &request.headers {
        call = call.set(name, value);
    }

    let result = match &request.body {
        Some(body) => call.send_string(body),
        None => call.call(),
    };

    let response = match result {
        Ok(response) => response,
        Err(ureq::Error::Status(_, response)) => response,
        Err(ureq::Error::Transport(transport)) => {
            return Err(HostError::Network(transport.to_string()));
        }
    };

    let status = response.status();
    let status_text = response.status_text().to_string();
    let body = response
        .into_string()
        .map_err(|e| HostError::Io(format!("Failed to read response body: {}", e)))?;

    Ok(HttpResponse {
        status,
        status_text,
        body,
    })
}

fn lm_request(endpoint: &str, api_key: Option<&str>) -> ureq::Request {
    let request = ureq::post(endpoint).set("Content-Type", "application/json");
    match api_key {
        Some(key) => request.set("Authorization", &format!("Bearer {}", key)),
        None => request,
    }
}

fn lm_error(err: ureq::Error) -> HostError {
    match err {
        ureq::Error::Status(code, response) => {
            let detail = response.into_string().unwrap_or_default();
            HostError::Generation(format!("Model endpoint answered {}: {}", code, detail.trim()))
        }
        ureq::Error::Transport(transport) => HostError::Network(transport.to_string()),
    }
}

/// Builds an OpenAI-compatible chat-completions body.
fn chat_completion_body(settings: &LmSettings, request: &GenerationRequest) -> Value {
    let mut body = json!({
        "model": request.model.clone().unwrap_or_else(|| settings.model.clone()),
        "messages": [
            {"role": "system", "content": request.system_prompt},
            {"role": "user", "content": request.prompt},
        ],
        "stream": request.stream,
    });

    if let Some(temperature) = request.temperature {
        body["temperature"] = json!(temperature);
    }
    if let Some(top_k) = request.top_k {
        body["top_k"] = json!(top_k);
    }
    if let Some(schema) = &request.schema {
        body["response_format"] = json!({
            "type": "json_schema",
            "json_schema": {"name": "output", "schema": schema},
        });
    }

    body
}

/// Pulls the assistant message out of a non-streaming reply.
fn parse_completion(reply: &Value) -> Result<String, HostError> {
    reply["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| HostError::Generation("Response has no message content".to_string()))
}

#[derive(Debug, PartialEq)]
enum SseEvent {
    Delta(String),
    Done,
    Ignore,
}

/// Interprets one line of a server-sent event stream.
fn parse_sse_line(line: &str) -> SseEvent {
    let Some(data) = line.strip_prefix("data:") else {
        return SseEvent::Ignore;
    };
    let data = data.trim();

    if data == "[DONE]" {
        return SseEvent::Done;
    }

    match serde_json::from_str::<Value>(data) {
        Ok(chunk) => match chunk["choices"][0]["delta"]["content"].as_str() {
            Some(text) if !text.is_empty() => SseEvent::Delta(text.to_string()),
            _ => SseEvent::Ignore,
        },
        Err(e) => {
            warn!("Skipping malformed stream chunk: {}", e);
            SseEvent::Ignore
        }
    }
}

/// Returns the contents of the first `<title>` element.
fn extract_title(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let open = lower.find("<title")?;
    let start = open + lower[open..].find('>')? + 1;
    let end = start + lower[start..].find("</title>")?;
    let title = decode_entities(html[start..end].trim());
    (!title.is_empty()).then_some(title)
}

/// Reduces markup to whitespace-collapsed text, dropping scripts and styles.
fn html_to_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len() / 2);
    let mut rest = html;

    while let Some(start) = rest.find('<') {
        text.push_str(&rest[..start]);
        let tag = &rest[start..];
        let head = tag
            .get(..tag.len().min(8))
            .unwrap_or(tag)
            .to_ascii_lowercase();

        let closing = if head.starts_with("<script") {
            Some("</script>")
        } else if head.starts_with("<style") {
            Some("</style>")
        } else {
            None
        };

        rest = match closing {
            Some(close) => match tag.to_ascii_lowercase().find(close) {
                Some(pos) => &tag[pos + close.len()..],
                None => "",
            },
            None => match tag.find('>') {
                Some(end) => {
                    text.push(' ');
                    &tag[end + 1..]
                }
                None => "",
            },
        };
    }
    text.push_str(rest);

    decode_entities(&text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
