//! Webhook calls.
//!
//! GET requests carry the upstream value as the `data` query parameter;
//! every other method sends it JSON-serialized as the body. A non-2xx
//! answer fails the step with the status code and text.

use log::debug;
use serde_json::Value;

use super::value_as_text;
use crate::error::StepError;
use crate::execution::step::StepResult;
use crate::host::{Host, HttpRequest};
use crate::workflow::model::WebhookConfig;

/// Query parameter name used for GET requests.
pub const QUERY_PARAM: &str = "data";

/// Sends the upstream value to the configured endpoint.
pub async fn call(
    config: &WebhookConfig,
    upstream: &Value,
    host: &dyn Host,
) -> Result<StepResult, StepError> {
    let endpoint = config
        .endpoint
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or(StepError::MissingConfig { field: "endpoint" })?;
    let method = config
        .method
        .as_deref()
        .map(|m| m.trim().to_ascii_uppercase())
        .filter(|m| !m.is_empty())
        .ok_or(StepError::MissingConfig { field: "method" })?;

    let mut request = if method == "GET" {
        HttpRequest::new(&method, with_query(endpoint, &value_as_text(upstream)))
    } else {
        HttpRequest::new(&method, endpoint)
            .with_header("Content-Type", "application/json")
            .with_body(serde_json::to_string(upstream)?)
    };
    for (name, value) in &config.headers {
        request = request.with_header(name, value);
    }

    debug!("Webhook {} {}", method, request.url);
    let response = host.fetch(request).await?;

    if !response.is_success() {
        return Err(StepError::HttpStatus {
            status: response.status,
            status_text: response.status_text,
        });
    }

    let output = serde_json::from_str::<Value>(&response.body)
        .unwrap_or_else(|_| Value::String(response.body.clone()));

    Ok(StepResult::new(
        output,
        format!("{} {} answered {}", method, endpoint, response.status),
    ))
}

/// Appends `data=<value>` to the URL, keeping any existing query.
fn with_query(endpoint: &str, value: &str) -> String {
    let separator = if endpoint.contains('?') { '&' } else { '?' };
    format!(
        "{}{}{}={}",
        endpoint,
        separator,
        QUERY_PARAM,
        urlencoding::encode(value)
    )
}
