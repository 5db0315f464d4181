//! Generation agent.
//!
//! Fits the upstream prompt into the token budget, asks the host model for
//! a completion and, when the model streams, forwards the accumulated text
//! to the step context after every delta. With a merged response schema the
//! completion is parsed as JSON; text that does not parse is kept as text.

use futures::StreamExt;
use log::{debug, warn};
use serde_json::Value;

use super::value_as_text;
use crate::error::StepError;
use crate::execution::step::{StepContext, StepResult};
use crate::host::{Generation, GenerationRequest};
use crate::workflow::model::GenerationConfig;

/// System prompt used when the step configures none.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Runs one generation for the upstream prompt.
///
/// # Arguments
///
/// * `config` - Sampling parameters and the merged response schema, if any
/// * `upstream` - The prompt; non-string values are sent as JSON text
/// * `ctx` - Host, token budget and the streaming callback
pub async fn generate(
    config: &GenerationConfig,
    upstream: &Value,
    ctx: &mut StepContext<'_>,
) -> Result<StepResult, StepError> {
    let system_prompt = config
        .system_prompt
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SYSTEM_PROMPT)
        .to_string();
    let schema = config.response_schema.clone();

    let fitted = ctx
        .budget
        .fit(&value_as_text(upstream), &system_prompt, schema.as_ref());
    if fitted.truncated {
        warn!(
            "Prompt truncated to {} characters to fit the context window",
            fitted.ceiling
        );
    }

    let request = GenerationRequest {
        prompt: fitted.text,
        system_prompt,
        schema: schema.clone(),
        model: config.model.clone(),
        temperature: config.temperature,
        top_k: config.top_k,
        stream: config.stream,
    };

    let text = match ctx.host.generate(request).await? {
        Generation::Complete(text) => text,
        Generation::Stream(mut deltas) => {
            let mut accumulated = String::new();
            let mut chunks = 0usize;
            while let Some(delta) = deltas.next().await {
                accumulated.push_str(&delta?);
                chunks += 1;
                (ctx.on_delta)(&accumulated);
            }
            debug!("Received {} streamed chunks", chunks);
            accumulated
        }
    };

    let mut log = format!("Generated {} characters", text.chars().count());
    if fitted.truncated {
        log.push_str(" (prompt truncated)");
    }

    let output = match schema {
        Some(_) => match parse_structured(&text) {
            Some(value) => value,
            None => {
                warn!("Response did not match the requested format; keeping text");
                log.push_str("; response was not valid JSON");
                Value::String(text)
            }
        },
        None => Value::String(text),
    };

    Ok(StepResult::new(output, log))
}

/// Parses a model reply as JSON, tolerating a surrounding code fence.
fn parse_structured(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(body.trim()).ok()
}
