//! Text plumbing executors: input, output, guidelines, pass-through, iterator.

use log::warn;
use serde_json::Value;

use super::value_as_text;
use crate::execution::step::StepResult;
use crate::workflow::model::{IteratorConfig, SystemPromptConfig, TextInputConfig};

/// Label that prefixes system-prompt output.
pub const GUIDELINES_LABEL: &str = "Guidelines:";

/// Prefix applied to text-input output.
pub const INPUT_TEXT_PREFIX: &str = "Input text: ";

/// Emits the step's literal text.
///
/// Text comes from the materialized value, then `config.text`, then upstream.
pub fn text_input(
    config: &TextInputConfig,
    materialized: Option<&Value>,
    upstream: &Value,
) -> StepResult {
    let text = materialized
        .map(value_as_text)
        .or_else(|| config.text.clone())
        .unwrap_or_else(|| value_as_text(upstream));

    let log = format!("Captured {} characters of input", text.chars().count());
    StepResult::new(Value::String(format!("{}{}", INPUT_TEXT_PREFIX, text)), log)
}

/// Prefixes upstream text with the configured guidelines.
pub fn system_prompt(config: &SystemPromptConfig, upstream: &Value) -> StepResult {
    let guidelines = format!("{} {}", GUIDELINES_LABEL, config.prompt.trim());
    let upstream_text = value_as_text(upstream);

    let output = if upstream_text.is_empty() {
        guidelines
    } else {
        format!("{}\n\n{}", guidelines, upstream_text)
    };

    StepResult::new(Value::String(output), "Applied system guidelines")
}

/// Hands the upstream value on unchanged for display.
pub fn text_output(upstream: Value) -> StepResult {
    let log = format!("Displayed {} characters", value_as_text(&upstream).chars().count());
    StepResult::new(upstream, log)
}

/// Keeps the upstream value so it can be published under the step's keys.
pub fn pass_through(upstream: Value) -> StepResult {
    StepResult::new(upstream, "Stored value")
}

/// Returns the first of `[upstream, items...]`.
///
/// Only the first item is produced: this host runs pipelines strictly once,
/// front to back, so there is no loop to feed the remaining items into.
pub fn iterate(config: &IteratorConfig, upstream: Value) -> StepResult {
    let mut items: Vec<Value> = Vec::with_capacity(config.items.len() + 1);
    if !upstream.is_null() {
        items.push(upstream);
    }
    items.extend(config.items.iter().cloned());

    let total = items.len();
    if total > 1 {
        warn!(
            "Iterator has {} items; full iteration is not supported in this host",
            total
        );
    }

    let first = items.into_iter().next().unwrap_or(Value::Null);
    StepResult::new(
        first,
        format!(
            "Produced item 1 of {}; full iteration is not supported in this host",
            total
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_input_prefers_materialized_value() {
        let config = TextInputConfig {
            text: Some("from config".to_string()),
        };
        let result = text_input(&config, Some(&json!("typed")), &json!("upstream"));
        assert_eq!(result.output, json!("Input text: typed"));
    }

    #[test]
    fn test_text_input_falls_back_to_config_then_upstream() {
        let config = TextInputConfig {
            text: Some("from config".to_string()),
        };
        assert_eq!(
            text_input(&config, None, &Value::Null).output,
            json!("Input text: from config")
        );
        assert_eq!(
            text_input(&TextInputConfig::default(), None, &json!("up")).output,
            json!("Input text: up")
        );
    }

    #[test]
    fn test_system_prompt_prefixes_upstream() {
        let config = SystemPromptConfig {
            prompt: " Be concise. ".to_string(),
        };
        let result = system_prompt(&config, &json!("Summarize this"));
        assert_eq!(
            result.output,
            json!("Guidelines: Be concise.\n\nSummarize this")
        );
    }

    #[test]
    fn test_system_prompt_without_upstream() {
        let config = SystemPromptConfig {
            prompt: "Be concise.".to_string(),
        };
        assert_eq!(
            system_prompt(&config, &Value::Null).output,
            json!("Guidelines: Be concise.")
        );
    }

    #[test]
    fn test_text_output_and_pass_through_keep_value() {
        assert_eq!(text_output(json!({"a": 1})).output, json!({"a": 1}));
        assert_eq!(pass_through(json!([1, 2])).output, json!([1, 2]));
    }

    #[test]
    fn test_iterator_returns_first_item() {
        let config = IteratorConfig {
            items: vec![json!("b"), json!("c")],
        };
        let result = iterate(&config, json!("a"));
        assert_eq!(result.output, json!("a"));
        assert!(result.log.contains("1 of 3"));
        assert!(result.log.contains("not supported"));
    }

    #[test]
    fn test_iterator_without_upstream() {
        let config = IteratorConfig {
            items: vec![json!("b")],
        };
        assert_eq!(iterate(&config, Value::Null).output, json!("b"));
        assert_eq!(
            iterate(&IteratorConfig::default(), Value::Null).output,
            Value::Null
        );
    }
}
