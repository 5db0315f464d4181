//! Token Budget Policy
//!
//! Bounds the prompt sent to a generation step against the model's context
//! window. Capacity is reserved for the system prompt, any merged response
//! schema and a fixed overhead; the user prompt is truncated to whatever
//! remains, but never below a minimum character ceiling.
//!
//! Token counts are estimated from character counts. Swap in a real
//! tokenizer through [`TokenEstimator`]; the reserve-then-truncate shape of
//! the policy stays the same.

use log::debug;
use serde_json::Value;

/// Appended to a prompt that had to be cut.
pub const TRUNCATION_NOTE: &str = "\n\n[Content truncated to fit the model's context window]";

/// Estimates how many tokens a piece of text occupies.
pub trait TokenEstimator {
    fn estimate(&self, text: &str) -> usize;
}

/// Reserve-then-truncate limits for generation prompts.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBudget {
    /// Total context window, in tokens
    pub context_window: usize,
    /// Fixed reservation on top of system prompt and schema
    pub overhead_tokens: usize,
    /// Characters per token when estimating reserved text
    pub input_chars_per_token: usize,
    /// Characters per token when converting the remainder back to a ceiling
    pub output_chars_per_token: usize,
    /// Lowest character ceiling ever returned
    pub min_prompt_chars: usize,
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self {
            context_window: 4096,
            overhead_tokens: 100,
            input_chars_per_token: 4,
            output_chars_per_token: 3,
            min_prompt_chars: 1000,
        }
    }
}

impl TokenEstimator for TokenBudget {
    fn estimate(&self, text: &str) -> usize {
        let chars = text.chars().count();
        chars.div_ceil(self.input_chars_per_token.max(1))
    }
}

/// A prompt after the budget has been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedPrompt {
    pub text: String,
    pub truncated: bool,
    /// Character ceiling the prompt was fitted to
    pub ceiling: usize,
    pub reserved_tokens: usize,
}

impl TokenBudget {
    /// Tokens reserved for the system prompt, schema and overhead.
    pub fn reserved_tokens(
        &self,
        estimator: &dyn TokenEstimator,
        system_prompt: &str,
        schema: Option<&Value>,
    ) -> usize {
        let schema_tokens = schema
            .map(|s| estimator.estimate(&s.to_string()))
            .unwrap_or(0);
        estimator.estimate(system_prompt) + schema_tokens + self.overhead_tokens
    }

    /// Character ceiling left for the user prompt, floored at `min_prompt_chars`.
    pub fn prompt_ceiling(&self, reserved_tokens: usize) -> usize {
        let remaining = self.context_window.saturating_sub(reserved_tokens);
        (remaining * self.output_chars_per_token).max(self.min_prompt_chars)
    }

    /// Fits `prompt` using this budget's own character-ratio estimator.
    pub fn fit(&self, prompt: &str, system_prompt: &str, schema: Option<&Value>) -> FittedPrompt {
        self.fit_with(self, prompt, system_prompt, schema)
    }

    /// Fits `prompt` using an explicit estimator.
    pub fn fit_with(
        &self,
        estimator: &dyn TokenEstimator,
        prompt: &str,
        system_prompt: &str,
        schema: Option<&Value>,
    ) -> FittedPrompt {
        let reserved_tokens = self.reserved_tokens(estimator, system_prompt, schema);
        let ceiling = self.prompt_ceiling(reserved_tokens);
        let length = prompt.chars().count();

        if length <= ceiling {
            return FittedPrompt {
                text: prompt.to_string(),
                truncated: false,
                ceiling,
                reserved_tokens,
            };
        }

        let note_length = TRUNCATION_NOTE.chars().count();
        let text: String = if ceiling < note_length {
            // No room for the note: cut hard at the ceiling.
            prompt.chars().take(ceiling).collect()
        } else {
            let mut kept: String = prompt.chars().take(ceiling - note_length).collect();
            kept.push_str(TRUNCATION_NOTE);
            kept
        };

        debug!(
            "Prompt truncated from {} to {} characters ({} tokens reserved)",
            length, ceiling, reserved_tokens
        );

        FittedPrompt {
            text,
            truncated: true,
            ceiling,
            reserved_tokens,
        }
    }
}
