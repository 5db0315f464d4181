//! Individual Step Execution
//!
//! The executor registry: one exhaustive match from [`StepKind`] to the
//! handler for that kind. Handlers receive the step's typed config, the
//! upstream value and the host, and return a [`StepResult`]. They never
//! write to the data bag or the step record; the engine does.

use std::fmt;

use serde_json::Value;

use super::budget::TokenBudget;
use super::handlers;
use crate::error::StepError;
use crate::host::Host;
use crate::workflow::model::{Step, StepKind};

/// Result envelope returned by every executor.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// Value handed to the next step
    pub output: Value,
    /// Human-readable summary appended to the step's logs
    pub log: String,
    /// Boolean label produced by conditional steps
    pub branch: Option<bool>,
    /// False when the step passed a value through but flagged it as invalid
    pub success: bool,
}

impl StepResult {
    pub fn new(output: Value, log: impl Into<String>) -> Self {
        Self {
            output,
            log: log.into(),
            branch: None,
            success: true,
        }
    }

    pub fn with_branch(mut self, branch: bool) -> Self {
        self.branch = Some(branch);
        self
    }

    /// Marks the result as a non-fatal failure.
    pub fn flagged(mut self) -> Self {
        self.success = false;
        self
    }

    /// Branch tag as text: `"true"` or `"false"`.
    pub fn branch_tag(&self) -> Option<&'static str> {
        self.branch.map(|b| if b { "true" } else { "false" })
    }
}

/// What a handler may use besides its own config and upstream value.
pub struct StepContext<'a> {
    pub host: &'a dyn Host,
    pub budget: &'a TokenBudget,
    /// Receives each streamed delta before the step completes
    pub on_delta: &'a mut dyn FnMut(&str),
}

impl fmt::Debug for StepContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepContext")
            .field("host", &self.host.name())
            .field("budget", self.budget)
            .finish_non_exhaustive()
    }
}

/// Executes a single step against its upstream value.
///
/// # Returns
///
/// * `Ok(StepResult)` - The step produced a value (possibly flagged)
/// * `Err(StepError)` - The step failed; the run must stop here
pub async fn execute_step(
    step: &Step,
    upstream: Value,
    ctx: &mut StepContext<'_>,
) -> Result<StepResult, StepError> {
    match &step.kind {
        StepKind::ReadPage(config) => handlers::page::read_page(config, upstream, ctx.host).await,
        StepKind::OpenPage(config) => handlers::page::open_page(config, upstream, ctx.host).await,
        StepKind::SystemPrompt(config) => Ok(handlers::text::system_prompt(config, &upstream)),
        StepKind::ChatAgent(config) => handlers::generation::generate(config, &upstream, ctx).await,
        StepKind::PassThroughStore => Ok(handlers::text::pass_through(upstream)),
        StepKind::TextInput(config) => {
            Ok(handlers::text::text_input(config, step.materialized_value.as_ref(), &upstream))
        }
        StepKind::TextOutput => Ok(handlers::text::text_output(upstream)),
        StepKind::AudioInput(config) => {
            handlers::audio::audio_input(config, step.materialized_value.as_ref(), ctx.host).await
        }
        StepKind::Transcription(config) => {
            handlers::audio::transcribe(config, &upstream, ctx.host).await
        }
        StepKind::SpeechSynthesis(config) => {
            handlers::audio::synthesize(config, &upstream, ctx.host).await
        }
        StepKind::StringOp(config) => handlers::string_ops::apply(config, &upstream),
        StepKind::Conditional(config) => Ok(handlers::conditional::evaluate(config, upstream)),
        StepKind::Webhook(config) => handlers::webhook::call(config, &upstream, ctx.host).await,
        StepKind::OutputFormat(config) => Ok(handlers::output_format::validate(config)),
        StepKind::Iterator(config) => Ok(handlers::text::iterate(config, upstream)),
    }
}
