//! Workflow Data Model
//!
//! Core data structures representing pipeline steps and their configuration.
//!
//! # Example Descriptor Format
//!
//! ```yaml
//! steps:
//!   - id: question
//!     kind: textInput
//!     materializedValue: What is the capital of France?
//!
//!   - id: shape
//!     kind: outputFormat
//!     config:
//!       schema: '{"type": "object", "properties": {"answer": {"type": "string"}}}'
//!
//!   - id: ask
//!     kind: chatAgent
//!     config:
//!       identifier: answer
//!       systemPrompt: Answer briefly.
//!       temperature: 0.2
//!
//!   - id: show
//!     kind: textOutput
//! ```

use std::collections::BTreeMap;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;

/// Lifecycle state of a step within one run.
///
/// Transitions are monotonic: `Pending -> Running -> Completed | Error`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Error,
}

impl StepStatus {
    /// Returns true if moving from `self` to `next` keeps the state machine monotonic.
    pub fn can_transition_to(self, next: StepStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Error)
        )
    }

    /// Returns true for `Completed` and `Error`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// Configuration for reading the active page.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ReadPageConfig {
    /// Glob-style filter (`*` wildcard only) the page URL must match.
    pub url_filter: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemPromptConfig {
    pub prompt: String,
}

/// Configuration for a language model generation step.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationConfig {
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub temperature: Option<f64>,
    pub top_k: Option<u32>,
    /// Request incremental deltas from the model.
    pub stream: bool,
    /// Shape merged in from the nearest preceding output-format step.
    /// Set only by the propagation pass; never serialized.
    #[serde(skip)]
    pub response_schema: Option<Value>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: None,
            system_prompt: None,
            temperature: None,
            top_k: None,
            stream: true,
            response_schema: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TextInputConfig {
    /// Fallback text when no value is materialized on the step.
    pub text: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioInputConfig {
    pub duration_secs: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TranscriptionConfig {
    pub language: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SpeechSynthesisConfig {
    pub voice: Option<String>,
}

/// A named string operation and its comma-separated parameter string.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StringOpConfig {
    pub operation: String,
    pub parameter: String,
}

impl StringOpConfig {
    pub fn new(operation: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            parameter: parameter.into(),
        }
    }
}

/// Comparison operators understood by conditional steps.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ComparisonOperator {
    #[default]
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    NotContains,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ConditionalConfig {
    pub operator: ComparisonOperator,
    /// Literal the upstream value is compared against.
    pub value: String,
}

impl ConditionalConfig {
    pub fn new(operator: ComparisonOperator, value: impl Into<String>) -> Self {
        Self {
            operator,
            value: value.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct WebhookConfig {
    pub endpoint: Option<String>,
    pub method: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl WebhookConfig {
    pub fn new(method: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            method: Some(method.into()),
            headers: BTreeMap::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct OpenPageConfig {
    pub url: Option<String>,
}

/// Declared output shape, either structured already or as serialized JSON text.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputFormatConfig {
    pub schema: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct IteratorConfig {
    /// Items following the upstream value (a list, or a comma-separated string)
    #[serde(deserialize_with = "single_or_vec")]
    pub items: Vec<Value>,
}

/// Deserializes a list, a comma-separated string or null into a Vec<Value>
fn single_or_vec<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = Value::deserialize(deserializer)?;
    match val {
        Value::Null => Ok(Vec::new()),
        Value::String(s) if s.trim().is_empty() => Ok(Vec::new()),
        Value::String(s) => Ok(s
            .split(',')
            .map(|item| Value::String(item.trim().to_string()))
            .collect()),
        Value::Array(arr) => Ok(arr),
        _ => Err(de::Error::custom("Expected a list or a comma-separated string")),
    }
}

/// The closed set of step kinds, each carrying its own typed configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    ReadPage(ReadPageConfig),
    SystemPrompt(SystemPromptConfig),
    ChatAgent(GenerationConfig),
    PassThroughStore,
    TextInput(TextInputConfig),
    TextOutput,
    AudioInput(AudioInputConfig),
    Transcription(TranscriptionConfig),
    SpeechSynthesis(SpeechSynthesisConfig),
    StringOp(StringOpConfig),
    Conditional(ConditionalConfig),
    Webhook(WebhookConfig),
    OpenPage(OpenPageConfig),
    OutputFormat(OutputFormatConfig),
    Iterator(IteratorConfig),
}

impl StepKind {
    /// Descriptor tag for this kind.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::ReadPage(_) => "readPage",
            Self::SystemPrompt(_) => "systemPrompt",
            Self::ChatAgent(_) => "chatAgent",
            Self::PassThroughStore => "passThroughStore",
            Self::TextInput(_) => "textInput",
            Self::TextOutput => "textOutput",
            Self::AudioInput(_) => "audioInput",
            Self::Transcription(_) => "transcription",
            Self::SpeechSynthesis(_) => "speechSynthesis",
            Self::StringOp(_) => "stringOp",
            Self::Conditional(_) => "conditional",
            Self::Webhook(_) => "webhook",
            Self::OpenPage(_) => "openPage",
            Self::OutputFormat(_) => "outputFormat",
            Self::Iterator(_) => "iterator",
        }
    }

    /// Builds a kind from its descriptor tag and raw config.
    ///
    /// Returns `Ok(None)` for a tag no executor handles.
    pub fn from_tag(tag: &str, config: Value) -> Result<Option<Self>, serde_json::Error> {
        let config = if config.is_null() {
            Value::Object(Default::default())
        } else {
            config
        };

        let kind = match tag {
            "readPage" => Self::ReadPage(serde_json::from_value(config)?),
            "systemPrompt" => Self::SystemPrompt(serde_json::from_value(config)?),
            "chatAgent" | "generationAgent" => Self::ChatAgent(serde_json::from_value(config)?),
            "passThroughStore" => Self::PassThroughStore,
            "textInput" => Self::TextInput(serde_json::from_value(config)?),
            "textOutput" => Self::TextOutput,
            "audioInput" => Self::AudioInput(serde_json::from_value(config)?),
            "transcription" => Self::Transcription(serde_json::from_value(config)?),
            "speechSynthesis" => Self::SpeechSynthesis(serde_json::from_value(config)?),
            "stringOp" => Self::StringOp(serde_json::from_value(config)?),
            "conditional" => Self::Conditional(serde_json::from_value(config)?),
            "webhook" => Self::Webhook(serde_json::from_value(config)?),
            "openPage" => Self::OpenPage(serde_json::from_value(config)?),
            "outputFormat" => Self::OutputFormat(serde_json::from_value(config)?),
            "iterator" => Self::Iterator(serde_json::from_value(config)?),
            _ => return Ok(None),
        };

        Ok(Some(kind))
    }

    /// Serializes the kind's configuration back to descriptor form.
    pub fn config_value(&self) -> Value {
        let result = match self {
            Self::ReadPage(c) => serde_json::to_value(c),
            Self::SystemPrompt(c) => serde_json::to_value(c),
            Self::ChatAgent(c) => serde_json::to_value(c),
            Self::TextInput(c) => serde_json::to_value(c),
            Self::AudioInput(c) => serde_json::to_value(c),
            Self::Transcription(c) => serde_json::to_value(c),
            Self::SpeechSynthesis(c) => serde_json::to_value(c),
            Self::StringOp(c) => serde_json::to_value(c),
            Self::Conditional(c) => serde_json::to_value(c),
            Self::Webhook(c) => serde_json::to_value(c),
            Self::OpenPage(c) => serde_json::to_value(c),
            Self::OutputFormat(c) => serde_json::to_value(c),
            Self::Iterator(c) => serde_json::to_value(c),
            Self::PassThroughStore | Self::TextOutput => Ok(Value::Null),
        };
        result.unwrap_or(Value::Null)
    }

    /// Kinds whose materialized value seeds the data bag's `input` key.
    pub fn is_input_shaped(&self) -> bool {
        matches!(self, Self::TextInput(_) | Self::AudioInput(_))
    }

    pub fn is_generation(&self) -> bool {
        matches!(self, Self::ChatAgent(_))
    }

    pub fn is_output_format(&self) -> bool {
        matches!(self, Self::OutputFormat(_))
    }
}

/// Persisted, serializable form of a step.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepDescriptor {
    pub id: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub config: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub materialized_value: Option<Value>,
    /// Data bag key this step also publishes its result under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// Output-type key this step also publishes its result under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_type: Option<String>,
}

/// A single unit of work in a pipeline, plus its per-run state.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Unique identifier within a run
    pub id: String,

    /// Executor selector and typed configuration
    pub kind: StepKind,

    /// Current lifecycle state
    pub status: StepStatus,

    /// Append-only, human-readable log lines
    pub logs: Vec<String>,

    /// Value attached directly to the step (typed text, captured audio)
    pub materialized_value: Option<Value>,

    pub identifier: Option<String>,
    pub output_type: Option<String>,

    /// Partial text streamed so far while a generation step runs
    pub live_value: Option<String>,

    /// Set on a text-output step that is about to receive streamed text
    pub receiving: bool,
}

impl Step {
    /// Creates a pending step.
    ///
    /// # Example
    ///
    /// ```
    /// use stepline::workflow::model::{Step, StepKind, StringOpConfig};
    ///
    /// let step = Step::new("shout", StepKind::StringOp(StringOpConfig::new("uppercase", "")))
    ///     .with_identifier("shouted");
    /// assert_eq!(step.kind.tag(), "stringOp");
    /// ```
    pub fn new(id: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: id.into().trim().to_string(),
            kind,
            status: StepStatus::Pending,
            logs: Vec::new(),
            materialized_value: None,
            identifier: None,
            output_type: None,
            live_value: None,
            receiving: false,
        }
    }

    /// Attaches a literal value to the step.
    pub fn with_materialized_value(mut self, value: impl Into<Value>) -> Self {
        self.materialized_value = Some(value.into());
        self
    }

    /// Publishes the step's result under an additional data bag key.
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_output_type(mut self, output_type: impl Into<String>) -> Self {
        self.output_type = Some(output_type.into());
        self
    }

    /// Builds a step from its persisted descriptor.
    pub fn from_descriptor(descriptor: StepDescriptor) -> Result<Self, EngineError> {
        let StepDescriptor {
            id,
            kind,
            config,
            materialized_value,
            identifier,
            output_type,
        } = descriptor;

        // Publish keys may sit inside `config`; top-level fields take precedence.
        let identifier = non_blank(identifier).or_else(|| config_string(&config, "identifier"));
        let output_type = non_blank(output_type).or_else(|| config_string(&config, "outputType"));

        let step_kind = StepKind::from_tag(&kind, config)
            .map_err(|e| EngineError::InvalidConfig {
                step_id: id.clone(),
                message: e.to_string(),
            })?
            .ok_or_else(|| EngineError::UnknownKind {
                step_id: id.clone(),
                kind: kind.clone(),
            })?;

        let mut step = Step::new(id, step_kind);
        step.materialized_value = materialized_value;
        step.identifier = identifier;
        step.output_type = output_type;
        Ok(step)
    }

    /// Returns the persisted form of this step (runtime state is dropped).
    pub fn to_descriptor(&self) -> StepDescriptor {
        StepDescriptor {
            id: self.id.clone(),
            kind: self.kind.tag().to_string(),
            config: self.kind.config_value(),
            materialized_value: self.materialized_value.clone(),
            identifier: self.identifier.clone(),
            output_type: self.output_type.clone(),
        }
    }

    /// Returns the step to `Pending` with empty logs, ready for a fresh run.
    pub fn reset(&mut self) {
        self.status = StepStatus::Pending;
        self.logs.clear();
        self.live_value = None;
        self.receiving = false;
    }

    /// Moves the step to `next` if the transition is monotonic.
    ///
    /// Returns false and leaves the status untouched otherwise.
    pub fn transition(&mut self, next: StepStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        if next != StepStatus::Pending {
            self.receiving = false;
        }
        true
    }

    /// Appends a log line.
    pub fn log(&mut self, message: impl Into<String>) {
        self.logs.push(message.into());
    }

    /// Data bag keys this step publishes to besides `output`.
    pub fn publish_keys(&self) -> impl Iterator<Item = &str> {
        self.identifier
            .as_deref()
            .into_iter()
            .chain(self.output_type.as_deref())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn config_string(config: &Value, key: &str) -> Option<String> {
    non_blank(config.get(key).and_then(Value::as_str).map(str::to_string))
}

/// A pipeline: an ordered list of steps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workflow {
    /// Ordered list of steps in the pipeline
    pub steps: Vec<Step>,
}

impl Workflow {
    /// Creates a new empty workflow.
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Creates a workflow from a list of steps.
    pub fn from_steps(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// Builds a workflow from persisted descriptors.
    ///
    /// Fails on the first descriptor with an unknown kind or malformed config.
    pub fn from_descriptors(descriptors: Vec<StepDescriptor>) -> Result<Self, EngineError> {
        let steps = descriptors
            .into_iter()
            .map(Step::from_descriptor)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { steps })
    }

    /// Returns the persisted form of every step.
    pub fn descriptors(&self) -> Vec<StepDescriptor> {
        self.steps.iter().map(Step::to_descriptor).collect()
    }

    /// Adds a step to the workflow.
    pub fn add_step(&mut self, step: Step) -> Result<(), String> {
        if self.steps.iter().any(|s| s.id == step.id) {
            return Err(format!("Step '{}' already exists", step.id));
        }
        self.steps.push(step);
        Ok(())
    }

    /// Removes a step from the workflow.
    pub fn remove_step(&mut self, id: &str) -> Result<Step, String> {
        let index = self
            .steps
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| format!("Step '{}' not found", id))?;
        Ok(self.steps.remove(index))
    }

    pub fn get_step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn get_step_mut(&mut self, id: &str) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(id: &str, kind: &str, config: Value) -> StepDescriptor {
        StepDescriptor {
            id: id.to_string(),
            kind: kind.to_string(),
            config,
            materialized_value: None,
            identifier: None,
            output_type: None,
        }
    }

    #[test]
    fn test_status_transitions_are_monotonic() {
        use StepStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Error));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Error.can_transition_to(Pending));
        assert!(!Running.can_transition_to(Running));
    }

    #[test]
    fn test_step_transition_rejects_regression() {
        let mut step = Step::new("s", StepKind::TextOutput);
        assert!(step.transition(StepStatus::Running));
        assert!(step.transition(StepStatus::Completed));
        assert!(!step.transition(StepStatus::Running));
        assert_eq!(step.status, StepStatus::Completed);
    }

    #[test]
    fn test_reset_clears_logs_and_status() {
        let mut step = Step::new("s", StepKind::TextOutput);
        step.transition(StepStatus::Running);
        step.log("working");
        step.live_value = Some("partial".to_string());
        step.receiving = true;

        step.reset();

        assert_eq!(step.status, StepStatus::Pending);
        assert!(step.logs.is_empty());
        assert!(step.live_value.is_none());
        assert!(!step.receiving);
    }

    #[test]
    fn test_from_descriptor_typed_config() {
        let step = Step::from_descriptor(descriptor(
            "cmp",
            "conditional",
            json!({"operator": "greaterThan", "value": "10"}),
        ))
        .unwrap();

        match step.kind {
            StepKind::Conditional(config) => {
                assert_eq!(config.operator, ComparisonOperator::GreaterThan);
                assert_eq!(config.value, "10");
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_from_descriptor_unknown_kind() {
        let err = Step::from_descriptor(descriptor("x", "teleport", Value::Null)).unwrap_err();
        assert!(matches!(err, EngineError::UnknownKind { ref kind, .. } if kind == "teleport"));
        assert!(err.to_string().contains("No executor for kind 'teleport'"));
    }

    #[test]
    fn test_from_descriptor_invalid_config() {
        let err = Step::from_descriptor(descriptor(
            "cmp",
            "conditional",
            json!({"operator": "roughlyEquals"}),
        ))
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig { .. }));
    }

    #[test]
    fn test_null_config_uses_defaults() {
        let step = Step::from_descriptor(descriptor("agent", "chatAgent", Value::Null)).unwrap();
        assert_eq!(step.kind, StepKind::ChatAgent(GenerationConfig::default()));
        if let StepKind::ChatAgent(config) = &step.kind {
            assert!(config.stream);
        }
    }

    #[test]
    fn test_iterator_items_from_comma_string() {
        let step = Step::from_descriptor(descriptor(
            "it",
            "iterator",
            json!({"items": "a, b ,c"}),
        ))
        .unwrap();

        assert_eq!(
            step.kind,
            StepKind::Iterator(IteratorConfig {
                items: vec![json!("a"), json!("b"), json!("c")]
            })
        );
    }

    #[test]
    fn test_descriptor_roundtrip_keeps_publish_keys() {
        let step = Step::new("shout", StepKind::StringOp(StringOpConfig::new("uppercase", "")))
            .with_identifier("loud")
            .with_output_type("text");

        let rebuilt = Step::from_descriptor(step.to_descriptor()).unwrap();
        assert_eq!(rebuilt, step);
        assert_eq!(rebuilt.publish_keys().collect::<Vec<_>>(), vec!["loud", "text"]);
    }

    #[test]
    fn test_blank_identifier_is_ignored() {
        let mut desc = descriptor("a", "textOutput", Value::Null);
        desc.identifier = Some("  ".to_string());
        let step = Step::from_descriptor(desc).unwrap();
        assert!(step.identifier.is_none());
    }

    #[test]
    fn test_publish_keys_declared_in_config() {
        let step = Step::from_descriptor(descriptor(
            "in",
            "textInput",
            json!({"identifier": "typed", "outputType": "text"}),
        ))
        .unwrap();

        assert_eq!(step.identifier.as_deref(), Some("typed"));
        assert_eq!(step.output_type.as_deref(), Some("text"));
        assert_eq!(step.kind, StepKind::TextInput(TextInputConfig::default()));

        let saved = step.to_descriptor();
        assert_eq!(saved.identifier.as_deref(), Some("typed"));
        assert_eq!(saved.output_type.as_deref(), Some("text"));
        assert_eq!(Step::from_descriptor(saved).unwrap(), step);
    }

    #[test]
    fn test_top_level_publish_keys_win_over_config() {
        let mut desc = descriptor(
            "shout",
            "stringOp",
            json!({"operation": "uppercase", "identifier": "inner", "outputType": "  "}),
        );
        desc.identifier = Some("outer".to_string());

        let step = Step::from_descriptor(desc).unwrap();

        assert_eq!(step.identifier.as_deref(), Some("outer"));
        assert!(step.output_type.is_none());
    }

    #[test]
    fn test_response_schema_not_persisted() {
        let step = Step::from_descriptor(descriptor(
            "agent",
            "chatAgent",
            json!({"systemPrompt": "Be brief.", "responseSchema": {"type": "object"}}),
        ))
        .unwrap();
        let StepKind::ChatAgent(config) = &step.kind else {
            panic!("unexpected kind: {:?}", step.kind);
        };
        assert!(config.response_schema.is_none());
        assert_eq!(config.system_prompt.as_deref(), Some("Be brief."));

        let mut merged = step.clone();
        if let StepKind::ChatAgent(config) = &mut merged.kind {
            config.response_schema = Some(json!({"type": "object"}));
        }
        let saved = merged.to_descriptor();
        assert!(saved.config.get("responseSchema").is_none());
        assert_eq!(saved.config["systemPrompt"], json!("Be brief."));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(StepStatus::Completed.is_terminal());
        assert!(StepStatus::Error.is_terminal());
        assert!(!StepStatus::Pending.is_terminal());
        assert!(!StepStatus::Running.is_terminal());
    }

    #[test]
    fn test_workflow_step_lookup() {
        let mut workflow = Workflow::from_steps(vec![
            Step::new("a", StepKind::TextOutput),
            Step::new("b", StepKind::PassThroughStore),
        ]);

        assert_eq!(workflow.get_step("b").map(|s| s.kind.tag()), Some("passThroughStore"));
        assert!(workflow.get_step("missing").is_none());

        workflow.get_step_mut("a").unwrap().log("touched");
        assert_eq!(workflow.steps[0].logs, vec!["touched".to_string()]);
        assert!(workflow.get_step_mut("missing").is_none());
    }

    #[test]
    fn test_workflow_add_and_remove() {
        let mut workflow = Workflow::new();
        workflow.add_step(Step::new("a", StepKind::TextOutput)).unwrap();
        assert!(workflow.add_step(Step::new("a", StepKind::TextOutput)).is_err());
        assert_eq!(workflow.len(), 1);

        let removed = workflow.remove_step("a").unwrap();
        assert_eq!(removed.id, "a");
        assert!(workflow.is_empty());
        assert!(workflow.remove_step("a").is_err());
    }

    #[test]
    fn test_input_shaped_kinds() {
        assert!(StepKind::TextInput(TextInputConfig::default()).is_input_shaped());
        assert!(StepKind::AudioInput(AudioInputConfig::default()).is_input_shaped());
        assert!(!StepKind::TextOutput.is_input_shaped());
    }
}
