//! Error Types
//!
//! Three layers of failure exist in a pipeline run:
//!
//! - [`HostError`]: a host capability refused or failed (permission, network,
//!   model inference, capability absent in this host)
//! - [`StepError`]: an executor could not produce a value for its step
//! - [`EngineError`]: the run as a whole could not start or was aborted
//!
//! Executors return `StepError`; the engine wraps the first one it sees in
//! [`EngineError::StepFailed`] and stops advancing.

use thiserror::Error;

use crate::workflow::validator::ValidationError;

/// Failure reported by a host capability.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HostError {
    /// The capability does not exist in this host.
    #[error("{capability} is not supported in this host. {hint}")]
    Unsupported { capability: String, hint: String },

    /// The user or host refused access to a page origin.
    #[error("Permission denied for origin '{origin}'")]
    PermissionDenied { origin: String },

    /// Transport-level failure (DNS, connection refused, TLS, ...).
    #[error("Network error: {0}")]
    Network(String),

    /// The language model backend failed or returned something unusable.
    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl HostError {
    /// Builds the typed "capability absent" failure used by constrained hosts.
    pub fn unsupported(capability: impl Into<String>) -> Self {
        Self::Unsupported {
            capability: capability.into(),
            hint: "Run the pipeline with a host that provides this capability.".to_string(),
        }
    }
}

/// Failure raised by a single step executor.
#[derive(Debug, Error)]
pub enum StepError {
    /// A required configuration field is absent or empty.
    #[error("Missing required configuration: {field}")]
    MissingConfig { field: &'static str },

    #[error("Unknown string operation: '{0}'")]
    InvalidOperation(String),

    #[error("Invalid parameter for '{operation}': '{parameter}'")]
    InvalidParameter { operation: String, parameter: String },

    /// A webhook answered with a non-2xx status.
    #[error("Request failed with status {status} {status_text}")]
    HttpStatus { status: u16, status_text: String },

    #[error("Invalid URL: '{0}'")]
    InvalidUrl(String),

    #[error("No audio available: nothing was captured and no recording is attached")]
    NoAudio,

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure of a whole pipeline run or of loading one.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A descriptor names a kind no executor handles.
    #[error("No executor for kind '{kind}' (step '{step_id}')")]
    UnknownKind { step_id: String, kind: String },

    /// A descriptor's config does not match its kind.
    #[error("Invalid config for step '{step_id}': {message}")]
    InvalidConfig { step_id: String, message: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// An executor failed; the run stopped at this step.
    #[error("Workflow failed at step '{step_id}': {source}")]
    StepFailed {
        step_id: String,
        #[source]
        source: StepError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse pipeline: {0}")]
    Parse(String),
}

impl EngineError {
    /// Returns the id of the step the run stopped at, if a step failed.
    pub fn failed_step(&self) -> Option<&str> {
        match self {
            Self::StepFailed { step_id, .. } => Some(step_id),
            Self::UnknownKind { step_id, .. } => Some(step_id),
            _ => None,
        }
    }
}
