//! Workflow Validation
//!
//! Structural checks run before a pipeline executes:
//! - Pipeline is not empty
//! - Step IDs are present and unique
//! - Publish keys do not shadow the reserved data bag keys

use std::collections::HashSet;

use log::{debug, info, warn};
use thiserror::Error;

use super::model::{Step, Workflow};
use super::state::{INPUT_KEY, OUTPUT_KEY};

/// Validation error types for user-friendly error messages.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Workflow has no steps")]
    EmptyWorkflow,

    #[error("Duplicate step ID: '{0}'")]
    DuplicateStepId(String),

    #[error("Step has empty or whitespace-only ID")]
    EmptyStepId,

    #[error("Step '{step}' publishes to reserved key '{key}'")]
    ReservedKey { step: String, key: String },
}

/// Validates a single step's fields.
fn validate_step(step: &Step) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if step.id.trim().is_empty() {
        errors.push(ValidationError::EmptyStepId);
        return errors;
    }

    for key in step.publish_keys() {
        if key == INPUT_KEY || key == OUTPUT_KEY {
            errors.push(ValidationError::ReservedKey {
                step: step.id.clone(),
                key: key.to_string(),
            });
        }
    }

    if step.materialized_value.is_some() && !step.kind.is_input_shaped() {
        debug!(
            "Step '{}' carries a materialized value; it is only used when the step runs first",
            step.id
        );
    }

    errors
}

/// Validates the entire workflow structure.
///
/// Returns the first error found; every error is logged.
pub fn validate_workflow(workflow: &Workflow) -> Result<(), ValidationError> {
    info!("Validating workflow with {} steps", workflow.steps.len());

    if workflow.steps.is_empty() {
        return Err(ValidationError::EmptyWorkflow);
    }

    let mut seen_ids: HashSet<&str> = HashSet::new();
    for step in &workflow.steps {
        if !step.id.is_empty() && !seen_ids.insert(step.id.as_str()) {
            return Err(ValidationError::DuplicateStepId(step.id.clone()));
        }
    }

    let mut all_errors: Vec<ValidationError> =
        workflow.steps.iter().flat_map(validate_step).collect();

    if all_errors.is_empty() {
        debug!("Workflow validation passed");
        return Ok(());
    }

    for err in &all_errors {
        warn!("Validation: {}", err);
    }

    Err(all_errors.remove(0))
}
