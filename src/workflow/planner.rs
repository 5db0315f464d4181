//! Execution Planner
//!
//! Turns the full step list into an executable sequence:
//! - Parses the shape declared by each output-format step
//! - Merges it into the config of the first generation step that follows
//! - Filters output-format steps out of the executable sequence
//!
//! Output-format steps stay in the step list as inert `Pending` records so
//! observers can still show them. Running the pass on its own output is a
//! no-op since no output-format steps remain.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use serde_json::Value;

use super::model::{Step, StepKind};

/// A schema moved from an output-format step into a generation step.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaMerge {
    /// ID of the output-format step that declared the schema
    pub source: String,
    /// ID of the generation step that received it
    pub target: String,
}

/// Result of planning a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionPlan {
    /// Indices into the full step list, in execution order
    executable: Vec<usize>,
    merges: Vec<SchemaMerge>,
    /// IDs of output-format steps whose schema could not be parsed
    dropped: Vec<String>,
}

impl ExecutionPlan {
    /// Indices of the steps to execute, in order.
    pub fn executable_indices(&self) -> &[usize] {
        &self.executable
    }

    pub fn merges(&self) -> &[SchemaMerge] {
        &self.merges
    }

    pub fn dropped_schemas(&self) -> &[String] {
        &self.dropped
    }

    /// Number of executable steps.
    pub fn len(&self) -> usize {
        self.executable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executable.is_empty()
    }

    /// Position within the executable sequence of the step at `index`.
    pub fn position_of(&self, index: usize) -> Option<usize> {
        self.executable.iter().position(|&i| i == index)
    }
}

/// Parses a declared shape into structured data.
///
/// Accepts an object or array given directly, or as JSON text.
pub fn parse_schema(declared: &Value) -> Result<Value, String> {
    match declared {
        Value::Object(_) | Value::Array(_) => Ok(declared.clone()),
        Value::String(text) => {
            let parsed: Value = serde_json::from_str(text.trim())
                .map_err(|e| format!("Schema is not valid JSON: {}", e))?;
            match parsed {
                Value::Object(_) | Value::Array(_) => Ok(parsed),
                other => Err(format!("Schema must be an object or array, got {}", other)),
            }
        }
        Value::Null => Err("No schema declared".to_string()),
        other => Err(format!("Schema must be an object or array, got {}", other)),
    }
}

/// Runs the schema propagation pass over `steps` in place.
///
/// A generation step receives at most one schema: the one from the nearest
/// preceding output-format step whose schema parses. Parse failures drop
/// that step's schema only and are logged on the step.
pub fn propagate_schemas(steps: &mut [Step]) -> ExecutionPlan {
    let mut plan = ExecutionPlan::default();
    let mut parsed: Vec<(usize, Value)> = Vec::new();

    for (i, step) in steps.iter_mut().enumerate() {
        let StepKind::OutputFormat(config) = &step.kind else {
            continue;
        };

        match parse_schema(&config.schema) {
            Ok(schema) => parsed.push((i, schema)),
            Err(e) => {
                warn!("Output format step '{}': schema dropped: {}", step.id, e);
                step.log(format!("Schema dropped: {}", e));
                plan.dropped.push(step.id.clone());
            }
        }
    }

    // target index -> (source index, schema); sources arrive in order, so the nearest wins
    let mut assignments: BTreeMap<usize, (usize, Value)> = BTreeMap::new();
    for (source, schema) in parsed {
        let Some(offset) = steps[source + 1..].iter().position(|s| s.kind.is_generation()) else {
            warn!(
                "Output format step '{}' has no generation step after it",
                steps[source].id
            );
            steps[source].log("No generation step follows; schema unused");
            continue;
        };

        if let Some((previous, _)) = assignments.insert(source + 1 + offset, (source, schema)) {
            debug!(
                "Schema from '{}' superseded by '{}'",
                steps[previous].id, steps[source].id
            );
            steps[previous].log("Schema superseded by a nearer output format step");
        }
    }

    for (target, (source, schema)) in assignments {
        let source_id = steps[source].id.clone();
        let target_id = steps[target].id.clone();

        if let StepKind::ChatAgent(config) = &mut steps[target].kind {
            config.response_schema = Some(schema);
        }

        info!("Merged schema from '{}' into '{}'", source_id, target_id);
        steps[source].log(format!("Schema merged into step '{}'", target_id));
        plan.merges.push(SchemaMerge {
            source: source_id,
            target: target_id,
        });
    }

    plan.executable = steps
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.kind.is_output_format())
        .map(|(i, _)| i)
        .collect();

    debug!(
        "Execution plan: {} of {} steps executable",
        plan.executable.len(),
        steps.len()
    );

    plan
}

/// Applies the pass to a copy of `steps` and returns the executable sequence.
pub fn executable_sequence(steps: &[Step]) -> Vec<Step> {
    let mut steps = steps.to_vec();
    let plan = propagate_schemas(&mut steps);
    plan.executable
        .iter()
        .map(|&i| steps[i].clone())
        .collect()
}
