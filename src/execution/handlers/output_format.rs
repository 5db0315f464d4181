//! Output-format steps.
//!
//! These never reach the engine loop: the schema propagation pass filters
//! them out after merging their shape into the next generation step. The
//! handler still exists so a declared shape can be checked on its own.

use log::warn;

use crate::execution::step::StepResult;
use crate::workflow::model::OutputFormatConfig;
use crate::workflow::planner::parse_schema;

/// Checks that the declared shape parses as structured data.
///
/// A shape that does not parse is passed through as-is and flagged.
pub fn validate(config: &OutputFormatConfig) -> StepResult {
    match parse_schema(&config.schema) {
        Ok(shape) => StepResult::new(shape, "Output format is valid"),
        Err(reason) => {
            warn!("Invalid output format: {}", reason);
            StepResult::new(config.schema.clone(), format!("Invalid output format: {}", reason))
                .flagged()
        }
    }
}
