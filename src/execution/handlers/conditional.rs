//! Conditional steps.
//!
//! Computes a boolean branch tag and passes the upstream value through
//! unchanged. The engine records the tag but does not skip steps on it.

use std::cmp::Ordering;

use serde_json::Value;

use super::value_as_text;
use crate::execution::step::StepResult;
use crate::workflow::model::{ComparisonOperator, ConditionalConfig};

/// Evaluates the comparison and tags the result.
pub fn evaluate(config: &ConditionalConfig, upstream: Value) -> StepResult {
    let text = value_as_text(&upstream);
    let branch = compare(config.operator, &text, &config.value);

    StepResult::new(
        upstream,
        format!(
            "Condition {:?} '{}' evaluated to {}",
            config.operator, config.value, branch
        ),
    )
    .with_branch(branch)
}

/// Applies `operator` to `left` and `right`.
///
/// Ordering compares numerically when both sides parse as numbers,
/// otherwise lexicographically.
pub fn compare(operator: ComparisonOperator, left: &str, right: &str) -> bool {
    match operator {
        ComparisonOperator::Equals => left == right,
        ComparisonOperator::NotEquals => left != right,
        ComparisonOperator::Contains => left.contains(right),
        ComparisonOperator::NotContains => !left.contains(right),
        ComparisonOperator::GreaterThan => order(left, right) == Some(Ordering::Greater),
        ComparisonOperator::LessThan => order(left, right) == Some(Ordering::Less),
    }
}

fn order(left: &str, right: &str) -> Option<Ordering> {
    match (left.trim().parse::<f64>(), right.trim().parse::<f64>()) {
        (Ok(l), Ok(r)) => l.partial_cmp(&r),
        _ => Some(left.cmp(right)),
    }
}
