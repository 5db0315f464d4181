//! String operations.
//!
//! Each operation takes one comma-separated parameter string:
//!
//! | operation   | parameter             | result                      |
//! |-------------|-----------------------|-----------------------------|
//! | `split`     | separator             | array of pieces             |
//! | `slice`     | `start[,end]`         | characters, negatives from end |
//! | `substring` | `start[,end]`         | characters, clamped and ordered |
//! | `replace`   | `search,replacement`  | every occurrence replaced   |
//! | `trim`      | unused                |                             |
//! | `uppercase` | unused                |                             |
//! | `lowercase` | unused                |                             |

use std::str::FromStr;

use serde_json::Value;

use super::value_as_text;
use crate::error::StepError;
use crate::execution::step::StepResult;
use crate::workflow::model::StringOpConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringOperation {
    Split,
    Slice,
    Replace,
    Trim,
    Uppercase,
    Lowercase,
    Substring,
}

impl FromStr for StringOperation {
    type Err = StepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "split" => Ok(Self::Split),
            "slice" => Ok(Self::Slice),
            "replace" => Ok(Self::Replace),
            "trim" => Ok(Self::Trim),
            "uppercase" => Ok(Self::Uppercase),
            "lowercase" => Ok(Self::Lowercase),
            "substring" => Ok(Self::Substring),
            _ => Err(StepError::InvalidOperation(s.to_string())),
        }
    }
}

/// Applies the configured operation to the upstream text.
pub fn apply(config: &StringOpConfig, upstream: &Value) -> Result<StepResult, StepError> {
    let operation: StringOperation = config.operation.parse()?;
    let text = value_as_text(upstream);
    let invalid = || StepError::InvalidParameter {
        operation: config.operation.clone(),
        parameter: config.parameter.clone(),
    };

    let output = match operation {
        StringOperation::Split => {
            let separator = if config.parameter.is_empty() {
                ","
            } else {
                config.parameter.as_str()
            };
            Value::Array(
                text.split(separator)
                    .map(|piece| Value::String(piece.to_string()))
                    .collect(),
            )
        }
        StringOperation::Slice => {
            let (start, end) = parse_range(&config.parameter).ok_or_else(invalid)?;
            Value::String(slice(&text, start, end))
        }
        StringOperation::Substring => {
            let (start, end) = parse_range(&config.parameter).ok_or_else(invalid)?;
            Value::String(substring(&text, start, end))
        }
        StringOperation::Replace => {
            let (search, replacement) = config.parameter.split_once(',').ok_or_else(invalid)?;
            if search.is_empty() {
                return Err(invalid());
            }
            Value::String(text.replace(search, replacement))
        }
        StringOperation::Trim => Value::String(text.trim().to_string()),
        StringOperation::Uppercase => Value::String(text.to_uppercase()),
        StringOperation::Lowercase => Value::String(text.to_lowercase()),
    };

    Ok(StepResult::new(
        output,
        format!("Applied string operation '{}'", config.operation.trim()),
    ))
}

/// Parses `start[,end]` into signed character indices.
fn parse_range(parameter: &str) -> Option<(i64, Option<i64>)> {
    let mut parts = parameter.split(',').map(str::trim);
    let start = parts.next().filter(|s| !s.is_empty())?.parse().ok()?;
    let end = match parts.next() {
        Some(s) if !s.is_empty() => Some(s.parse().ok()?),
        _ => None,
    };
    if parts.next().is_some() {
        return None;
    }
    Some((start, end))
}

/// Character slice; negative indices count back from the end.
fn slice(text: &str, start: i64, end: Option<i64>) -> String {
    let len = text.chars().count() as i64;
    let resolve = |i: i64| if i < 0 { (len + i).max(0) } else { i.min(len) };

    let from = resolve(start);
    let to = end.map(resolve).unwrap_or(len);
    if to <= from {
        return String::new();
    }
    text.chars()
        .skip(from as usize)
        .take((to - from) as usize)
        .collect()
}

/// Character substring; negatives clamp to zero and bounds are swapped if reversed.
fn substring(text: &str, start: i64, end: Option<i64>) -> String {
    let len = text.chars().count() as i64;
    let clamp = |i: i64| i.clamp(0, len);

    let a = clamp(start);
    let b = end.map(clamp).unwrap_or(len);
    let (from, to) = if a <= b { (a, b) } else { (b, a) };
    text.chars()
        .skip(from as usize)
        .take((to - from) as usize)
        .collect()
}
