//! Workflow Data Bag
//!
//! The mutable key/value map that threads results between steps during a
//! run. Two keys are always present:
//!
//! - `input`: the value fed to the first step
//! - `output`: the value produced by the most recently completed step
//!
//! Steps may additionally publish under their `identifier` and
//! `outputType` keys so later steps can address a specific earlier result.
//! Only the engine writes to the bag; executors return values.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::Step;

/// Reserved key holding the value fed to the first step.
pub const INPUT_KEY: &str = "input";

/// Reserved key holding the most recent step result.
pub const OUTPUT_KEY: &str = "output";

/// Last-written value per key for one run.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DataBag {
    values: BTreeMap<String, Value>,
}

impl DataBag {
    /// Creates a bag with `input` and `output` set to null.
    pub fn new() -> Self {
        let mut values = BTreeMap::new();
        values.insert(INPUT_KEY.to_string(), Value::Null);
        values.insert(OUTPUT_KEY.to_string(), Value::Null);
        Self { values }
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Overwrites the value stored under `key`.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        debug!("Data bag: {} <- {}", key, preview(&value));
        self.values.insert(key, value);
    }

    pub fn input(&self) -> &Value {
        self.values.get(INPUT_KEY).unwrap_or(&Value::Null)
    }

    pub fn output(&self) -> &Value {
        self.values.get(OUTPUT_KEY).unwrap_or(&Value::Null)
    }

    /// Seeds `input` and the step's own publish keys.
    pub fn seed(&mut self, step: &Step, value: Value) {
        for key in step.publish_keys() {
            self.set(key, value.clone());
        }
        self.set(INPUT_KEY, value);
    }

    /// Records a completed step's result under `output` and its publish keys.
    pub fn publish(&mut self, step: &Step, value: Value) {
        for key in step.publish_keys() {
            self.set(key, value.clone());
        }
        self.set(OUTPUT_KEY, value);
    }

    /// Iterates all keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consumes the bag, returning the underlying map.
    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.values
    }
}

impl Default for DataBag {
    fn default() -> Self {
        Self::new()
    }
}

/// Short single-line rendering of a value for log output.
fn preview(value: &Value) -> String {
    const MAX: usize = 60;
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= MAX {
        flat
    } else {
        let cut: String = flat.chars().take(MAX - 3).collect();
        format!("{}...", cut)
    }
}
