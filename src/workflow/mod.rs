//! Pipeline Definition Module
//!
//! Data structures for describing a pipeline and the passes run over it
//! before execution.
//!
//! # Structure
//!
//! - [`model`]: Step, StepKind and per-kind configs, Workflow
//! - [`parser`]: JSON/YAML loading and saving
//! - [`validator`]: Structural checks (ids, reserved keys)
//! - [`planner`]: Schema propagation and the executable sequence
//! - [`state`]: The data bag threaded between steps
//! - [`wildcards`]: `*` glob matching for URL filters

pub mod model;
pub mod parser;
pub mod planner;
pub mod state;
pub mod validator;
pub mod wildcards;

pub use model::{Step, StepDescriptor, StepKind, StepStatus, Workflow};
pub use parser::{load_workflow, save_workflow};
pub use planner::{propagate_schemas, ExecutionPlan};
pub use state::DataBag;
pub use wildcards::{has_wildcards, matches_pattern};
