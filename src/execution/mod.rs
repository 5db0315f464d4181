//! Pipeline Execution Module
//!
//! # Architecture
//!
//! - [`engine`]: The runner that walks the executable sequence
//! - [`step`]: Executor registry and the result envelope
//! - [`handlers`]: One module of executor bodies per family of kinds
//! - [`budget`]: Prompt fitting against the model context window
//! - [`observer`]: Progress callbacks

pub mod budget;
pub mod engine;
pub mod handlers;
pub mod observer;
pub mod step;

pub use budget::TokenBudget;
pub use engine::{Engine, RunReport};
pub use observer::{with_progress, RunObserver};
pub use step::{execute_step, StepResult};
