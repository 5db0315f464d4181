//! Stepline - Browser Automation Pipeline Engine
//!
//! Runs linear pipelines of heterogeneous steps: read a page, prompt a
//! language model, transform text, branch on a condition, call a webhook,
//! declare a JSON shape for a later model call. Steps run strictly in order
//! and each one receives the previous step's output.
//!
//! # Architecture
//!
//! - [`workflow`]: Step model, pipeline files, validation, schema propagation
//! - [`execution`]: Runner, executor registry, token budget, observers
//! - [`host`]: Capabilities executors call out to (pages, HTTP, models)
//! - [`monitoring`]: Per-step timeline of a run
//! - [`error`]: Error types for hosts, steps and runs
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stepline::execution::with_progress;
//! use stepline::host::CliHost;
//! use stepline::{load_workflow, Engine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let workflow = load_workflow("pipeline.yaml")?;
//!     let mut engine = Engine::new(workflow, Arc::new(CliHost::new()));
//!
//!     let mut observer = with_progress(|_: &[stepline::Step]| {}, |line: &str| println!("{}", line));
//!     let report = engine.run(&mut observer).await?;
//!     println!("{}", report.final_output);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod execution;
pub mod host;
pub mod monitoring;
pub mod workflow;

// Re-export commonly used types
pub use error::{EngineError, HostError, StepError};
pub use execution::engine::{Engine, RunReport};
pub use host::Host;
pub use workflow::model::{Step, StepKind, StepStatus, Workflow};
pub use workflow::parser::load_workflow;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "Stepline";
