//! Pipeline Loader
//!
//! Reads and writes pipeline files. A file holds step descriptors either
//! wrapped as `{ steps: [...] }` or as a bare list. Files ending in `.json`
//! are read as JSON and everything else as YAML.
//!
//! ```yaml
//! steps:
//!   - id: read
//!     kind: readPage
//!     config: { urlFilter: "https://*.example.com/*" }
//!   - id: summarize
//!     kind: chatAgent
//!     config: { systemPrompt: "Summarize the page." }
//! ```

use std::fs;
use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::model::{StepDescriptor, Workflow};
use super::validator::validate_workflow;
use crate::error::EngineError;

/// On-disk shape of a pipeline file.
#[derive(Serialize, Deserialize, Debug)]
#[serde(untagged)]
enum PipelineDocument {
    Wrapped { steps: Vec<StepDescriptor> },
    Bare(Vec<StepDescriptor>),
}

impl PipelineDocument {
    fn into_descriptors(self) -> Vec<StepDescriptor> {
        match self {
            Self::Wrapped { steps } | Self::Bare(steps) => steps,
        }
    }
}

/// Serialization format of a pipeline file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineFormat {
    Json,
    Yaml,
}

impl PipelineFormat {
    /// Picks the format from the file extension, defaulting to YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// Loads and validates a pipeline file.
///
/// # Arguments
///
/// * `path` - Path to a `.json`, `.yaml` or `.yml` pipeline file
///
/// # Returns
///
/// * `Ok(Workflow)` - Every descriptor converted and the pipeline is valid
/// * `Err(EngineError)` - Unreadable file, malformed document, unknown kind
///   or failed validation
pub fn load_workflow(path: impl AsRef<Path>) -> Result<Workflow, EngineError> {
    let path = path.as_ref();
    info!("Loading pipeline from: {}", path.display());

    let content = fs::read_to_string(path)?;
    debug!("Pipeline file loaded ({} bytes)", content.len());

    let workflow = parse_workflow(&content, PipelineFormat::from_path(path))?;
    info!("Parsed {} steps", workflow.len());
    Ok(workflow)
}

/// Parses pipeline text in the given format and validates it.
pub fn parse_workflow(content: &str, format: PipelineFormat) -> Result<Workflow, EngineError> {
    let document: PipelineDocument = match format {
        PipelineFormat::Json => serde_json::from_str(content)
            .map_err(|e| EngineError::Parse(format!("invalid JSON: {}", e)))?,
        PipelineFormat::Yaml => serde_yaml::from_str(content)
            .map_err(|e| EngineError::Parse(format!("invalid YAML: {}", e)))?,
    };

    let workflow = Workflow::from_descriptors(document.into_descriptors())?;
    validate_workflow(&workflow)?;
    Ok(workflow)
}

/// Writes a pipeline as `{ steps: [...] }`; runtime state is not saved.
pub fn save_workflow(workflow: &Workflow, path: impl AsRef<Path>) -> Result<(), EngineError> {
    let path = path.as_ref();
    let document = PipelineDocument::Wrapped {
        steps: workflow.descriptors(),
    };

    let content = match PipelineFormat::from_path(path) {
        PipelineFormat::Json => serde_json::to_string_pretty(&document)
            .map_err(|e| EngineError::Parse(e.to_string()))?,
        PipelineFormat::Yaml => {
            serde_yaml::to_string(&document).map_err(|e| EngineError::Parse(e.to_string()))?
        }
    };

    fs::write(path, content)?;
    info!("Pipeline saved to: {}", path.display());
    Ok(())
}
