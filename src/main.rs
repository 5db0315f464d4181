//! Stepline CLI Entry Point
//!
//! Runs a pipeline file from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Run a pipeline
//! stepline pipeline.yaml
//!
//! # Feed text to the first step
//! stepline pipeline.yaml --input "Summarize the history of Rust"
//!
//! # Read a page, then prompt the model with it
//! stepline summarize.json --page https://example.com/article
//!
//! # Show the execution plan without running anything
//! stepline pipeline.yaml --dry-run
//! ```

use std::collections::HashMap;
use std::env;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use log::{error, info};
use serde_json::Value;

use stepline::execution::RunObserver;
use stepline::host::CliHost;
use stepline::workflow::parser::load_workflow;
use stepline::{Engine, Step, StepStatus, Workflow, APP_NAME, VERSION};

/// Command-line configuration parsed from arguments.
#[derive(Debug, Default)]
struct Config {
    pipeline_path: Option<String>,
    input: Option<String>,
    page_url: Option<String>,
    dry_run: bool,
    json: bool,
    verbose: bool,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| match record.level() {
            log::Level::Warn | log::Level::Error => {
                writeln!(buf, "[{}] {}", record.level(), record.args())
            }
            _ => writeln!(buf, "{}", record.args()),
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME.bold(), VERSION);
    println!("Browser Automation Pipeline Engine");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: stepline [OPTIONS] <PIPELINE_FILE>");
    println!();
    println!("Arguments:");
    println!("  <PIPELINE_FILE>     Path to a pipeline file (.json, .yaml or .yml)");
    println!();
    println!("Options:");
    println!("  --input TEXT        Value attached to the first step");
    println!("  --page URL          Page that read-page steps read");
    println!("  --dry-run           Print the execution plan without running");
    println!("  --json              Print the final data bag as JSON");
    println!("  --verbose           Enable debug logging");
    println!("  --help              Show this help message");
    println!("  --version           Show version information");
    println!();
    println!("Environment:");
    println!("  STEPLINE_LM_ENDPOINT  Chat-completions URL of the language model");
    println!("  STEPLINE_LM_API_KEY   Bearer token for the endpoint");
    println!("  STEPLINE_LM_MODEL     Default model name");
    println!();
    println!("Examples:");
    println!("  stepline pipeline.yaml --input \"hello\"");
    println!("  stepline summarize.json --page https://example.com/article");
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--dry-run" => config.dry_run = true,
            "--json" => config.json = true,
            "--verbose" | "-v" => config.verbose = true,
            "--input" => {
                i += 1;
                let value = args.get(i).ok_or("--input requires a text argument")?;
                config.input = Some(value.clone());
            }
            "--page" => {
                i += 1;
                let value = args.get(i).ok_or("--page requires a URL argument")?;
                config.page_url = Some(value.clone());
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                if config.pipeline_path.is_some() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                config.pipeline_path = Some(arg.clone());
            }
        }
        i += 1;
    }

    if config.pipeline_path.is_none() {
        return Err("Missing pipeline file".to_string());
    }
    Ok(config)
}

/// Attaches `input` to the first step that will actually run.
fn apply_input(workflow: &mut Workflow, input: &str) {
    if let Some(step) = workflow
        .steps
        .iter_mut()
        .find(|s| !s.kind.is_output_format())
    {
        info!("Input attached to step '{}'", step.id);
        step.materialized_value = Some(Value::String(input.to_string()));
    }
}

/// Prints the executable sequence and schema merges.
fn print_plan(engine: &Engine) {
    let plan = engine.plan();
    let steps = engine.steps();

    println!("{}", "Execution plan".bold());
    for (position, &index) in plan.executable_indices().iter().enumerate() {
        let step = &steps[index];
        println!("  {:>2}. {} ({})", position + 1, step.id, step.kind.tag());
    }
    for merge in plan.merges() {
        println!("  schema: {} -> {}", merge.source, merge.target.cyan());
    }
    for dropped in plan.dropped_schemas() {
        println!("  {} schema of '{}' is invalid and was dropped", "!".yellow(), dropped);
    }
    println!();
}

/// Terminal observer: status marks per step plus streamed text as it arrives.
#[derive(Default)]
struct TerminalObserver {
    seen: HashMap<String, StepStatus>,
    streamed: HashMap<String, usize>,
}

impl RunObserver for TerminalObserver {
    fn steps_changed(&mut self, steps: &[Step]) {
        for step in steps {
            if let Some(live) = &step.live_value {
                let printed = self.streamed.entry(step.id.clone()).or_insert(0);
                if live.len() > *printed {
                    print!("{}", &live[*printed..]);
                    let _ = std::io::stdout().flush();
                    *printed = live.len();
                }
            }

            if self.seen.get(&step.id) == Some(&step.status) {
                continue;
            }
            self.seen.insert(step.id.clone(), step.status);

            let streamed = self.streamed.contains_key(&step.id);
            match step.status {
                StepStatus::Completed => {
                    if streamed {
                        println!();
                    }
                    println!("{} {}", "✓".green(), step.id);
                }
                StepStatus::Error => {
                    if streamed {
                        println!();
                    }
                    println!("{} {}", "✗".red(), step.id);
                }
                StepStatus::Pending | StepStatus::Running => {}
            }
        }
    }

    fn progress(&mut self, message: &str) {
        println!("{}", message.dimmed());
    }
}

fn print_value(value: &Value) {
    match value {
        Value::String(text) => println!("{}", text),
        other => println!(
            "{}",
            serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string())
        ),
    }
}

/// Main application entry point.
async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(config.verbose);
    print_banner();

    let path = config.pipeline_path.clone().unwrap_or_default();
    let mut workflow = load_workflow(&path).map_err(|e| {
        error!("Failed to load pipeline: {}", e);
        format!("Could not load pipeline from '{}': {}", path, e)
    })?;
    info!("Pipeline loaded: {} steps", workflow.len());

    if let Some(input) = &config.input {
        apply_input(&mut workflow, input);
    }

    let mut host = CliHost::new();
    if let Some(url) = &config.page_url {
        host.set_page_url(url.clone());
    }

    let mut engine = Engine::new(workflow, Arc::new(host));

    if config.dry_run {
        info!("Mode: DRY RUN (no step will execute)");
        println!();
        print_plan(&engine);
        return Ok(());
    }

    let mut observer = TerminalObserver::default();
    let outcome = engine.run(&mut observer).await;

    println!();
    print!("{}", engine.timeline().summary());
    println!();

    let report = outcome?;
    if config.json {
        println!("{}", serde_json::to_string_pretty(&report.data)?);
    } else {
        print_value(&report.final_output);
    }
    info!(
        "Run started {} finished successfully",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepline::StepKind;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("stepline")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_arguments() {
        let config = parse_arguments(&args(&[
            "p.yaml", "--input", "hi", "--page", "https://a.io", "--json",
        ]))
        .unwrap();

        assert_eq!(config.pipeline_path.as_deref(), Some("p.yaml"));
        assert_eq!(config.input.as_deref(), Some("hi"));
        assert_eq!(config.page_url.as_deref(), Some("https://a.io"));
        assert!(config.json);
        assert!(!config.dry_run);
    }

    #[test]
    fn test_parse_arguments_errors() {
        assert!(parse_arguments(&args(&[])).is_err());
        assert!(parse_arguments(&args(&["p.yaml", "--input"])).is_err());
        assert!(parse_arguments(&args(&["p.yaml", "--bogus"])).is_err());
        assert!(parse_arguments(&args(&["a.yaml", "b.yaml"])).is_err());
    }

    #[test]
    fn test_apply_input_skips_output_format() {
        let mut workflow = Workflow::from_steps(vec![
            Step::new("fmt", StepKind::OutputFormat(Default::default())),
            Step::new("in", StepKind::TextInput(Default::default())),
        ]);

        apply_input(&mut workflow, "typed");

        assert_eq!(workflow.steps[0].materialized_value, None);
        assert_eq!(
            workflow.steps[1].materialized_value,
            Some(Value::String("typed".to_string()))
        );
    }
}
