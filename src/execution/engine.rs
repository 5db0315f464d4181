//! Workflow Runner
//!
//! Drives a pipeline from its first executable step to its last:
//! - resets every step and runs the schema propagation pass
//! - seeds the data bag from an input-shaped first step
//! - runs each executable step in order, feeding it the previous output
//! - forwards streamed generation text to the observer as it arrives
//! - stops at the first failing step
//!
//! Only the runner writes to the step records and the data bag.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde_json::Value;

use crate::error::EngineError;
use crate::host::Host;
use crate::monitoring::{EventType, ExecutionTimeline};
use crate::workflow::model::{Step, StepDescriptor, StepKind, StepStatus, Workflow};
use crate::workflow::planner::{propagate_schemas, ExecutionPlan};
use crate::workflow::state::DataBag;
use crate::workflow::validator::validate_workflow;

use super::budget::TokenBudget;
use super::observer::RunObserver;
use super::step::{execute_step, StepContext};

/// What a completed run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Final data bag: `input`, `output` and every published key
    pub data: DataBag,
    /// Output of the last executed step
    pub final_output: Value,
    pub timeline: ExecutionTimeline,
    pub started_at: DateTime<Utc>,
}

/// Pipeline execution engine.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use stepline::execution::Engine;
/// use stepline::host::CliHost;
/// use stepline::workflow::model::Step;
/// use stepline::load_workflow;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let workflow = load_workflow("pipeline.yaml")?;
///     let mut engine = Engine::new(workflow, Arc::new(CliHost::new()));
///
///     let report = engine.run(&mut |_: &[Step]| {}).await?;
///     println!("{}", report.final_output);
///     Ok(())
/// }
/// ```
pub struct Engine {
    workflow: Workflow,
    host: Arc<dyn Host>,
    budget: TokenBudget,
    timeline: ExecutionTimeline,
}

impl Engine {
    pub fn new(workflow: Workflow, host: Arc<dyn Host>) -> Self {
        Self {
            workflow,
            host,
            budget: TokenBudget::default(),
            timeline: ExecutionTimeline::new(),
        }
    }

    /// Replaces the prompt budget used by generation steps.
    pub fn set_token_budget(&mut self, budget: TokenBudget) {
        self.budget = budget;
    }

    /// Step records as of the last change: statuses, logs, previews.
    pub fn steps(&self) -> &[Step] {
        &self.workflow.steps
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Timeline of the most recent run, including one that failed.
    pub fn timeline(&self) -> &ExecutionTimeline {
        &self.timeline
    }

    /// Computes the execution plan without running anything.
    pub fn plan(&self) -> ExecutionPlan {
        let mut steps = self.workflow.steps.clone();
        propagate_schemas(&mut steps)
    }

    /// Builds a pipeline from descriptors and runs it.
    ///
    /// A descriptor with an unknown kind fails the call before any step runs.
    pub async fn run_descriptors(
        descriptors: Vec<StepDescriptor>,
        host: Arc<dyn Host>,
        observer: &mut dyn RunObserver,
    ) -> Result<RunReport, EngineError> {
        let workflow = Workflow::from_descriptors(descriptors)?;
        Engine::new(workflow, host).run(observer).await
    }

    /// Runs the pipeline to completion or to its first failure.
    ///
    /// # Returns
    ///
    /// * `Ok(RunReport)` - Every executable step completed
    /// * `Err(EngineError)` - The pipeline was invalid or a step failed;
    ///   the failed step is left in `Error` and later steps in `Pending`
    pub async fn run(&mut self, observer: &mut dyn RunObserver) -> Result<RunReport, EngineError> {
        validate_workflow(&self.workflow)?;

        let started_at = Utc::now();
        self.timeline = ExecutionTimeline::new();

        for step in &mut self.workflow.steps {
            step.reset();
        }
        observer.steps_changed(&self.workflow.steps);

        let plan = propagate_schemas(&mut self.workflow.steps);
        let order = plan.executable_indices().to_vec();
        info!(
            "Starting run of {} steps ({} schema merges, host: {})",
            order.len(),
            plan.merges().len(),
            self.host.name()
        );

        let mut data = DataBag::new();
        if let Some(&first) = order.first() {
            let step = &self.workflow.steps[first];
            if step.kind.is_input_shaped() {
                if let Some(value) = &step.materialized_value {
                    data.seed(step, value.clone());
                }
            }
        }

        let total = order.len();
        for (position, &index) in order.iter().enumerate() {
            let upstream = if position == 0 {
                self.workflow.steps[index]
                    .materialized_value
                    .clone()
                    .unwrap_or(Value::Null)
            } else {
                data.output().clone()
            };

            self.start_step(index, order.get(position + 1).copied());
            observer.steps_changed(&self.workflow.steps);
            observer.progress(&format!(
                "Running step {} of {}: {}",
                position + 1,
                total,
                self.workflow.steps[index].id
            ));

            let step = self.workflow.steps[index].clone();
            let outcome = {
                let steps = &mut self.workflow.steps;
                let mut on_delta = |text: &str| {
                    steps[index].live_value = Some(text.to_string());
                    observer.steps_changed(&steps[..]);
                };
                let mut ctx = StepContext {
                    host: self.host.as_ref(),
                    budget: &self.budget,
                    on_delta: &mut on_delta,
                };
                execute_step(&step, upstream, &mut ctx).await
            };

            match outcome {
                Ok(result) => {
                    data.publish(&self.workflow.steps[index], result.output);

                    let record = &mut self.workflow.steps[index];
                    record.transition(StepStatus::Completed);
                    record.log(result.log);
                    if !result.success {
                        warn!("Step '{}' completed with a flagged result", record.id);
                    }
                    if let Some(tag) = result.branch.map(|b| b.to_string()) {
                        debug!("Step '{}' branch: {}", record.id, tag);
                        record.log(format!("Branch: {}", tag));
                    }
                    info!("Completed step: {}", record.id);

                    self.timeline.add_event(record.id.clone(), EventType::Completed);
                    observer.steps_changed(&self.workflow.steps);
                }
                Err(source) => {
                    let step_id = step.id.clone();
                    error!("Step '{}' failed: {}", step_id, source);

                    for other in &mut self.workflow.steps {
                        other.receiving = false;
                    }
                    let record = &mut self.workflow.steps[index];
                    record.transition(StepStatus::Error);
                    record.log(format!("Error: {}", source));

                    self.timeline.add_event(step_id.clone(), EventType::Failed);
                    observer.steps_changed(&self.workflow.steps);
                    return Err(EngineError::StepFailed { step_id, source });
                }
            }
        }

        let final_output = data.output().clone();
        info!(
            "Run finished: {} steps in {} ms",
            total,
            self.timeline.elapsed().as_millis()
        );

        Ok(RunReport {
            data,
            final_output,
            timeline: self.timeline.clone(),
            started_at,
        })
    }

    /// Moves the step at `index` to `Running`.
    ///
    /// A text-output step right after a generation step is flagged as
    /// receiving so it can show the streamed text before its own turn.
    fn start_step(&mut self, index: usize, next: Option<usize>) {
        let generating = self.workflow.steps[index].kind.is_generation();
        if let Some(next) = next {
            let follower = &mut self.workflow.steps[next];
            if generating && matches!(follower.kind, StepKind::TextOutput) {
                follower.receiving = true;
            }
        }

        let step = &mut self.workflow.steps[index];
        step.transition(StepStatus::Running);
        info!("Starting step: {} ({})", step.id, step.kind.tag());
        self.timeline.add_event(step.id.clone(), EventType::Started);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{HostError, StepError};
    use crate::execution::observer::Recorder;
    use crate::host::testing::ScriptedHost;
    use crate::host::HttpResponse;
    use crate::workflow::model::{
        GenerationConfig, OutputFormatConfig, StringOpConfig, TextInputConfig, WebhookConfig,
    };
    use crate::workflow::validator::ValidationError;
    use serde_json::json;

    fn text_input(id: &str, text: &str) -> Step {
        Step::new(id, StepKind::TextInput(TextInputConfig::default())).with_materialized_value(text)
    }

    fn uppercase(id: &str) -> Step {
        Step::new(id, StepKind::StringOp(StringOpConfig::new("uppercase", "")))
    }

    fn generation(id: &str) -> Step {
        Step::new(id, StepKind::ChatAgent(GenerationConfig::default()))
    }

    fn engine(steps: Vec<Step>, host: ScriptedHost) -> Engine {
        Engine::new(Workflow::from_steps(steps), Arc::new(host))
    }

    fn running_count(steps: &[Step]) -> usize {
        steps
            .iter()
            .filter(|s| s.status == StepStatus::Running)
            .count()
    }

    #[tokio::test]
    async fn test_text_input_then_uppercase() {
        let mut engine = engine(
            vec![text_input("in", "hello"), uppercase("up")],
            ScriptedHost::new(),
        );

        let report = engine.run(&mut Recorder::default()).await.unwrap();

        assert_eq!(report.final_output, json!("INPUT TEXT: HELLO"));
        assert_eq!(report.data.input(), &json!("hello"));
        assert!(engine
            .steps()
            .iter()
            .all(|s| s.status == StepStatus::Completed));
    }

    #[tokio::test]
    async fn test_identifier_keys_are_published() {
        let mut engine = engine(
            vec![
                text_input("in", "hi").with_identifier("typed"),
                uppercase("up").with_output_type("shout"),
            ],
            ScriptedHost::new(),
        );

        let report = engine.run(&mut Recorder::default()).await.unwrap();

        assert_eq!(report.data.get("typed"), Some(&json!("Input text: hi")));
        assert_eq!(report.data.get("shout"), Some(&json!("INPUT TEXT: HI")));
    }

    #[tokio::test]
    async fn test_publish_keys_from_descriptor_config() {
        let descriptors: Vec<StepDescriptor> = serde_json::from_value(json!([
            {
                "id": "in",
                "kind": "textInput",
                "materializedValue": "hi",
                "config": {"identifier": "typed", "outputType": "text"}
            },
            {
                "id": "up",
                "kind": "stringOp",
                "config": {"operation": "uppercase", "identifier": "shout"}
            }
        ]))
        .unwrap();

        let report = Engine::run_descriptors(
            descriptors,
            Arc::new(ScriptedHost::new()),
            &mut Recorder::default(),
        )
        .await
        .unwrap();

        assert_eq!(report.data.get("typed"), Some(&json!("Input text: hi")));
        assert_eq!(report.data.get("text"), Some(&json!("Input text: hi")));
        assert_eq!(report.data.get("shout"), Some(&json!("INPUT TEXT: HI")));
        assert_eq!(report.final_output, json!("INPUT TEXT: HI"));
    }

    #[tokio::test]
    async fn test_webhook_failure_aborts_run() {
        let host = ScriptedHost::new()
            .with_fetch_result(Err(HostError::Network("no route to host".to_string())));
        let mut engine = engine(
            vec![
                text_input("in", "x"),
                Step::new("hook", StepKind::Webhook(WebhookConfig::new("GET", "https://bad.invalid"))),
                uppercase("after"),
            ],
            host,
        );

        let err = engine.run(&mut Recorder::default()).await.unwrap_err();

        assert_eq!(err.failed_step(), Some("hook"));
        assert!(matches!(
            err,
            EngineError::StepFailed {
                source: StepError::Host(HostError::Network(_)),
                ..
            }
        ));

        let steps = engine.steps();
        assert_eq!(steps[0].status, StepStatus::Completed);
        assert_eq!(steps[1].status, StepStatus::Error);
        assert!(steps[1].logs.last().unwrap().contains("no route to host"));
        assert_eq!(steps[2].status, StepStatus::Pending);
        assert!(steps[2].logs.is_empty());
    }

    #[tokio::test]
    async fn test_http_error_status_fails_step() {
        let host = ScriptedHost::new().with_fetch_result(Ok(HttpResponse {
            status: 404,
            status_text: "Not Found".to_string(),
            body: String::new(),
        }));
        let mut engine = engine(
            vec![
                text_input("in", "x"),
                Step::new("hook", StepKind::Webhook(WebhookConfig::new("POST", "https://h.io"))),
            ],
            host,
        );

        let err = engine.run(&mut Recorder::default()).await.unwrap_err();
        assert!(err.to_string().contains("404 Not Found"));
        assert_eq!(engine.steps()[1].status, StepStatus::Error);
    }

    #[tokio::test]
    async fn test_at_most_one_running_step_in_every_snapshot() {
        let mut engine = engine(
            vec![
                text_input("in", "hello"),
                generation("gen"),
                Step::new("show", StepKind::TextOutput),
                uppercase("up"),
            ],
            ScriptedHost::new(),
        );
        let mut recorder = Recorder::default();

        engine.run(&mut recorder).await.unwrap();

        assert!(!recorder.snapshots.is_empty());
        for snapshot in &recorder.snapshots {
            assert!(running_count(snapshot) <= 1);
        }
    }

    #[tokio::test]
    async fn test_streamed_previews_reach_observer_before_completion() {
        let host = ScriptedHost::new().with_chunks(&["Hel", "lo"]);
        let mut engine = engine(
            vec![
                text_input("in", "hi"),
                generation("gen"),
                Step::new("show", StepKind::TextOutput),
            ],
            host,
        );
        let mut recorder = Recorder::default();

        let report = engine.run(&mut recorder).await.unwrap();
        assert_eq!(report.final_output, json!("Hello"));

        let previews: Vec<&Step> = recorder
            .snapshots
            .iter()
            .map(|s| &s[1])
            .filter(|s| s.status == StepStatus::Running && s.live_value.is_some())
            .collect();
        assert_eq!(previews.len(), 2);
        assert_eq!(previews[0].live_value.as_deref(), Some("Hel"));
        assert_eq!(previews[1].live_value.as_deref(), Some("Hello"));

        let receiving = recorder
            .snapshots
            .iter()
            .any(|s| s[1].status == StepStatus::Running && s[2].receiving);
        assert!(receiving);
        assert!(!engine.steps()[2].receiving);
    }

    #[tokio::test]
    async fn test_output_format_merged_and_skipped() {
        let host = ScriptedHost::new().with_chunks(&["{\"title\": \"T\"}"]);
        let mut engine = engine(
            vec![
                text_input("in", "hi"),
                Step::new(
                    "fmt",
                    StepKind::OutputFormat(OutputFormatConfig {
                        schema: json!({"title": "string"}),
                    }),
                ),
                generation("gen"),
            ],
            host,
        );
        let report = engine.run(&mut Recorder::default()).await.unwrap();

        assert_eq!(report.final_output, json!({"title": "T"}));
        assert_eq!(engine.steps()[1].status, StepStatus::Pending);
        assert_eq!(report.timeline.timings().len(), 2);
    }

    #[tokio::test]
    async fn test_progress_messages() {
        let mut engine = engine(
            vec![text_input("in", "a"), uppercase("up")],
            ScriptedHost::new(),
        );
        let mut recorder = Recorder::default();

        engine.run(&mut recorder).await.unwrap();

        assert_eq!(
            recorder.messages,
            vec!["Running step 1 of 2: in", "Running step 2 of 2: up"]
        );
    }

    #[tokio::test]
    async fn test_rerun_resets_logs() {
        let mut engine = engine(vec![text_input("in", "a")], ScriptedHost::new());

        engine.run(&mut Recorder::default()).await.unwrap();
        engine.run(&mut Recorder::default()).await.unwrap();

        assert_eq!(engine.steps()[0].logs.len(), 1);
        assert_eq!(engine.steps()[0].status, StepStatus::Completed);
    }

    #[tokio::test]
    async fn test_conditional_tag_logged_without_skipping() {
        use crate::workflow::model::{ComparisonOperator, ConditionalConfig};

        let mut engine = engine(
            vec![
                text_input("in", "a"),
                Step::new(
                    "cmp",
                    StepKind::Conditional(ConditionalConfig::new(ComparisonOperator::Equals, "nope")),
                ),
                uppercase("up"),
            ],
            ScriptedHost::new(),
        );

        let report = engine.run(&mut Recorder::default()).await.unwrap();

        assert_eq!(report.final_output, json!("INPUT TEXT: A"));
        assert!(engine.steps()[1].logs.iter().any(|l| l == "Branch: false"));
    }

    #[tokio::test]
    async fn test_unknown_kind_aborts_before_any_step() {
        let host = Arc::new(ScriptedHost::new());
        let descriptors = vec![
            StepDescriptor {
                id: "hook".to_string(),
                kind: "webhook".to_string(),
                config: json!({"method": "GET", "endpoint": "https://h.io"}),
                materialized_value: None,
                identifier: None,
                output_type: None,
            },
            StepDescriptor {
                id: "mystery".to_string(),
                kind: "teleport".to_string(),
                config: Value::Null,
                materialized_value: None,
                identifier: None,
                output_type: None,
            },
        ];

        let err = Engine::run_descriptors(descriptors, host.clone(), &mut Recorder::default())
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::UnknownKind { ref kind, .. } if kind == "teleport"));
        assert!(host.last_fetch().is_none());
    }

    #[tokio::test]
    async fn test_empty_workflow_rejected() {
        let mut engine = engine(Vec::new(), ScriptedHost::new());
        let err = engine.run(&mut Recorder::default()).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::EmptyWorkflow)
        ));
    }

    #[tokio::test]
    async fn test_failed_run_keeps_timeline() {
        let host = ScriptedHost::new()
            .with_fetch_result(Err(HostError::Network("down".to_string())));
        let mut engine = engine(
            vec![
                text_input("in", "x"),
                Step::new("hook", StepKind::Webhook(WebhookConfig::new("GET", "https://h.io"))),
            ],
            host,
        );

        assert!(engine.run(&mut Recorder::default()).await.is_err());

        let timings = engine.timeline().timings();
        assert_eq!(timings.len(), 2);
        assert!(timings[1].failed);
    }

    #[tokio::test]
    async fn test_plan_leaves_steps_untouched() {
        let engine = engine(
            vec![
                Step::new(
                    "fmt",
                    StepKind::OutputFormat(OutputFormatConfig {
                        schema: json!({"a": "string"}),
                    }),
                ),
                generation("gen"),
            ],
            ScriptedHost::new(),
        );

        let plan = engine.plan();

        assert_eq!(plan.executable_indices(), &[1]);
        assert_eq!(plan.merges().len(), 1);
        assert!(engine.steps()[0].logs.is_empty());
    }
}
