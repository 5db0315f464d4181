//! Run Timeline
//!
//! Records when each pipeline step starts and finishes so a run can be
//! summarised once it ends, successfully or not.

use std::time::{Duration, Instant};

/// What happened to a step at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Started,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct TimelineEvent {
    pub step_id: String,
    pub event_type: EventType,
    /// Offset from the start of the run
    pub at: Duration,
}

/// Timing of one step, derived from its events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepTiming {
    pub step_id: String,
    pub started: Duration,
    /// None while the step is still running
    pub finished: Option<Duration>,
    pub failed: bool,
}

impl StepTiming {
    pub fn duration(&self) -> Option<Duration> {
        self.finished.map(|end| end.saturating_sub(self.started))
    }
}

/// Ordered log of step events for a single run.
#[derive(Debug, Clone)]
pub struct ExecutionTimeline {
    events: Vec<TimelineEvent>,
    start_time: Instant,
}

impl ExecutionTimeline {
    /// Creates a timeline whose clock starts now.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            start_time: Instant::now(),
        }
    }

    pub fn add_event(&mut self, step_id: impl Into<String>, event_type: EventType) {
        self.events.push(TimelineEvent {
            step_id: step_id.into(),
            event_type,
            at: self.start_time.elapsed(),
        });
    }

    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// Time since the timeline was created.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Per-step timings in the order the steps started.
    pub fn timings(&self) -> Vec<StepTiming> {
        let mut timings: Vec<StepTiming> = Vec::new();

        for event in &self.events {
            match event.event_type {
                EventType::Started => timings.push(StepTiming {
                    step_id: event.step_id.clone(),
                    started: event.at,
                    finished: None,
                    failed: false,
                }),
                EventType::Completed | EventType::Failed => {
                    if let Some(timing) = timings
                        .iter_mut()
                        .rev()
                        .find(|t| t.step_id == event.step_id && t.finished.is_none())
                    {
                        timing.finished = Some(event.at);
                        timing.failed = event.event_type == EventType::Failed;
                    }
                }
            }
        }

        timings
    }

    /// Renders one line per step plus a total.
    ///
    /// ```text
    /// read-page     ok       12 ms
    /// summarize     failed  803 ms
    /// Total: 815 ms
    /// ```
    pub fn summary(&self) -> String {
        let mut output = String::new();

        for timing in self.timings() {
            let (status, millis) = match timing.duration() {
                Some(d) if timing.failed => ("failed", d.as_millis()),
                Some(d) => ("ok", d.as_millis()),
                None => ("running", 0),
            };
            output.push_str(&format!(
                "{:14} {:8} {:>6} ms\n",
                truncate(&timing.step_id, 14),
                status,
                millis
            ));
        }

        let total = self
            .events
            .last()
            .map(|e| e.at)
            .unwrap_or_default()
            .as_millis();
        output.push_str(&format!("Total: {} ms\n", total));
        output
    }
}

impl Default for ExecutionTimeline {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
