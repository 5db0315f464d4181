//! Run Observers
//!
//! The engine reports every change to the step records through a
//! [`RunObserver`]: status transitions, appended logs and streamed previews.
//! Any `FnMut(&[Step])` closure already is one; [`with_progress`] pairs it
//! with a second closure for short progress lines.

use crate::workflow::model::Step;

/// Receives snapshots of the step records while a run advances.
pub trait RunObserver {
    /// Called after any step record changed, with every step in order.
    fn steps_changed(&mut self, steps: &[Step]);

    /// Short human-readable progress line ("Running step 2 of 5: ...").
    fn progress(&mut self, _message: &str) {}
}

impl<F> RunObserver for F
where
    F: FnMut(&[Step]),
{
    fn steps_changed(&mut self, steps: &[Step]) {
        self(steps)
    }
}

/// Observer built from two closures.
pub struct ProgressObserver<S, P> {
    on_steps: S,
    on_progress: P,
}

impl<S, P> RunObserver for ProgressObserver<S, P>
where
    S: FnMut(&[Step]),
    P: FnMut(&str),
{
    fn steps_changed(&mut self, steps: &[Step]) {
        (self.on_steps)(steps)
    }

    fn progress(&mut self, message: &str) {
        (self.on_progress)(message)
    }
}

/// Joins a step-snapshot closure and a progress closure into one observer.
pub fn with_progress<S, P>(on_steps: S, on_progress: P) -> ProgressObserver<S, P>
where
    S: FnMut(&[Step]),
    P: FnMut(&str),
{
    ProgressObserver {
        on_steps,
        on_progress,
    }
}

/// Observer that keeps every snapshot it receives.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct Recorder {
    pub snapshots: Vec<Vec<Step>>,
    pub messages: Vec<String>,
}

#[cfg(test)]
impl RunObserver for Recorder {
    fn steps_changed(&mut self, steps: &[Step]) {
        self.snapshots.push(steps.to_vec());
    }

    fn progress(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }
}
