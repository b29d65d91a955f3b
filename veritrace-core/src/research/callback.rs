//! Progress callbacks for the planning loop.

use super::report::SessionOutcome;
use super::router::RouteName;
use std::sync::Mutex;

/// Callback for observing a research session as it runs.
pub trait PlannerCallback: Send + Sync {
    /// Called before the browsing actor receives `command`.
    fn on_step_start(&self, step: usize, command: &str);
    /// Called with the browsing actor's result.
    fn on_browser_result(&self, step: usize, result: &str);
    /// Called once the router has chosen a route.
    fn on_route(&self, step: usize, route: RouteName);
    /// Called with the refined command or final answer for this step.
    fn on_instruction(&self, step: usize, instruction: &str);
    /// Called once when the session reaches a terminal state.
    fn on_complete(&self, outcome: SessionOutcome);
}

/// No-op callback.
pub struct NoOpPlannerCallback;

impl PlannerCallback for NoOpPlannerCallback {
    fn on_step_start(&self, _step: usize, _command: &str) {}
    fn on_browser_result(&self, _step: usize, _result: &str) {}
    fn on_route(&self, _step: usize, _route: RouteName) {}
    fn on_instruction(&self, _step: usize, _instruction: &str) {}
    fn on_complete(&self, _outcome: SessionOutcome) {}
}

/// An event captured by [`RecordingPlannerCallback`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannerEvent {
    StepStart { step: usize, command: String },
    BrowserResult { step: usize, result: String },
    Route { step: usize, route: RouteName },
    Instruction { step: usize, instruction: String },
    Complete(SessionOutcome),
}

/// Callback that records every event, for tests.
#[derive(Default)]
pub struct RecordingPlannerCallback {
    events: Mutex<Vec<PlannerEvent>>,
}

impl RecordingPlannerCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PlannerEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Routes in the order they were reported.
    pub fn routes(&self) -> Vec<RouteName> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                PlannerEvent::Route { route, .. } => Some(*route),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: PlannerEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl PlannerCallback for RecordingPlannerCallback {
    fn on_step_start(&self, step: usize, command: &str) {
        self.push(PlannerEvent::StepStart {
            step,
            command: command.to_string(),
        });
    }

    fn on_browser_result(&self, step: usize, result: &str) {
        self.push(PlannerEvent::BrowserResult {
            step,
            result: result.to_string(),
        });
    }

    fn on_route(&self, step: usize, route: RouteName) {
        self.push(PlannerEvent::Route { step, route });
    }

    fn on_instruction(&self, step: usize, instruction: &str) {
        self.push(PlannerEvent::Instruction {
            step,
            instruction: instruction.to_string(),
        });
    }

    fn on_complete(&self, outcome: SessionOutcome) {
        self.push(PlannerEvent::Complete(outcome));
    }
}
