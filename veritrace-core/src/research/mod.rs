//! Research loop — verification, routing, and the planning cycle.
//!
//! One session repeatedly:
//! 1. **Browse** — send the current command to a [`BrowsingActor`](crate::browser::BrowsingActor)
//! 2. **Extract** — pull source-attributed facts into [`ResearchMemory`]
//! 3. **Verify** — score the result's credibility
//! 4. **Route** — pick one of five next actions
//! 5. **Refine** — derive the next command, or compose the final answer
//!
//! until a final answer is produced or the time budget runs out.

pub mod callback;
pub mod memory;
pub mod parse;
pub mod planner;
pub mod prompts;
pub mod report;
pub mod router;
pub mod verifier;

pub use callback::{NoOpPlannerCallback, PlannerCallback, PlannerEvent, RecordingPlannerCallback};
pub use memory::{Fact, ResearchMemory};
pub use planner::{NextStep, Planner, StepDecision};
pub use report::{SessionOutcome, SessionReport, StepRecord, compose_final_answer};
pub use router::{RouteName, Router};
pub use verifier::{VerificationRecord, Verifier};
