//! Planner — the top-level research loop.
//!
//! Each iteration sends the current command to the browsing actor, folds the
//! extracted facts into memory, verifies the result, asks the router for a
//! route, and either finalizes or derives the next command. The loop stops on
//! a final answer or once the time budget is spent.

use super::callback::{NoOpPlannerCallback, PlannerCallback};
use super::memory::ResearchMemory;
use super::parse;
use super::prompts;
use super::report::{SessionOutcome, SessionReport, StepRecord, compose_final_answer};
use super::router::{RouteName, Router};
use super::verifier::{VerificationRecord, Verifier};
use crate::brain::Brain;
use crate::browser::BrowsingActor;
use crate::config::PromptConfig;
use crate::error::{LlmError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// What a step decided to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    /// The session is over; this is the final answer text.
    Final(String),
    /// Send this command to the browsing actor next.
    Command(String),
}

/// The outcome of a single decision step.
#[derive(Debug, Clone)]
pub struct StepDecision {
    pub route: RouteName,
    pub verification: VerificationRecord,
    pub next: NextStep,
}

/// Drives one research session.
pub struct Planner {
    brain: Brain,
    actor: Arc<dyn BrowsingActor>,
    prompts: PromptConfig,
    callback: Arc<dyn PlannerCallback>,
    memory: ResearchMemory,
}

impl Planner {
    pub fn new(brain: Brain, actor: Arc<dyn BrowsingActor>) -> Self {
        Self {
            brain,
            actor,
            prompts: PromptConfig::default(),
            callback: Arc::new(NoOpPlannerCallback),
            memory: ResearchMemory::new(),
        }
    }

    pub fn with_prompts(mut self, prompts: PromptConfig) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_callback(mut self, callback: Arc<dyn PlannerCallback>) -> Self {
        self.callback = callback;
        self
    }

    /// Start from an existing memory instead of an empty one.
    pub fn with_memory(mut self, memory: ResearchMemory) -> Self {
        self.memory = memory;
        self
    }

    pub fn memory(&self) -> &ResearchMemory {
        &self.memory
    }

    pub fn brain(&self) -> &Brain {
        &self.brain
    }

    /// Run the loop from `initial_command` until a final answer or until
    /// `time_budget` has elapsed.
    ///
    /// The budget is checked at the top of every iteration; a step already in
    /// flight always completes. Failures of the browsing actor or the
    /// completion service abort the session.
    ///
    /// Invariant: at the top of step `n`, `n - 1` routes have been recorded
    /// during this run.
    pub async fn run(
        &mut self,
        initial_command: &str,
        time_budget: Duration,
    ) -> Result<SessionReport> {
        let start = Instant::now();
        let mut report = SessionReport::new(initial_command);
        let mut command = initial_command.to_string();
        let mut step = 1;
        let prior_routes = self.memory.route_history().len();

        info!(
            session = %report.id,
            budget_secs = time_budget.as_secs(),
            "Research session started"
        );

        loop {
            if start.elapsed() >= time_budget {
                warn!(step, elapsed_secs = start.elapsed().as_secs(), "Time budget exhausted");
                report.outcome = SessionOutcome::TimedOut;
                break;
            }
            debug_assert_eq!(self.memory.route_history().len(), prior_routes + step - 1);

            info!(step, command = %command, "Dispatching browser command");
            self.callback.on_step_start(step, &command);

            let result = self.actor.run(&command).await?;
            self.callback.on_browser_result(step, &result);

            let decision = self.decide_next_step(&result).await?;
            self.callback.on_route(step, decision.route);

            let instruction = match &decision.next {
                NextStep::Final(answer) | NextStep::Command(answer) => answer.clone(),
            };
            self.callback.on_instruction(step, &instruction);
            report.steps.push(StepRecord {
                index: step,
                command: command.clone(),
                result,
                route: decision.route,
                instruction: instruction.clone(),
            });

            match decision.next {
                NextStep::Final(answer) => {
                    info!(step, "Research complete, final answer generated");
                    report.final_answer = Some(answer);
                    report.outcome = SessionOutcome::Finalized;
                    break;
                }
                NextStep::Command(next) => {
                    command = next;
                    step += 1;
                }
            }
        }

        report.memory = self.memory.clone();
        report.usage = self.brain.total_usage();
        report.elapsed_secs = start.elapsed().as_secs_f64();
        self.callback.on_complete(report.outcome);
        Ok(report)
    }

    /// Process one browsing result: update memory, verify, route, and derive
    /// what happens next.
    pub async fn decide_next_step(
        &mut self,
        browser_result: &str,
    ) -> std::result::Result<StepDecision, LlmError> {
        let verifier = Verifier::new(
            &self.brain,
            &self.prompts.verify,
            &self.prompts.extract_facts,
        );

        let facts = verifier.extract_facts(browser_result).await?;
        let added = self.memory.merge_facts(facts);
        debug!(
            added,
            total = self.memory.verified_facts().len(),
            "Memory updated with extracted facts"
        );

        let verification = verifier.verify(browser_result).await?;

        let route = Router::new(&self.brain, &self.prompts.route)
            .decide_route(&mut self.memory, &verification)
            .await?;

        let Some(instruction) = route.instruction(&verification.missing_info) else {
            return Ok(StepDecision {
                route,
                verification,
                next: NextStep::Final(compose_final_answer(&self.memory)),
            });
        };

        let next = self.refine_command(route, &verification, &instruction).await?;
        Ok(StepDecision {
            route,
            verification,
            next,
        })
    }

    /// Ask the completion service to turn a route instruction into the next
    /// command. A reply starting with `FINAL ANSWER:` ends the session.
    async fn refine_command(
        &self,
        route: RouteName,
        verification: &VerificationRecord,
        instruction: &str,
    ) -> std::result::Result<NextStep, LlmError> {
        let credibility = verification.credibility_label();
        let missing = prompts::render_list(&verification.missing_info);
        let contradictions = prompts::render_list(&verification.contradictions);
        let prompt = prompts::render(
            &self.prompts.next_command,
            &[
                ("credibility_score", credibility.as_str()),
                ("missing_info", missing.as_str()),
                ("contradictions", contradictions.as_str()),
                ("route", route.as_str()),
                ("instruction", instruction),
            ],
        )?;

        let reply = self.brain.predict(&prompt).await?;
        if parse::is_final_answer(&reply) {
            Ok(NextStep::Final(parse::normalize_digit_commas(&reply)))
        } else {
            Ok(NextStep::Command(reply))
        }
    }
}
