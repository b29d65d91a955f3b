//! Console output for a running research session.

use veritrace_core::research::{PlannerCallback, RouteName, SessionOutcome};

/// Longest browser result echoed to the terminal per step.
const MAX_ECHO_CHARS: usize = 1200;

/// Prints each iteration's command, result, route, and instruction to stdout.
pub struct ConsoleCallback {
    quiet: bool,
}

impl ConsoleCallback {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

/// Shorten `text` to `max` characters for display.
fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}… ({} chars total)", &text[..cut], text.chars().count()),
        None => text.to_string(),
    }
}

impl PlannerCallback for ConsoleCallback {
    fn on_step_start(&self, step: usize, command: &str) {
        println!("\n\x1b[1mStep {}\x1b[0m \x1b[36mCommand:\x1b[0m {}", step, command);
    }

    fn on_browser_result(&self, _step: usize, result: &str) {
        if self.quiet {
            return;
        }
        println!("\x1b[90mResult:\x1b[0m\n{}", preview(result, MAX_ECHO_CHARS));
    }

    fn on_route(&self, _step: usize, route: RouteName) {
        if self.quiet {
            return;
        }
        println!("\x1b[33mRoute:\x1b[0m {}", route);
    }

    fn on_instruction(&self, _step: usize, instruction: &str) {
        if self.quiet {
            return;
        }
        println!("\x1b[32mNext:\x1b[0m {}", instruction);
    }

    fn on_complete(&self, outcome: SessionOutcome) {
        match outcome {
            SessionOutcome::Finalized => println!("\n\x1b[32mResearch complete.\x1b[0m"),
            SessionOutcome::TimedOut => println!("\n\x1b[33mTime budget exhausted.\x1b[0m"),
            SessionOutcome::Searching => {}
        }
    }
}
