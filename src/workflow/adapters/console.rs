//! Line-oriented approval prompt over any reader/writer pair.

use std::io::{BufRead, Write};
use std::sync::Mutex;

use crate::task::domain::TaskId;
use crate::workflow::domain::{Decision, Gate, INTERACTIVE_APPROVER, StageSnapshot};
use crate::workflow::ports::{ApprovalPrompt, PromptError};

const SUMMARY_CHARS: usize = 100;

struct Console<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    fn ask(&mut self, question: &str) -> Result<String, PromptError> {
        write!(self.output, "{question}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(PromptError::Closed);
        }
        Ok(line.trim().to_owned())
    }

    fn show_plan(&mut self, task_id: TaskId, snapshot: &StageSnapshot) -> Result<(), PromptError> {
        writeln!(self.output, "\nPLAN APPROVAL REQUIRED (task {task_id})\n")?;
        writeln!(self.output, "{}", snapshot.plan.as_deref().unwrap_or("(no plan)"))?;
        Ok(())
    }

    fn show_implementation(
        &mut self,
        task_id: TaskId,
        snapshot: &StageSnapshot,
    ) -> Result<(), PromptError> {
        writeln!(self.output, "\nFINAL APPROVAL REQUIRED (task {task_id})\n")?;
        if let Some(report) = &snapshot.implementation {
            writeln!(
                self.output,
                "  Implementation: {} after {} iteration(s), {} action(s)",
                if report.success { "finished" } else { "incomplete" },
                report.iterations,
                report.actions.len()
            )?;
            if let Some(warning) = &report.sandbox_warning {
                writeln!(self.output, "  WARNING: {warning}")?;
            }
        }
        if let Some(review) = &snapshot.review {
            let summary: String = review.text.chars().take(SUMMARY_CHARS).collect();
            writeln!(self.output, "  Review: {summary}")?;
        }
        let verified = snapshot
            .verification
            .as_ref()
            .is_some_and(|report| report.passed);
        writeln!(
            self.output,
            "  Verification: {}",
            if verified { "PASSED" } else { "ISSUES DETECTED" }
        )?;
        Ok(())
    }

    fn plan_decision(&mut self) -> Result<Decision, PromptError> {
        loop {
            let answer = self.ask("\nDo you approve this plan? (yes/no/edit): ")?;
            match answer.to_lowercase().as_str() {
                "yes" | "y" => return Ok(Decision::approve(INTERACTIVE_APPROVER)),
                "no" | "n" => {
                    return Ok(Decision::reject("User rejected plan in interactive mode"));
                }
                "edit" => {
                    writeln!(self.output, "\nWhat changes would you like to the plan?")?;
                    let changes = self.ask("Changes: ")?;
                    return Ok(Decision::request_changes(changes));
                }
                _ => writeln!(self.output, "Please enter 'yes', 'no', or 'edit'")?,
            }
        }
    }

    fn implementation_decision(&mut self) -> Result<Decision, PromptError> {
        loop {
            let answer = self.ask("\nDo you approve the implementation? (yes/no/retry): ")?;
            match answer.to_lowercase().as_str() {
                "yes" | "y" => return Ok(Decision::approve(INTERACTIVE_APPROVER)),
                "no" | "n" => {
                    return Ok(Decision::reject(
                        "User rejected implementation in interactive mode",
                    ));
                }
                "retry" => return Ok(Decision::Retry { feedback: None }),
                _ => writeln!(self.output, "Please enter 'yes', 'no', or 'retry'")?,
            }
        }
    }
}

/// Prompts on a text stream, typically standard input and output.
pub struct ConsolePrompt<R, W> {
    console: Mutex<Console<R, W>>,
}

impl<R, W> ConsolePrompt<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    /// Creates a prompt reading from `input` and writing to `output`.
    #[must_use]
    pub const fn new(input: R, output: W) -> Self {
        Self {
            console: Mutex::new(Console { input, output }),
        }
    }
}

impl<R, W> ApprovalPrompt for ConsolePrompt<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn decide(
        &self,
        task_id: TaskId,
        gate: Gate,
        snapshot: &StageSnapshot,
    ) -> Result<Decision, PromptError> {
        let mut console = self
            .console
            .lock()
            .map_err(|_| PromptError::from(std::io::Error::other("console lock poisoned")))?;
        match gate {
            Gate::Plan => {
                console.show_plan(task_id, snapshot)?;
                console.plan_decision()
            }
            Gate::Implementation => {
                console.show_implementation(task_id, snapshot)?;
                console.implementation_decision()
            }
        }
    }
}
