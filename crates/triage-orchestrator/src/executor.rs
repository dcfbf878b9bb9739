use std::fmt;
use std::sync::Arc;

use triage_core::{
    current_rfc3339, ExecutionResult, ResolutionPlan, Step, StepOutcome, StepOutcomeState,
};
use triage_remote::RemoteCommandRunner;

/// Where the executor is within a plan. Step indices are zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Pending,
    RunningStep(usize),
    ValidatingStep(usize),
    StepSucceeded(usize),
    RollingBack(usize),
    Completed,
    Failed,
}

impl ExecutorState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::RunningStep(index) => write!(f, "running_step:{index}"),
            Self::ValidatingStep(index) => write!(f, "validating_step:{index}"),
            Self::StepSucceeded(index) => write!(f, "step_succeeded:{index}"),
            Self::RollingBack(index) => write!(f, "rolling_back:{index}"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorEvent {
    Start { step_count: usize },
    ActionFinished { success: bool, has_rollback: bool },
    ValidationFinished { success: bool, has_rollback: bool },
    RollbackFinished,
    Advance { step_count: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("event {event:?} is not valid in state {state}")]
pub struct InvalidTransition {
    pub state: ExecutorState,
    pub event: ExecutorEvent,
}

fn after_failure(index: usize, has_rollback: bool) -> ExecutorState {
    if has_rollback {
        ExecutorState::RollingBack(index)
    } else {
        ExecutorState::Failed
    }
}

/// The executor's transition function.
///
/// A failed step rolls back only itself and then fails the run; earlier
/// steps are never revisited.
pub fn transition(
    state: ExecutorState,
    event: ExecutorEvent,
) -> Result<ExecutorState, InvalidTransition> {
    use ExecutorEvent as E;
    use ExecutorState as S;

    let next = match (state, event) {
        (S::Pending, E::Start { step_count: 0 }) => S::Failed,
        (S::Pending, E::Start { .. }) => S::RunningStep(0),
        (S::RunningStep(index), E::ActionFinished { success: true, .. }) => {
            S::ValidatingStep(index)
        }
        (
            S::RunningStep(index),
            E::ActionFinished {
                success: false,
                has_rollback,
            },
        ) => after_failure(index, has_rollback),
        (S::ValidatingStep(index), E::ValidationFinished { success: true, .. }) => {
            S::StepSucceeded(index)
        }
        (
            S::ValidatingStep(index),
            E::ValidationFinished {
                success: false,
                has_rollback,
            },
        ) => after_failure(index, has_rollback),
        (S::RollingBack(_), E::RollbackFinished) => S::Failed,
        (S::StepSucceeded(index), E::Advance { step_count }) if index + 1 < step_count => {
            S::RunningStep(index + 1)
        }
        (S::StepSucceeded(_), E::Advance { .. }) => S::Completed,
        (state, event) => return Err(InvalidTransition { state, event }),
    };
    Ok(next)
}

struct Run {
    state: ExecutorState,
    transitions: Vec<String>,
}

impl Run {
    fn new() -> Self {
        Self {
            state: ExecutorState::Pending,
            transitions: vec![ExecutorState::Pending.to_string()],
        }
    }

    fn apply(&mut self, event: ExecutorEvent) {
        let next = transition(self.state, event).unwrap_or_else(|error| {
            tracing::error!(error = %error, "executor transition rejected, failing run");
            ExecutorState::Failed
        });
        self.state = next;
        self.transitions.push(next.to_string());
    }
}

/// Runs an approved plan step by step through the guarded runner.
#[derive(Clone)]
pub struct Executor {
    runner: Arc<dyn RemoteCommandRunner>,
}

impl Executor {
    pub fn new(runner: Arc<dyn RemoteCommandRunner>) -> Self {
        Self { runner }
    }

    pub async fn execute(&self, plan: &ResolutionPlan) -> ExecutionResult {
        let server = plan.server.as_str();
        let steps = &plan.resolution_steps;
        let started_at = current_rfc3339();
        let mut results: Vec<StepOutcome> = Vec::with_capacity(steps.len());
        let mut run = Run::new();
        run.apply(ExecutorEvent::Start {
            step_count: steps.len(),
        });

        while !run.state.is_terminal() {
            match run.state {
                ExecutorState::RunningStep(index) => {
                    let step = &steps[index];
                    let action = self.runner.run(server, step.action()).await;
                    tracing::info!(
                        server,
                        step = index + 1,
                        success = action.success,
                        command = %action.command,
                        "plan step action finished"
                    );
                    let success = action.success;
                    results.push(StepOutcome {
                        index,
                        command: step.action().to_string(),
                        output: action.output,
                        success: false,
                        state: StepOutcomeState::Failed,
                        action_failure: action.failure,
                        validation: None,
                        rollback: None,
                    });
                    run.apply(ExecutorEvent::ActionFinished {
                        success,
                        has_rollback: has_rollback(step),
                    });
                }
                ExecutorState::ValidatingStep(index) => {
                    let step = &steps[index];
                    let validation = self.runner.run(server, &step.validation).await;
                    let success = validation.success;
                    if let Some(outcome) = results.last_mut() {
                        outcome.validation = Some(validation);
                    }
                    run.apply(ExecutorEvent::ValidationFinished {
                        success,
                        has_rollback: has_rollback(step),
                    });
                }
                ExecutorState::StepSucceeded(_) => {
                    if let Some(outcome) = results.last_mut() {
                        outcome.success = true;
                        outcome.state = StepOutcomeState::Succeeded;
                    }
                    run.apply(ExecutorEvent::Advance {
                        step_count: steps.len(),
                    });
                }
                ExecutorState::RollingBack(index) => {
                    let rollback = steps[index].rollback.as_deref().unwrap_or_default();
                    let outcome = self.runner.run(server, rollback).await;
                    tracing::warn!(
                        server,
                        step = index + 1,
                        success = outcome.success,
                        "rollback finished"
                    );
                    if let Some(entry) = results.last_mut() {
                        if outcome.success {
                            entry.state = StepOutcomeState::RolledBack;
                        }
                        entry.rollback = Some(outcome);
                    }
                    run.apply(ExecutorEvent::RollbackFinished);
                }
                ExecutorState::Pending | ExecutorState::Completed | ExecutorState::Failed => break,
            }
        }

        let successful = run.state == ExecutorState::Completed;
        tracing::info!(
            server,
            service = %plan.service,
            successful,
            steps = results.len(),
            "plan execution finished"
        );
        ExecutionResult {
            successful,
            server: plan.server.clone(),
            service: plan.service.clone(),
            timestamp: started_at,
            results,
            transitions: run.transitions,
            finished_at: Some(current_rfc3339()),
        }
    }
}

fn has_rollback(step: &Step) -> bool {
    step.rollback
        .as_deref()
        .is_some_and(|rollback| !rollback.trim().is_empty())
}
