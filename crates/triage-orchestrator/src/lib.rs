//! Ticket lifecycle: classification, planning, the approval gate and execution.

mod executor;
mod infra_query;
mod orchestrator;

pub use executor::{transition, Executor, ExecutorEvent, ExecutorState, InvalidTransition};
pub use infra_query::InfrastructureQuery;
pub use orchestrator::{Orchestrator, OrchestratorComponents};
