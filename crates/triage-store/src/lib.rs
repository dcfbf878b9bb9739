//! Persistence for tickets, operator feedback and the command audit trail.

mod audit_log;
mod feedback_log;
mod jsonl_log;
mod store_locking;
mod ticket_file;
mod ticket_store;

pub use audit_log::CommandAuditLog;
pub use feedback_log::{FeedbackLog, FeedbackRecord, FEEDBACK_RATING_MAX, FEEDBACK_RATING_MIN};
pub use jsonl_log::LogRotation;
pub use ticket_store::{TicketLease, TicketStore};

pub const TICKETS_FILE_NAME: &str = "tickets.json";
pub const FEEDBACK_FILE_NAME: &str = "feedback.jsonl";
pub const COMMAND_AUDIT_FILE_NAME: &str = "command-audit.jsonl";
