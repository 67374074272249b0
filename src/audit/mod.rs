//! Session audit trail: bounded drift history, compliance scoring, and
//! JSON/CSV report export.

pub mod log;
pub mod types;

pub use log::{AuditLog, ScoreWeights};
pub use types::{AuditEntry, ReportHeader, SessionReport};
