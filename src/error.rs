//! Error taxonomy for queue operations.
//!
//! A lost claim race is deliberately not represented here: `claim_task`
//! returns `Ok(None)` for it, so callers can cheaply move on to other work.

use crate::types::TaskStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    /// Malformed input; nothing was mutated.
    #[error("{field} is required")]
    Validation { field: &'static str },

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    /// Claim attempted while one or more dependencies are not completed.
    #[error("task {task_id} blocked by incomplete dependencies: {}", .unmet.join(", "))]
    DependencyNotSatisfied { task_id: String, unmet: Vec<String> },

    /// Lifecycle operation attempted on a task in the wrong state, e.g. a
    /// complete call from a claimant whose claim was already swept away.
    #[error("task {task_id} is {actual}, expected {expected}")]
    InvalidState {
        task_id: String,
        actual: TaskStatus,
        expected: TaskStatus,
    },

    /// Underlying persistence failure; the attempted transition's outcome is
    /// unknown and must be surfaced.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("storage encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("migration error: {0}")]
    Migration(#[from] Box<refinery::Error>),
}

impl QueueError {
    /// Stable machine-readable code for CLI/tool output.
    pub fn code(&self) -> &'static str {
        match self {
            QueueError::Validation { .. } => "MISSING_REQUIRED_FIELD",
            QueueError::TaskNotFound(_) => "TASK_NOT_FOUND",
            QueueError::AgentNotFound(_) => "AGENT_NOT_FOUND",
            QueueError::DependencyNotSatisfied { .. } => "DEPENDENCY_NOT_SATISFIED",
            QueueError::InvalidState { .. } => "INVALID_STATE",
            QueueError::Storage(_) | QueueError::Encoding(_) => "DATABASE_ERROR",
            QueueError::Migration(_) => "MIGRATION_ERROR",
        }
    }
}

impl From<refinery::Error> for QueueError {
    fn from(err: refinery::Error) -> Self {
        QueueError::Migration(Box::new(err))
    }
}

/// Result type for queue operations.
pub type QueueResult<T> = std::result::Result<T, QueueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_error_names_unmet_ids() {
        let err = QueueError::DependencyNotSatisfied {
            task_id: "task-1".into(),
            unmet: vec!["task-a".into(), "task-b".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("task-a"));
        assert!(msg.contains("task-b"));
        assert_eq!(err.code(), "DEPENDENCY_NOT_SATISFIED");
    }

    #[test]
    fn invalid_state_reports_both_states() {
        let err = QueueError::InvalidState {
            task_id: "task-1".into(),
            actual: TaskStatus::Completed,
            expected: TaskStatus::Claimed,
        };
        assert!(err.to_string().contains("completed"));
        assert!(err.to_string().contains("claimed"));
    }
}
