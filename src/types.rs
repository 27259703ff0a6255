//! Core types for the task-relay work queue.

use serde::{Deserialize, Serialize};

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Claimed,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Claimed => "claimed",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "claimed" => Some(TaskStatus::Claimed),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advisory task priority. Does not affect claim ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }

    /// Parse a priority string. Unrecognized values map to Normal.
    pub fn parse(s: &str) -> Priority {
        match s.to_lowercase().as_str() {
            "low" => Priority::Low,
            "high" => Priority::High,
            _ => Priority::Normal,
        }
    }
}

/// A unit of work in the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub status: TaskStatus,
    pub assigned_agent: Option<String>,
    pub created_by: Option<String>,
    /// Ids of tasks that must be completed before this one may be claimed.
    pub depends_on: Vec<String>,
    /// How long a claim may remain outstanding before the sweeper treats it
    /// as stuck.
    pub timeout_seconds: i64,
    pub max_retries: i64,
    pub retry_count: i64,
    pub claimed_at: Option<i64>,
    pub created_at: i64,
    pub completed_at: Option<i64>,
}

/// Input for creating a task. Fields left as None take configured defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub created_by: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub timeout_seconds: Option<i64>,
    pub max_retries: Option<i64>,
}

/// Output attached to a completed task. Written once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub output_path: Option<String>,
    pub summary: Option<String>,
    pub created_at: i64,
}

/// Result fields supplied on completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultInput {
    pub output_path: Option<String>,
    pub summary: Option<String>,
}

/// A registered worker agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub name: String,
    pub capabilities: Vec<String>,
    pub max_concurrent: i64,
    pub registered_at: i64,
}

/// An agent together with its currently claimed tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    pub agent: Agent,
    pub active_tasks: Vec<Task>,
    pub current_load: i64,
}

/// Lifecycle transition recorded in the handoff log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffAction {
    Claimed,
    Completed,
    Failed,
    Retried,
}

impl HandoffAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandoffAction::Claimed => "claimed",
            HandoffAction::Completed => "completed",
            HandoffAction::Failed => "failed",
            HandoffAction::Retried => "retried",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "claimed" => Some(HandoffAction::Claimed),
            "completed" => Some(HandoffAction::Completed),
            "failed" => Some(HandoffAction::Failed),
            "retried" => Some(HandoffAction::Retried),
            _ => None,
        }
    }
}

/// An append-only handoff log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffEntry {
    pub id: i64,
    pub task_id: String,
    pub action: HandoffAction,
    pub agent: Option<String>,
    pub timestamp: i64,
    pub details: Option<String>,
}

/// Tally of a sweep pass over overrun claims.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSummary {
    /// Claims requeued to pending with retries remaining.
    pub retried: i64,
    /// Claims failed after exhausting retries.
    pub timed_out: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip() {
        for s in [
            TaskStatus::Pending,
            TaskStatus::Claimed,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ] {
            assert_eq!(TaskStatus::from_str(s.as_str()), Some(s));
        }
        assert_eq!(TaskStatus::from_str("bogus"), None);
    }

    #[test]
    fn priority_parse_defaults_to_normal() {
        assert_eq!(Priority::parse("high"), Priority::High);
        assert_eq!(Priority::parse("LOW"), Priority::Low);
        assert_eq!(Priority::parse("whatever"), Priority::Normal);
    }
}
