//! Race-safe lifecycle transitions: claim, complete, fail, retry.
//!
//! Claimants are independent processes, so no in-process lock can serialize
//! them. Every transition here is a single UPDATE guarded on the expected
//! current status; the affected-row count tells us whether the write applied
//! or another claimant got there first.

use super::handoff::append_handoff;
use super::tasks::{get_task_internal, parse_task_row};
use super::{now_ms, Database};
use crate::error::{QueueError, QueueResult};
use crate::types::{HandoffAction, ResultInput, Task, TaskStatus};
use rusqlite::{params, Connection, OptionalExtension};

/// Return the ids in `depends_on` that do not resolve to a completed task.
/// A dangling id counts as unmet: it can never reach completed.
fn unmet_dependencies(conn: &Connection, depends_on: &[String]) -> QueueResult<Vec<String>> {
    let mut unmet = Vec::new();
    let mut stmt = conn.prepare("SELECT status FROM tasks WHERE id = ?1")?;

    for dep_id in depends_on {
        let status: Option<String> = stmt
            .query_row(params![dep_id], |row| row.get(0))
            .optional()?;

        match status.as_deref() {
            Some("completed") => {}
            _ => unmet.push(dep_id.clone()),
        }
    }

    Ok(unmet)
}

impl Database {
    /// Attempt to claim a pending task for an agent.
    ///
    /// Returns `Ok(Some(task))` on success and `Ok(None)` when the task was
    /// no longer pending at the moment of the write, i.e. another claimant
    /// won the race. Losing the race is an expected outcome, not an error.
    ///
    /// Unmet dependencies are a caller error and fail synchronously with the
    /// unmet ids, before any write is attempted.
    pub fn claim_task(&self, task_id: &str, agent: &str) -> QueueResult<Option<Task>> {
        let now = now_ms();

        self.with_conn(|conn| {
            let task = get_task_internal(conn, task_id)?
                .ok_or_else(|| QueueError::TaskNotFound(task_id.to_string()))?;

            if !task.depends_on.is_empty() {
                let unmet = unmet_dependencies(conn, &task.depends_on)?;
                if !unmet.is_empty() {
                    return Err(QueueError::DependencyNotSatisfied {
                        task_id: task_id.to_string(),
                        unmet,
                    });
                }
            }

            // The conditional write is what adjudicates concurrent claimants:
            // it only applies if the row is still pending.
            let updated = conn.execute(
                "UPDATE tasks SET status = 'claimed', assigned_agent = ?1, claimed_at = ?2
                 WHERE id = ?3 AND status = 'pending'",
                params![agent, now, task_id],
            )?;

            if updated == 0 {
                tracing::debug!(task_id, agent, "claim lost race, task no longer pending");
                return Ok(None);
            }

            append_handoff(conn, task_id, HandoffAction::Claimed, Some(agent), now, None);
            tracing::debug!(task_id, agent, "task claimed");

            Ok(Some(Task {
                status: TaskStatus::Claimed,
                assigned_agent: Some(agent.to_string()),
                claimed_at: Some(now),
                ..task
            }))
        })
    }

    /// Complete a claimed task, attaching its result.
    ///
    /// Rejected with an invalid-state error when the task is not currently
    /// claimed -- including the late call from a claimant whose claim the
    /// sweeper already reclaimed.
    pub fn complete_task(&self, task_id: &str, result: ResultInput) -> QueueResult<Task> {
        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let updated = tx.execute(
                "UPDATE tasks SET status = 'completed', completed_at = ?1
                 WHERE id = ?2 AND status = 'claimed'",
                params![now, task_id],
            )?;

            if updated == 0 {
                return Err(not_claimed_error(&tx, task_id)?);
            }

            tx.execute(
                "INSERT OR IGNORE INTO results (task_id, output_path, summary, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![task_id, result.output_path, result.summary, now],
            )?;

            let mut stmt = tx.prepare("SELECT * FROM tasks WHERE id = ?1")?;
            let task = stmt.query_row(params![task_id], parse_task_row)?;
            drop(stmt);

            append_handoff(
                &tx,
                task_id,
                HandoffAction::Completed,
                task.assigned_agent.as_deref(),
                now,
                result.summary.as_deref(),
            );

            tx.commit()?;
            tracing::debug!(task_id, "task completed");
            Ok(task)
        })
    }

    /// Fail a claimed task with a reason.
    pub fn fail_task(&self, task_id: &str, reason: &str) -> QueueResult<Task> {
        let now = now_ms();

        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE tasks SET status = 'failed' WHERE id = ?1 AND status = 'claimed'",
                params![task_id],
            )?;

            if updated == 0 {
                return Err(not_claimed_error(conn, task_id)?);
            }

            let task = get_task_internal(conn, task_id)?
                .ok_or_else(|| QueueError::TaskNotFound(task_id.to_string()))?;

            append_handoff(
                conn,
                task_id,
                HandoffAction::Failed,
                task.assigned_agent.as_deref(),
                now,
                Some(reason),
            );
            tracing::debug!(task_id, reason, "task failed");
            Ok(task)
        })
    }

    /// Manually requeue a task regardless of its current status.
    ///
    /// Clears ownership, increments the retry counter, and returns the task
    /// to `pending`. This is the override that revives a failed task.
    pub fn retry_task(&self, task_id: &str) -> QueueResult<Task> {
        let now = now_ms();

        self.with_conn(|conn| {
            let previous = get_task_internal(conn, task_id)?
                .ok_or_else(|| QueueError::TaskNotFound(task_id.to_string()))?;

            conn.execute(
                "UPDATE tasks SET status = 'pending', assigned_agent = NULL,
                     claimed_at = NULL, completed_at = NULL, retry_count = retry_count + 1
                 WHERE id = ?1",
                params![task_id],
            )?;

            append_handoff(
                conn,
                task_id,
                HandoffAction::Retried,
                previous.assigned_agent.as_deref(),
                now,
                Some("manual retry"),
            );
            tracing::debug!(task_id, "task manually requeued");

            Ok(Task {
                status: TaskStatus::Pending,
                assigned_agent: None,
                claimed_at: None,
                completed_at: None,
                retry_count: previous.retry_count + 1,
                ..previous
            })
        })
    }
}

/// Build the error for a guarded transition that found the task not claimed:
/// not-found when the row is missing, invalid-state otherwise.
fn not_claimed_error(conn: &Connection, task_id: &str) -> QueueResult<QueueError> {
    let task = get_task_internal(conn, task_id)?;
    Ok(match task {
        None => QueueError::TaskNotFound(task_id.to_string()),
        Some(task) => QueueError::InvalidState {
            task_id: task_id.to_string(),
            actual: task.status,
            expected: TaskStatus::Claimed,
        },
    })
}
