//! Reconciliation of claims abandoned by crashed or unresponsive agents.

use super::handoff::append_handoff;
use super::tasks::parse_task_row;
use super::{now_ms, Database};
use crate::error::QueueResult;
use crate::types::{HandoffAction, SweepSummary, Task};
use rusqlite::params;

enum SweepOutcome {
    Retried,
    TimedOut,
    /// Already transitioned by someone else between scan and write.
    Skipped,
}

impl Database {
    /// Scan for claims that have outlived their timeout and requeue or fail
    /// them.
    ///
    /// Each overrun task is handled by its own guarded write, so the pass is
    /// safe against concurrent claim activity and idempotent: a task already
    /// swept (or completed) by the time we reach it is a no-op. A failure on
    /// one task is logged and never aborts the rest of the pass.
    pub fn sweep(&self) -> QueueResult<SweepSummary> {
        let now = now_ms();

        let overrun = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM tasks
                 WHERE status = 'claimed' AND claimed_at + timeout_seconds * 1000 < ?1",
            )?;
            let tasks = stmt
                .query_map(params![now], parse_task_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })?;

        let mut summary = SweepSummary::default();

        for task in overrun {
            match self.sweep_one(&task, now) {
                Ok(SweepOutcome::Retried) => summary.retried += 1,
                Ok(SweepOutcome::TimedOut) => summary.timed_out += 1,
                Ok(SweepOutcome::Skipped) => {}
                Err(err) => {
                    tracing::warn!(task_id = %task.id, error = %err, "sweep failed for task");
                }
            }
        }

        if summary.retried > 0 || summary.timed_out > 0 {
            tracing::info!(
                retried = summary.retried,
                timed_out = summary.timed_out,
                "sweep reclaimed overrun tasks"
            );
        }

        Ok(summary)
    }

    /// Apply the sweep decision for one overrun task.
    ///
    /// The guard carries the `claimed_at` observed at scan time, so the
    /// write only applies to the exact claim that was overrun. A task that
    /// was requeued and freshly claimed between scan and write has a
    /// different `claimed_at` and is left alone.
    fn sweep_one(&self, task: &Task, now: i64) -> QueueResult<SweepOutcome> {
        let details = format!(
            "claim by {} exceeded timeout of {}s",
            task.assigned_agent.as_deref().unwrap_or("unknown"),
            task.timeout_seconds
        );

        self.with_conn(|conn| {
            if task.retry_count < task.max_retries {
                let updated = conn.execute(
                    "UPDATE tasks SET status = 'pending', assigned_agent = NULL,
                         claimed_at = NULL, retry_count = retry_count + 1
                     WHERE id = ?1 AND status = 'claimed' AND claimed_at = ?2",
                    params![&task.id, task.claimed_at],
                )?;
                if updated == 0 {
                    return Ok(SweepOutcome::Skipped);
                }
                append_handoff(
                    conn,
                    &task.id,
                    HandoffAction::Retried,
                    task.assigned_agent.as_deref(),
                    now,
                    Some(&details),
                );
                Ok(SweepOutcome::Retried)
            } else {
                let updated = conn.execute(
                    "UPDATE tasks SET status = 'failed'
                     WHERE id = ?1 AND status = 'claimed' AND claimed_at = ?2",
                    params![&task.id, task.claimed_at],
                )?;
                if updated == 0 {
                    return Ok(SweepOutcome::Skipped);
                }
                append_handoff(
                    conn,
                    &task.id,
                    HandoffAction::Failed,
                    task.assigned_agent.as_deref(),
                    now,
                    Some(&details),
                );
                Ok(SweepOutcome::TimedOut)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueDefaults;
    use crate::types::{NewTask, TaskStatus};

    fn defaults() -> QueueDefaults {
        QueueDefaults {
            timeout_seconds: 900,
            max_retries: 3,
        }
    }

    #[test]
    fn stale_sweep_decision_leaves_reclaimed_task_alone() {
        let db = Database::open_in_memory().unwrap();
        let task = db
            .create_task(
                NewTask {
                    title: "reclaimed".to_string(),
                    timeout_seconds: Some(0),
                    max_retries: Some(5),
                    ..Default::default()
                },
                &defaults(),
            )
            .unwrap();

        db.claim_task(&task.id, "agent-a").unwrap().unwrap();
        let stale = db.get_task(&task.id).unwrap().unwrap();

        // Between scan and write: the old claim is requeued and a second
        // agent claims the task with a fresh timestamp.
        db.retry_task(&task.id).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        db.claim_task(&task.id, "agent-b").unwrap().unwrap();

        let outcome = db.sweep_one(&stale, now_ms()).unwrap();

        assert!(matches!(outcome, SweepOutcome::Skipped));
        let current = db.get_task(&task.id).unwrap().unwrap();
        assert_eq!(current.status, TaskStatus::Claimed);
        assert_eq!(current.assigned_agent.as_deref(), Some("agent-b"));
        assert_eq!(current.retry_count, 1);
    }

    #[test]
    fn stale_exhausted_decision_does_not_fail_fresh_claim() {
        let db = Database::open_in_memory().unwrap();
        let task = db
            .create_task(
                NewTask {
                    title: "no retries left".to_string(),
                    timeout_seconds: Some(0),
                    max_retries: Some(0),
                    ..Default::default()
                },
                &defaults(),
            )
            .unwrap();

        db.claim_task(&task.id, "agent-a").unwrap().unwrap();
        let stale = db.get_task(&task.id).unwrap().unwrap();

        db.retry_task(&task.id).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        db.claim_task(&task.id, "agent-b").unwrap().unwrap();

        let outcome = db.sweep_one(&stale, now_ms()).unwrap();

        assert!(matches!(outcome, SweepOutcome::Skipped));
        let current = db.get_task(&task.id).unwrap().unwrap();
        assert_eq!(current.status, TaskStatus::Claimed);
        assert_eq!(current.assigned_agent.as_deref(), Some("agent-b"));
    }
}
