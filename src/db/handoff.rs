//! Append-only handoff audit log.
//!
//! Entries are written from inside claim/complete/fail/retry/sweep on the
//! same connection. An append failure is logged and swallowed: losing an
//! audit row must not fail the lifecycle operation that produced it.

use super::Database;
use crate::error::QueueResult;
use crate::types::{HandoffAction, HandoffEntry};
use rusqlite::{params, Connection};

/// Append a handoff entry. Never propagates an error to the caller.
pub(crate) fn append_handoff(
    conn: &Connection,
    task_id: &str,
    action: HandoffAction,
    agent: Option<&str>,
    timestamp: i64,
    details: Option<&str>,
) {
    let outcome = conn.execute(
        "INSERT INTO handoff_log (task_id, action, agent, timestamp, details)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![task_id, action.as_str(), agent, timestamp, details],
    );

    if let Err(err) = outcome {
        tracing::warn!(
            task_id,
            action = action.as_str(),
            error = %err,
            "failed to append handoff log entry"
        );
    }
}

impl Database {
    /// Get the handoff history for a task, in append order.
    pub fn query_handoff(&self, task_id: &str) -> QueueResult<Vec<HandoffEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, task_id, action, agent, timestamp, details
                 FROM handoff_log WHERE task_id = ?1 ORDER BY id",
            )?;

            let entries = stmt
                .query_map(params![task_id], |row| {
                    let action: String = row.get(2)?;
                    Ok(HandoffEntry {
                        id: row.get(0)?,
                        task_id: row.get(1)?,
                        action: HandoffAction::from_str(&action).ok_or_else(|| {
                            rusqlite::Error::FromSqlConversionFailure(
                                2,
                                rusqlite::types::Type::Text,
                                format!("unknown handoff action: {action}").into(),
                            )
                        })?,
                        agent: row.get(3)?,
                        timestamp: row.get(4)?,
                        details: row.get(5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(entries)
        })
    }
}
