//! Task and result CRUD.

use super::{now_ms, Database};
use crate::config::QueueDefaults;
use crate::error::{QueueError, QueueResult};
use crate::types::{NewTask, Priority, ResultInput, Task, TaskResult, TaskStatus};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

pub(crate) fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let depends_on_json: String = row.get("depends_on")?;
    let priority: String = row.get("priority")?;
    let status: String = row.get("status")?;

    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        priority: Priority::parse(&priority),
        status: TaskStatus::from_str(&status).unwrap_or(TaskStatus::Pending),
        assigned_agent: row.get("assigned_agent")?,
        created_by: row.get("created_by")?,
        depends_on: serde_json::from_str(&depends_on_json).unwrap_or_default(),
        timeout_seconds: row.get("timeout_seconds")?,
        max_retries: row.get("max_retries")?,
        retry_count: row.get("retry_count")?,
        claimed_at: row.get("claimed_at")?,
        created_at: row.get("created_at")?,
        completed_at: row.get("completed_at")?,
    })
}

/// Get a task using an existing connection (avoids re-locking).
pub(crate) fn get_task_internal(conn: &Connection, task_id: &str) -> QueueResult<Option<Task>> {
    let mut stmt = conn.prepare("SELECT * FROM tasks WHERE id = ?1")?;
    let task = stmt
        .query_row(params![task_id], parse_task_row)
        .optional()?;
    Ok(task)
}

impl Database {
    /// Create a new task in `pending` state.
    ///
    /// Timeout, retry bound, and priority fall back to the configured
    /// defaults when the caller leaves them unset.
    pub fn create_task(&self, input: NewTask, defaults: &QueueDefaults) -> QueueResult<Task> {
        if input.title.trim().is_empty() {
            return Err(QueueError::Validation { field: "title" });
        }

        let task = Task {
            id: format!("task-{}", Uuid::now_v7()),
            title: input.title,
            description: input.description,
            priority: input.priority.unwrap_or_default(),
            status: TaskStatus::Pending,
            assigned_agent: None,
            created_by: input.created_by,
            depends_on: input.depends_on,
            timeout_seconds: input.timeout_seconds.unwrap_or(defaults.timeout_seconds),
            max_retries: input.max_retries.unwrap_or(defaults.max_retries),
            retry_count: 0,
            claimed_at: None,
            created_at: now_ms(),
            completed_at: None,
        };
        let depends_on_json = serde_json::to_string(&task.depends_on)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (
                    id, title, description, priority, status, created_by,
                    depends_on, timeout_seconds, max_retries, retry_count, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    &task.id,
                    &task.title,
                    &task.description,
                    task.priority.as_str(),
                    task.status.as_str(),
                    &task.created_by,
                    depends_on_json,
                    task.timeout_seconds,
                    task.max_retries,
                    task.retry_count,
                    task.created_at,
                ],
            )?;
            Ok(())
        })?;

        tracing::debug!(task_id = %task.id, "created task");
        Ok(task)
    }

    /// Get a task by id.
    pub fn get_task(&self, task_id: &str) -> QueueResult<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, task_id))
    }

    /// Get a task by id, erroring when absent.
    pub fn require_task(&self, task_id: &str) -> QueueResult<Task> {
        self.get_task(task_id)?
            .ok_or_else(|| QueueError::TaskNotFound(task_id.to_string()))
    }

    /// List tasks, optionally filtered by status, in insertion order.
    pub fn list_tasks(&self, status: Option<TaskStatus>) -> QueueResult<Vec<Task>> {
        self.with_conn(|conn| {
            let tasks = match status {
                Some(status) => {
                    let mut stmt = conn.prepare(
                        "SELECT * FROM tasks WHERE status = ?1 ORDER BY created_at, id",
                    )?;
                    let rows = stmt.query_map(params![status.as_str()], parse_task_row)?;
                    rows.collect::<Result<Vec<_>, _>>()?
                }
                None => {
                    let mut stmt = conn.prepare("SELECT * FROM tasks ORDER BY created_at, id")?;
                    let rows = stmt.query_map([], parse_task_row)?;
                    rows.collect::<Result<Vec<_>, _>>()?
                }
            };
            Ok(tasks)
        })
    }

    /// Attach a result to a completed task. Idempotent: a second save for the
    /// same task is a no-op.
    pub fn save_result(&self, task_id: &str, result: ResultInput) -> QueueResult<TaskResult> {
        let now = now_ms();

        self.with_conn(|conn| {
            let task = get_task_internal(conn, task_id)?
                .ok_or_else(|| QueueError::TaskNotFound(task_id.to_string()))?;

            if task.status != TaskStatus::Completed {
                return Err(QueueError::InvalidState {
                    task_id: task_id.to_string(),
                    actual: task.status,
                    expected: TaskStatus::Completed,
                });
            }

            conn.execute(
                "INSERT OR IGNORE INTO results (task_id, output_path, summary, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![task_id, result.output_path, result.summary, now],
            )?;

            get_result_internal(conn, task_id)?
                .ok_or_else(|| QueueError::TaskNotFound(task_id.to_string()))
        })
    }

    /// Get the result attached to a task, if any.
    pub fn get_result(&self, task_id: &str) -> QueueResult<Option<TaskResult>> {
        self.with_conn(|conn| get_result_internal(conn, task_id))
    }
}

pub(crate) fn get_result_internal(
    conn: &Connection,
    task_id: &str,
) -> QueueResult<Option<TaskResult>> {
    let mut stmt = conn.prepare(
        "SELECT task_id, output_path, summary, created_at FROM results WHERE task_id = ?1",
    )?;
    let result = stmt
        .query_row(params![task_id], |row| {
            Ok(TaskResult {
                task_id: row.get(0)?,
                output_path: row.get(1)?,
                summary: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;
    Ok(result)
}
