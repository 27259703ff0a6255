//! Agent registry and load bookkeeping.
//!
//! The registry is not part of the claim state machine: capacity is
//! advisory. `current_load` is always derived from the tasks table, never
//! stored.

use super::tasks::parse_task_row;
use super::{now_ms, Database};
use crate::error::{QueueError, QueueResult};
use crate::types::{Agent, AgentStatus};
use rusqlite::{params, Connection, OptionalExtension, Row};

fn parse_agent_row(row: &Row) -> rusqlite::Result<Agent> {
    let capabilities_json: String = row.get("capabilities")?;
    Ok(Agent {
        name: row.get("name")?,
        capabilities: serde_json::from_str(&capabilities_json).unwrap_or_default(),
        max_concurrent: row.get("max_concurrent")?,
        registered_at: row.get("registered_at")?,
    })
}

fn get_agent_internal(conn: &Connection, name: &str) -> QueueResult<Option<Agent>> {
    let mut stmt = conn.prepare(
        "SELECT name, capabilities, max_concurrent, registered_at FROM agents WHERE name = ?1",
    )?;
    let agent = stmt.query_row(params![name], parse_agent_row).optional()?;
    Ok(agent)
}

impl Database {
    /// Register a worker agent, or update its declaration if the name is
    /// already taken.
    pub fn register_agent(
        &self,
        name: &str,
        capabilities: Vec<String>,
        max_concurrent: i64,
    ) -> QueueResult<Agent> {
        if name.trim().is_empty() {
            return Err(QueueError::Validation { field: "name" });
        }

        let now = now_ms();
        let capabilities_json = serde_json::to_string(&capabilities)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO agents (name, capabilities, max_concurrent, registered_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(name) DO UPDATE SET
                     capabilities = excluded.capabilities,
                     max_concurrent = excluded.max_concurrent",
                params![name, capabilities_json, max_concurrent, now],
            )?;

            get_agent_internal(conn, name)?
                .ok_or_else(|| QueueError::AgentNotFound(name.to_string()))
        })
    }

    /// Get an agent by name.
    pub fn get_agent(&self, name: &str) -> QueueResult<Option<Agent>> {
        self.with_conn(|conn| get_agent_internal(conn, name))
    }

    /// List all registered agents in registration order.
    pub fn list_agents(&self) -> QueueResult<Vec<Agent>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name, capabilities, max_concurrent, registered_at
                 FROM agents ORDER BY registered_at, name",
            )?;
            let agents = stmt
                .query_map([], parse_agent_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(agents)
        })
    }

    /// Get an agent's currently claimed tasks and derived load.
    pub fn agent_status(&self, name: &str) -> QueueResult<AgentStatus> {
        self.with_conn(|conn| {
            let agent = get_agent_internal(conn, name)?
                .ok_or_else(|| QueueError::AgentNotFound(name.to_string()))?;

            let mut stmt = conn.prepare(
                "SELECT * FROM tasks
                 WHERE assigned_agent = ?1 AND status = 'claimed'
                 ORDER BY claimed_at, id",
            )?;
            let active_tasks: Vec<_> = stmt
                .query_map(params![name], parse_task_row)?
                .collect::<Result<Vec<_>, _>>()?;

            let current_load = active_tasks.len() as i64;
            Ok(AgentStatus {
                agent,
                active_tasks,
                current_load,
            })
        })
    }
}
