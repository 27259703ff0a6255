//! task-relay CLI: a thin command surface over the queue core.
//!
//! Output is JSON so other agents and scripts can consume it directly.

use anyhow::Result;
use clap::{Parser, Subcommand};
use task_relay::config::Config;
use task_relay::db::Database;
use task_relay::types::{NewTask, Priority, ResultInput, TaskStatus};
use tracing_subscriber::EnvFilter;

/// Persistent work queue for independent worker agents
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new task
    Create {
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// low, normal, or high (advisory only)
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        created_by: Option<String>,
        /// Task ids that must complete before this task may be claimed
        #[arg(long = "depends-on")]
        depends_on: Vec<String>,
        /// Claim timeout in seconds
        #[arg(long)]
        timeout: Option<i64>,
        #[arg(long)]
        max_retries: Option<i64>,
    },
    /// Show a task by id
    Show { task_id: String },
    /// List tasks, optionally filtered by status
    List {
        #[arg(long)]
        status: Option<String>,
    },
    /// Claim a pending task for an agent
    Claim { task_id: String, agent: String },
    /// Complete a claimed task
    Complete {
        task_id: String,
        #[arg(long)]
        output_path: Option<String>,
        #[arg(long)]
        summary: Option<String>,
    },
    /// Fail a claimed task with a reason
    Fail { task_id: String, reason: String },
    /// Requeue a task regardless of its current status
    Retry { task_id: String },
    /// Reclaim claims that have outlived their timeout
    Sweep,
    /// Register a worker agent (upsert by name)
    RegisterAgent {
        name: String,
        #[arg(long = "capability")]
        capabilities: Vec<String>,
        #[arg(long, default_value_t = 1)]
        max_concurrent: i64,
    },
    /// List registered agents
    Agents,
    /// Show an agent's claimed tasks and load
    AgentStatus { name: String },
    /// Show the handoff log for a task
    History { task_id: String },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load_or_default();
    if let Some(db_path) = cli.database {
        config.queue.db_path = db_path.into();
    }
    config.ensure_db_dir()?;
    let db = Database::open(&config.queue.db_path)?;

    match cli.command {
        Command::Create {
            title,
            description,
            priority,
            created_by,
            depends_on,
            timeout,
            max_retries,
        } => {
            let task = db.create_task(
                NewTask {
                    title,
                    description,
                    priority: priority.as_deref().map(Priority::parse),
                    created_by,
                    depends_on,
                    timeout_seconds: timeout,
                    max_retries,
                },
                &config.defaults(),
            )?;
            print_json(&task)?;
        }
        Command::Show { task_id } => {
            let task = db.require_task(&task_id)?;
            print_json(&task)?;
        }
        Command::List { status } => {
            let status = match status.as_deref() {
                Some(s) => Some(
                    TaskStatus::from_str(s)
                        .ok_or_else(|| anyhow::anyhow!("unknown status: {s}"))?,
                ),
                None => None,
            };
            print_json(&db.list_tasks(status)?)?;
        }
        Command::Claim { task_id, agent } => match db.claim_task(&task_id, &agent)? {
            Some(task) => print_json(&task)?,
            None => {
                // Lost race: not an error, but nothing was claimed.
                println!("null");
            }
        },
        Command::Complete {
            task_id,
            output_path,
            summary,
        } => {
            let task = db.complete_task(
                &task_id,
                ResultInput {
                    output_path,
                    summary,
                },
            )?;
            print_json(&task)?;
        }
        Command::Fail { task_id, reason } => {
            let task = db.fail_task(&task_id, &reason)?;
            print_json(&task)?;
        }
        Command::Retry { task_id } => {
            let task = db.retry_task(&task_id)?;
            print_json(&task)?;
        }
        Command::Sweep => {
            let summary = db.sweep()?;
            print_json(&summary)?;
        }
        Command::RegisterAgent {
            name,
            capabilities,
            max_concurrent,
        } => {
            let agent = db.register_agent(&name, capabilities, max_concurrent)?;
            print_json(&agent)?;
        }
        Command::Agents => {
            print_json(&db.list_agents()?)?;
        }
        Command::AgentStatus { name } => {
            print_json(&db.agent_status(&name)?)?;
        }
        Command::History { task_id } => {
            print_json(&db.query_handoff(&task_id)?)?;
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
