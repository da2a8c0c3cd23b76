//! # Briefcast — personal briefing agent
//!
//! Describe a recurring briefing in plain language; Briefcast translates it
//! into a schedulable plan, fires it on a timezone-correct cadence, and
//! delivers the result.
//!
//! Usage:
//!   briefcast translate "every weekday at 8am Pacific, email me my calendar"
//!   briefcast approve <id>
//!   briefcast run                      # scheduler daemon + admin gateway
//!   briefcast execute <id>             # run once, right now

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use briefcast_core::config::BriefcastConfig;
use briefcast_core::traits::TaskRepository;
use briefcast_core::types::TaskStatus;
use briefcast_executor::{ConnectorSet, Executor};
use briefcast_gateway::AppState;
use briefcast_scheduler::Scheduler;
use briefcast_store::SqliteTaskStore;
use briefcast_translator::PlanTranslator;

#[derive(Parser)]
#[command(
    name = "briefcast",
    version,
    about = "📰 Briefcast — personal briefings, gathered and delivered on schedule"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Start the scheduler daemon and admin gateway
    Run {
        /// Gateway host override
        #[arg(long)]
        host: Option<String>,
        /// Gateway port override
        #[arg(long)]
        port: Option<u16>,
    },
    /// Translate a plain-language request into a plan (pending approval)
    Translate {
        /// The request, e.g. "every morning at 7am, email me trending AI news"
        request: String,
        /// Owner identity recorded on the task
        #[arg(long, default_value = "local-user")]
        owner: String,
    },
    /// List all tasks
    List,
    /// Approve a pending plan so it can be scheduled
    Approve { id: String },
    /// Enable a task
    Enable { id: String },
    /// Disable a task (future fires stop; in-flight runs finish)
    Disable { id: String },
    /// Execute a task once, right now
    Execute { id: String },
    /// Show a task's recent run history
    History {
        id: String,
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Delete a task and its history
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "briefcast=debug,tower_http=debug"
    } else {
        "briefcast=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = BriefcastConfig::load()?;
    let repo: Arc<dyn TaskRepository> =
        Arc::new(SqliteTaskStore::open(&config.store.resolved_path())?);

    match cli.command {
        Command::Run { host, port } => run(config, repo, host, port).await?,
        Command::Translate { request, owner } => translate(&config, repo, &request, &owner).await?,
        Command::List => list(repo)?,
        Command::Approve { id } => approve(repo, &id)?,
        Command::Enable { id } => {
            repo.set_enabled(&id, true)?;
            println!("✅ Task {id} enabled");
        }
        Command::Disable { id } => {
            repo.set_enabled(&id, false)?;
            repo.set_next_run(&id, None)?;
            println!("💤 Task {id} disabled");
        }
        Command::Execute { id } => execute(&config, repo, &id).await?,
        Command::History { id, limit } => history(repo, &id, limit)?,
        Command::Delete { id } => {
            repo.delete(&id)?;
            println!("🗑️ Task {id} and its history deleted");
        }
    }
    Ok(())
}

fn build_scheduler(config: &BriefcastConfig, repo: Arc<dyn TaskRepository>) -> Result<Arc<Scheduler>> {
    let provider = briefcast_providers::create_provider(config)?;
    let connectors = briefcast_connectors::default_set(config, provider);
    let executor = Arc::new(Executor::new(
        ConnectorSet::new(connectors),
        std::time::Duration::from_secs(config.executor.step_timeout_secs),
    ));
    Ok(Scheduler::new(repo, executor))
}

async fn run(
    config: BriefcastConfig,
    repo: Arc<dyn TaskRepository>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let scheduler = build_scheduler(&config, repo.clone())?;
    let registered = scheduler.bootstrap().await?;
    println!("⏰ Scheduler running with {registered} task(s)");

    let host = host.unwrap_or_else(|| config.gateway.host.clone());
    let port = port.unwrap_or(config.gateway.port);
    briefcast_gateway::serve(AppState { scheduler, repo }, &host, port).await?;
    Ok(())
}

async fn translate(
    config: &BriefcastConfig,
    repo: Arc<dyn TaskRepository>,
    request: &str,
    owner: &str,
) -> Result<()> {
    let provider = briefcast_providers::create_provider(config)?;
    let translator = PlanTranslator::new(provider);

    let task = translator.translate(request, owner).await?;
    repo.insert(&task)?;

    println!("🧭 Plan created: {}", task.name);
    println!("   id:       {}", task.id);
    println!("   schedule: {} ({})", task.cron, task.timezone);
    for (i, step) in task.steps.iter().enumerate() {
        let binding = step
            .output_binding
            .as_deref()
            .map(|b| format!(" → {b}"))
            .unwrap_or_default();
        println!("   step {}:   {}{}", i + 1, step.label(), binding);
    }
    println!("\nApprove it with: briefcast approve {}", task.id);
    Ok(())
}

fn list(repo: Arc<dyn TaskRepository>) -> Result<()> {
    let tasks = repo.list()?;
    if tasks.is_empty() {
        println!("No tasks yet. Create one with: briefcast translate \"...\"");
        return Ok(());
    }
    for task in tasks {
        let state = if task.enabled { "on" } else { "off" };
        let next = task
            .next_run
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "-".into());
        println!(
            "{}  [{}/{}]  {} ({})  next: {}  — {}",
            task.id,
            task.status.as_str(),
            state,
            task.cron,
            task.timezone,
            next,
            task.name
        );
    }
    Ok(())
}

fn approve(repo: Arc<dyn TaskRepository>, id: &str) -> Result<()> {
    let task = repo.load(id)?;
    if task.status != TaskStatus::PendingApproval {
        anyhow::bail!(
            "task is '{}', only pending_approval tasks can be approved",
            task.status.as_str()
        );
    }
    repo.update_status(id, TaskStatus::Approved)?;
    println!("✅ Task {id} approved — the daemon will schedule it");
    Ok(())
}

async fn execute(config: &BriefcastConfig, repo: Arc<dyn TaskRepository>, id: &str) -> Result<()> {
    let scheduler = build_scheduler(config, repo)?;
    let record = scheduler.execute_task(id).await?;

    println!(
        "🏁 Run {}: {} in {}ms",
        record.id,
        record.status.as_str(),
        record.duration_ms.unwrap_or(0)
    );
    for step in &record.steps {
        match &step.error {
            Some(err) => println!("   ✗ {} — {}", step.step, err),
            None => println!("   ✓ {}", step.step),
        }
    }
    if let Some(error) = &record.error {
        println!("   error: {error}");
    }
    Ok(())
}

fn history(repo: Arc<dyn TaskRepository>, id: &str, limit: usize) -> Result<()> {
    let records = repo.list_executions(id, limit)?;
    if records.is_empty() {
        println!("No runs recorded for {id}");
        return Ok(());
    }
    for record in records {
        println!(
            "{}  {}  {}  {}ms  {} step(s){}",
            record.started_at.to_rfc3339(),
            record.id,
            record.status.as_str(),
            record.duration_ms.unwrap_or(0),
            record.steps.len(),
            record
                .error
                .as_deref()
                .map(|e| format!("  — {e}"))
                .unwrap_or_default()
        );
    }
    Ok(())
}
