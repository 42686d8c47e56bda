use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use taskbell_core::{config::TaskbellConfig, TaskId, TaskStore};
use taskbell_scheduler::JobContext;
use tracing::{error, info, warn};

mod bootstrap;
mod cli;

use bootstrap::Engine;
use cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskbell=info,taskbell_scheduler=info".into()),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config / TASKBELL_CONFIG > ~/.taskbell/taskbell.toml
    let config = TaskbellConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        TaskbellConfig::default()
    });

    let engine = Engine::open(&config)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(engine, &config).await,
        Command::Sweep { job_data } => {
            let ctx = job_context(job_data.as_deref())?;
            let report = engine.service.job().run(ctx).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Overdue => {
            let overdue = engine.service.overdue_tasks()?;
            println!("{}", serde_json::to_string_pretty(&overdue)?);
            Ok(())
        }
        Command::Inspect { task_id } => inspect(&engine, TaskId(task_id)),
    }
}

/// Long-running mode: restore timers, sweep periodically, exit on Ctrl-C.
async fn run(engine: Engine, config: &TaskbellConfig) -> anyhow::Result<()> {
    let service = engine.service;

    if config.scheduler.restore_on_start {
        match service.restore_from_store() {
            Ok(n) => info!(restored = n, "pending reminders restored"),
            Err(e) => error!(error = %e, "failed to restore reminders"),
        }
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let period = Duration::from_secs(config.scheduler.sweep_interval_secs.max(1));
    let sweeper = service.clone();
    let sweep = tokio::spawn(async move { sweeper.run_sweep_loop(period, shutdown_rx).await });

    info!(scheduled = service.scheduled_count(), "taskbell running, Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    info!("shutdown requested");
    let _ = shutdown_tx.send(true);
    sweep.await?;
    Ok(())
}

/// Parse `--job-data`. No data means sweep mode.
fn job_context(raw: Option<&str>) -> anyhow::Result<JobContext> {
    let Some(raw) = raw else {
        return Ok(JobContext::sweep());
    };
    let data: serde_json::Value =
        serde_json::from_str(raw).with_context(|| format!("invalid --job-data: {raw}"))?;
    Ok(JobContext::from_job_data(&data))
}

fn inspect(engine: &Engine, id: TaskId) -> anyhow::Result<()> {
    let task = engine
        .store
        .find_task_by_id(id)?
        .with_context(|| format!("task {id} not found"))?;
    let assessment = engine.service.rules().evaluate(&task);

    let out = serde_json::json!({
        "task": task,
        "assessment": assessment,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
