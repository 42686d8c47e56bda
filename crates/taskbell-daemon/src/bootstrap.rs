//! Wiring: database, notifier, rules and scheduler from one config.

use std::sync::Arc;

use rusqlite::Connection;
use taskbell_core::config::TaskbellConfig;
use taskbell_notify::{LogNotifier, Notifier, SmtpNotifier};
use taskbell_rules::RuleEngine;
use taskbell_scheduler::{ActionExecutor, SchedulerService, TaskExecutionJob};
use taskbell_store::SqliteStore;
use tracing::{info, warn};

pub struct Engine {
    pub store: Arc<SqliteStore>,
    pub service: SchedulerService,
}

impl Engine {
    pub fn open(config: &TaskbellConfig) -> anyhow::Result<Self> {
        let db_path = &config.database.path;
        ensure_parent_dir(db_path);
        info!(path = %db_path, "opening SQLite database");

        let db = Connection::open(db_path)?;
        db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        taskbell_store::db::init_db(&db)?;
        info!("database migrations complete");

        let store = Arc::new(SqliteStore::new(db));
        let notifier = build_notifier(config);
        let executor = ActionExecutor::new(store.clone(), notifier);
        let job = TaskExecutionJob::new(store.clone(), RuleEngine::default(), executor);
        let service = SchedulerService::new(store.clone(), job);

        Ok(Self { store, service })
    }
}

/// SMTP when configured and valid, otherwise reminders go to the log.
fn build_notifier(config: &TaskbellConfig) -> Arc<dyn Notifier> {
    let Some(ref smtp) = config.smtp else {
        info!("no SMTP relay configured, reminders will be logged");
        return Arc::new(LogNotifier);
    };
    match SmtpNotifier::from_config(smtp) {
        Ok(notifier) => {
            info!(host = %smtp.host, port = smtp.port, "SMTP notifier ready");
            Arc::new(notifier)
        }
        Err(e) => {
            warn!(error = %e, "SMTP config rejected, falling back to log notifier");
            Arc::new(LogNotifier)
        }
    }
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
