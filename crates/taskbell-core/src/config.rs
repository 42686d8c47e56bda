use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

// Reminder timing constants
pub const LEAD_WINDOW_MINUTES: i64 = 60; // reminder admissible this close to the due instant
pub const REMINDER_LEAD_MINUTES: i64 = 60; // trigger = due instant - lead
pub const MIN_REMINDER_DELAY_SECS: i64 = 60; // clamp for near-due tasks
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Top-level config (taskbell.toml + TASKBELL_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskbellConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Outbound mail. When absent reminders are only written to the log.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Cadence of the fallback sweep that scans the store for due-soon tasks.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Re-register timers for pending tasks when the daemon starts.
    #[serde(default = "bool_true")]
    pub restore_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            restore_on_start: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// STARTTLS on by default; port 465 always uses implicit TLS.
    #[serde(default = "bool_true")]
    pub tls: bool,
    /// Sender mailbox, e.g. `"Taskbell <reminders@example.com>"`.
    pub from: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

fn bool_true() -> bool {
    true
}
fn default_sweep_interval() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}
fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.taskbell/taskbell.db", home)
}

impl TaskbellConfig {
    /// Load config from a TOML file with TASKBELL_* env var overrides.
    ///
    /// Nested keys use a double underscore:
    /// `TASKBELL_SCHEDULER__SWEEP_INTERVAL_SECS=600`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Self::figment(&path)
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))
    }

    /// Provider chain used by [`load`](Self::load): defaults, then file, then env.
    pub fn figment(path: &str) -> Figment {
        Figment::from(Serialized::defaults(TaskbellConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("TASKBELL_").split("__"))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.taskbell/taskbell.toml", home)
}
