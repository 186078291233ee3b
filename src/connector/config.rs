/*!
 * Connector Configuration
 * Serde-backed settings with environment overrides
 */

use crate::core::errors::{VolError, VolResult};
use crate::core::limits::{
    DEFAULT_SLOW_TASK_THRESHOLD, DEFAULT_WAIT_TIMEOUT, DEFAULT_WORKER_THREADS, MAX_WORKER_THREADS,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const WORKERS_ENV: &str = "VOL_ASYNC_WORKERS";
pub const SCHEDULER_ENV: &str = "VOL_ASYNC_SCHEDULER";
pub const GATE_TIMEOUT_ENV: &str = "VOL_ASYNC_GATE_TIMEOUT_MS";
pub const WAIT_TIMEOUT_ENV: &str = "VOL_ASYNC_WAIT_TIMEOUT_MS";
pub const SLOW_TASK_ENV: &str = "VOL_ASYNC_SLOW_TASK_MS";

/// Which scheduler runs the handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerKind {
    #[default]
    ThreadPool,
    Tokio,
    Inline,
}

impl FromStr for SchedulerKind {
    type Err = VolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "thread_pool" | "threadpool" | "pool" => Ok(SchedulerKind::ThreadPool),
            "tokio" => Ok(SchedulerKind::Tokio),
            "inline" => Ok(SchedulerKind::Inline),
            other => Err(VolError::Config(format!("unknown scheduler '{}'", other))),
        }
    }
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchedulerKind::ThreadPool => "thread_pool",
            SchedulerKind::Tokio => "tokio",
            SchedulerKind::Inline => "inline",
        };
        f.write_str(name)
    }
}

/// Connector settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Worker threads for the thread-pool scheduler
    pub workers: usize,
    pub scheduler: SchedulerKind,
    /// Bound on waiting for the gate; unbounded when absent
    pub gate_timeout_ms: Option<u64>,
    /// Bound used by `Connector::wait`
    pub wait_timeout_ms: u64,
    /// Handlers slower than this log a warning
    pub slow_task_ms: u64,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKER_THREADS,
            scheduler: SchedulerKind::default(),
            gate_timeout_ms: None,
            wait_timeout_ms: DEFAULT_WAIT_TIMEOUT.as_millis() as u64,
            slow_task_ms: DEFAULT_SLOW_TASK_THRESHOLD.as_millis() as u64,
        }
    }
}

impl ConnectorConfig {
    /// Defaults overridden by `VOL_ASYNC_*` environment variables
    pub fn from_env() -> VolResult<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json(json: &str) -> VolResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| VolError::Config(format!("invalid JSON config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, then validate
    pub fn with_overrides<F>(mut self, lookup: F) -> VolResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(WORKERS_ENV) {
            self.workers = parse_number(WORKERS_ENV, &v)? as usize;
        }
        if let Some(v) = lookup(SCHEDULER_ENV) {
            self.scheduler = v.parse()?;
        }
        if let Some(v) = lookup(GATE_TIMEOUT_ENV) {
            // 0 turns the bound off
            self.gate_timeout_ms = Some(parse_number(GATE_TIMEOUT_ENV, &v)?).filter(|ms| *ms > 0);
        }
        if let Some(v) = lookup(WAIT_TIMEOUT_ENV) {
            self.wait_timeout_ms = parse_number(WAIT_TIMEOUT_ENV, &v)?;
        }
        if let Some(v) = lookup(SLOW_TASK_ENV) {
            self.slow_task_ms = parse_number(SLOW_TASK_ENV, &v)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> VolResult<()> {
        if self.workers == 0 || self.workers > MAX_WORKER_THREADS {
            return Err(VolError::Config(format!(
                "workers must be within 1..={}, got {}",
                MAX_WORKER_THREADS, self.workers
            )));
        }
        if self.wait_timeout_ms == 0 {
            return Err(VolError::Config("wait_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn gate_timeout(&self) -> Option<Duration> {
        self.gate_timeout_ms.map(Duration::from_millis)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn slow_task(&self) -> Duration {
        Duration::from_millis(self.slow_task_ms)
    }
}

fn parse_number(key: &str, value: &str) -> VolResult<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| VolError::Config(format!("{}: '{}' is not a number", key, value)))
}
