use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cli::Cli;
use crate::error::AppError;
use crate::polling::{PollingConfig, MIN_INTERVAL_MS};
use crate::providers::{FetchParams, ProviderConfig};
use crate::scheduler::{SchedulerConfig, TaskType};

const DEFAULT_TICK_MS: u64 = 1_000;
const DEFAULT_PROBE_INTERVAL_SECONDS: u64 = 30;

/// Process-level settings: where the feed file lives and how fast the
/// scheduler loops run.
#[derive(Debug, Clone)]
pub struct Config {
    pub feed_config_path: PathBuf,
    pub tick_ms: u64,
    pub probe_interval_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let feed_config_path = lookup("FEED_CONFIG_PATH")
            .map(PathBuf::from)
            .ok_or("FEED_CONFIG_PATH is required")?;

        let tick_ms = match lookup("SCHEDULER_TICK_MS") {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| "SCHEDULER_TICK_MS must be a valid number")?,
            None => DEFAULT_TICK_MS,
        };

        let probe_interval_seconds = match lookup("PROVIDER_PROBE_INTERVAL_SECONDS") {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| "PROVIDER_PROBE_INTERVAL_SECONDS must be a valid number")?,
            None => DEFAULT_PROBE_INTERVAL_SECONDS,
        };

        Ok(Self {
            feed_config_path,
            tick_ms,
            probe_interval_seconds,
        })
    }

    /// Env first, then any CLI flag that was given. The feed path may come
    /// from either source.
    pub fn load(cli: &Cli) -> Result<Self, String> {
        let cli_path = cli.config.as_ref().map(|path| path.display().to_string());
        let mut config = Self::from_lookup(|key| match (key, &cli_path) {
            ("FEED_CONFIG_PATH", Some(path)) => Some(path.clone()),
            _ => env::var(key).ok(),
        })?;
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(path) = &cli.config {
            self.feed_config_path = path.clone();
        }
        if let Some(tick_ms) = cli.tick_ms {
            self.tick_ms = tick_ms;
        }
        if let Some(probe) = cli.probe_interval {
            self.probe_interval_seconds = probe;
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.tick_ms == 0 {
            return Err("scheduler tick must be greater than zero".to_string());
        }
        if self.probe_interval_seconds == 0 {
            return Err("probe interval must be greater than zero".to_string());
        }
        Ok(())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            tick_interval: Duration::from_millis(self.tick_ms),
            probe_interval: Duration::from_secs(self.probe_interval_seconds),
        }
    }
}

/// One task entry in the feed file.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    pub id: String,
    pub kind: TaskType,
    pub providers: Vec<String>,
    #[serde(default)]
    pub params: FetchParams,
}

/// Contents of the JSON feed file.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(default)]
    pub polling: PollingConfig,
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
}

impl FeedConfig {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Parse and validate.
    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let config: FeedConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Interval floor, unique ids, and every task provider reference
    /// resolving to a configured provider.
    pub fn validate(&self) -> Result<(), AppError> {
        self.polling
            .validate(MIN_INTERVAL_MS)
            .map_err(AppError::Config)?;

        let mut provider_ids = HashSet::new();
        for provider in &self.providers {
            if !provider_ids.insert(provider.id.as_str()) {
                return Err(AppError::Config(format!(
                    "duplicate provider id: {}",
                    provider.id
                )));
            }
        }

        let mut task_ids = HashSet::new();
        for task in &self.tasks {
            if !task_ids.insert(task.id.as_str()) {
                return Err(AppError::Config(format!("duplicate task id: {}", task.id)));
            }
            if task.providers.is_empty() {
                return Err(AppError::Config(format!("task {} has no providers", task.id)));
            }
            if let Some(unknown) = task
                .providers
                .iter()
                .find(|id| !provider_ids.contains(id.as_str()))
            {
                return Err(AppError::Config(format!(
                    "task {} references unknown provider {}",
                    task.id, unknown
                )));
            }
        }

        Ok(())
    }
}
