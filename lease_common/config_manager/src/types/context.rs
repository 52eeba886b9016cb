/*
 * Copyright (c) Huawei Technologies Co., Ltd. 2025. All rights reserved.
 * Global Trust Authority is licensed under the Mulan PSL v2.
 * You can use this software according to the terms and conditions of the Mulan PSL v2.
 * You may obtain a copy of Mulan PSL v2 at:
 *     http://license.coscl.org.cn/MulanPSL2
 * THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND, EITHER EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT, MERCHANTABILITY OR FIT FOR A PARTICULAR
 * PURPOSE.
 * See the Mulan PSL v2 for more details.
 */

use serde::Deserialize;
use std::time::Duration;

use crate::{ConfigSingleton, ConfigSource};

/// Environment variable overriding `store.url`
pub const REDIS_URL_ENV: &str = "REDIS_URL";

/// Main configuration structure of the lease worker, matching lease_worker.yaml.
///
/// Every time value is in milliseconds, except `schedule.interval_secs`.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    pub store: StoreSection,
    #[serde(default)]
    pub lock: LockSection,
    pub schedule: ScheduleSection,
    #[serde(default)]
    pub task: TaskSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Lease store connection settings
#[derive(Debug, Deserialize, Clone)]
pub struct StoreSection {
    /// Redis url, e.g. redis://redis:6379
    pub url: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

/// Lock settings of the scheduled task
#[derive(Debug, Deserialize, Clone)]
pub struct LockSection {
    #[serde(default = "default_lock_key")]
    pub key: String,
    /// Lease lifetime, must exceed the task duration
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
    /// How long a firing polls for the lock before skipping
    #[serde(default = "default_wait_budget_ms")]
    pub wait_budget_ms: u64,
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

/// Firing schedule, either `cron` or `interval_secs`
#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleSection {
    #[serde(default = "default_schedule_name")]
    pub name: String,
    pub cron: Option<String>,
    pub interval_secs: Option<u64>,
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
}

/// The task body run by the lock holder
#[derive(Debug, Deserialize, Clone)]
pub struct TaskSection {
    /// Expected duration of one execution
    #[serde(default = "default_task_duration_ms")]
    pub duration_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory of the rolling log file; empty logs to the console only
    #[serde(default)]
    pub directory: String,
    #[serde(default = "default_log_file_name")]
    pub file_name: String,
    #[serde(default = "default_console")]
    pub console: bool,
    /// Separate log4rs-style logger file; replaces the settings above when set
    #[serde(default)]
    pub config_file: Option<String>,
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_command_timeout_ms() -> u64 {
    2000
}

fn default_lock_key() -> String {
    "my_lock".to_string()
}

fn default_ttl_ms() -> u64 {
    5000
}

fn default_wait_budget_ms() -> u64 {
    500
}

fn default_retry_interval_ms() -> u64 {
    100
}

fn default_schedule_name() -> String {
    "scheduled_task".to_string()
}

fn default_max_queue_size() -> usize {
    1
}

fn default_task_duration_ms() -> u64 {
    1800
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file_name() -> String {
    "lease-worker.log".to_string()
}

fn default_console() -> bool {
    true
}

impl Default for LockSection {
    fn default() -> Self {
        Self {
            key: default_lock_key(),
            ttl_ms: default_ttl_ms(),
            wait_budget_ms: default_wait_budget_ms(),
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

impl Default for TaskSection {
    fn default() -> Self {
        Self { duration_ms: default_task_duration_ms() }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
            file_name: default_log_file_name(),
            console: default_console(),
            config_file: None,
        }
    }
}

impl StoreSection {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

impl LockSection {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn wait_budget(&self) -> Duration {
        Duration::from_millis(self.wait_budget_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

impl TaskSection {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

impl ConfigSource for WorkerConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(REDIS_URL_ENV) {
            if !url.trim().is_empty() {
                self.store.url = url.trim().to_string();
            }
        }
    }

    /// Rejects values that would break mutual exclusion or the schedule.
    ///
    /// A ttl not above the task duration lets the lease expire under a running
    /// body. A wait budget not below the task duration lets a losing instance
    /// take the lease after the winner releases and run the body again in the
    /// same firing.
    fn validate(&self) -> Result<(), String> {
        if self.store.url.trim().is_empty() {
            return Err("store.url must not be empty".to_string());
        }
        if self.lock.key.is_empty() {
            return Err("lock.key must not be empty".to_string());
        }
        if self.lock.retry_interval_ms == 0 {
            return Err("lock.retry_interval_ms must be greater than zero".to_string());
        }
        if self.lock.ttl_ms <= self.task.duration_ms {
            return Err(format!(
                "lock.ttl_ms ({}) must exceed task.duration_ms ({})",
                self.lock.ttl_ms, self.task.duration_ms
            ));
        }
        if self.task.duration_ms > 0 && self.lock.wait_budget_ms >= self.task.duration_ms {
            return Err(format!(
                "lock.wait_budget_ms ({}) must be below task.duration_ms ({})",
                self.lock.wait_budget_ms, self.task.duration_ms
            ));
        }
        match (&self.schedule.cron, self.schedule.interval_secs) {
            (Some(_), Some(_)) => return Err("schedule.cron and schedule.interval_secs are exclusive".to_string()),
            (None, None) => return Err("one of schedule.cron or schedule.interval_secs is required".to_string()),
            (None, Some(0)) => return Err("schedule.interval_secs must be greater than zero".to_string()),
            _ => {},
        }
        if self.schedule.max_queue_size == 0 {
            return Err("schedule.max_queue_size must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Global configuration singleton instance
///
/// Call `WORKER_CONFIG.initialize(path)` once at startup and
/// `WORKER_CONFIG.get_instance()` to read the loaded configuration.
pub static WORKER_CONFIG: ConfigSingleton<WorkerConfig> = ConfigSingleton::new();
