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

//! Wiring between the loaded configuration and the scheduling crates.

use std::sync::Arc;
use std::time::Duration;

use common_log::config::{LogConfig, LoggerConfig};
use config_manager::WorkerConfig;
use distributed_lock::{LockCoordinator, LockOptions};
use log::info;
use schedule_job::{boxed_task, BoxedTask, ScheduledTaskRunner, SchedulerConfig};

use crate::error::WorkerError;

const MAX_LOG_FILE_SIZE: u64 = 10485760; // 10MB
const MAX_LOG_FILE_COUNT: u32 = 6;

pub fn log_config(config: &WorkerConfig) -> LogConfig {
    LogConfig {
        loggers: vec![LoggerConfig {
            path_prefix: "root".to_string(),
            log_directory: config.logging.directory.clone(),
            log_file_name: config.logging.file_name.clone(),
            max_file_size: MAX_LOG_FILE_SIZE,
            max_zip_count: MAX_LOG_FILE_COUNT,
            level: config.logging.level.clone(),
            console: config.logging.console,
        }],
    }
}

pub fn lock_options(config: &WorkerConfig) -> Result<LockOptions, WorkerError> {
    let options = LockOptions::new()
        .ttl(config.lock.ttl())
        .wait_budget(config.lock.wait_budget())
        .retry_interval(config.lock.retry_interval());
    options.validate()?;
    Ok(options)
}

pub fn scheduler_config(config: &WorkerConfig) -> Result<SchedulerConfig, WorkerError> {
    let schedule = &config.schedule;
    let scheduler_config = SchedulerConfig::new().name(schedule.name.clone());
    let scheduler_config = match (&schedule.cron, schedule.interval_secs) {
        (Some(expr), _) => scheduler_config.cron(expr)?,
        (None, Some(secs)) => scheduler_config.intervals(secs)?,
        (None, None) => {
            return Err(WorkerError::ConfigError(format!("schedule {} has no trigger", schedule.name)));
        },
    };
    Ok(scheduler_config.max_queue_size(schedule.max_queue_size)?)
}

/// Task body of the worker: announces itself and holds the lease for `duration`.
pub fn demo_body(duration: Duration) -> BoxedTask {
    boxed_task(move || async move {
        info!("executing");
        tokio::time::sleep(duration).await;
        Ok(())
    })
}

/// Builds the lock-guarded task registered with the scheduler.
pub fn guarded_task(config: &WorkerConfig, coordinator: Arc<LockCoordinator>) -> Result<BoxedTask, WorkerError> {
    let runner = ScheduledTaskRunner::new(
        config.schedule.name.clone(),
        coordinator,
        config.lock.key.clone(),
        lock_options(config)?,
        demo_body(config.task.duration()),
    );
    Ok(runner.into_task())
}
