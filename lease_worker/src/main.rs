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


mod error;
mod worker;

use std::sync::Arc;

use common_log::{init_with_config, init_with_yaml};
use config_manager::WORKER_CONFIG;
use distributed_lock::{InstanceId, LockCoordinator};
use lease_store::{LeaseStore, RedisClient, StoreConfig};
use log::{error, info, warn};
use schedule_job::SchedulerBuilders;
use tokio::pin;

use crate::error::WorkerError;

const DEFAULT_CONFIG_PATH: &str = "lease_worker.yaml";

#[tokio::main]
async fn main() -> Result<(), WorkerError> {
    if let Err(e) = dotenv::dotenv() {
        eprintln!("No .env file loaded: {}", e);
    }

    // Use command line arguments if provided
    let args: Vec<String> = std::env::args().collect();
    let config_path = if args.len() > 1 { args[1].as_str() } else { DEFAULT_CONFIG_PATH };

    WORKER_CONFIG
        .initialize(config_path)
        .map_err(|e| WorkerError::ConfigError(format!("Failed to load {}: {}", config_path, e)))?;
    let config = WORKER_CONFIG
        .get_instance()
        .map_err(|e| WorkerError::ConfigError(format!("Failed to get worker config instance: {}", e)))?;

    let logger = match &config.logging.config_file {
        Some(path) => init_with_yaml(path.as_str()),
        None => init_with_config(worker::log_config(config)),
    };
    logger.map_err(|e| WorkerError::IoError(format!("Failed to initialize logger: {}", e)))?;
    info!("Lease worker starting with configuration {}", config_path);

    let instance = InstanceId::from_env();
    info!("Instance identity: {}", instance);

    let store_config = StoreConfig {
        url: config.store.url.clone(),
        connect_timeout: config.store.connect_timeout(),
        command_timeout: config.store.command_timeout(),
    };
    let client = Arc::new(RedisClient::connect(&store_config).await?);
    let store: Arc<dyn LeaseStore> = client.clone();

    let coordinator =
        Arc::new(LockCoordinator::new(store, instance).with_store_timeout(config.store.command_timeout()));
    let task = worker::guarded_task(config, coordinator)?;

    let mut schedulers = SchedulerBuilders::new();
    schedulers.add(worker::scheduler_config(config)?, task);

    if let Err(e) = schedulers.start_all().await {
        error!("Failed to start scheduler: {}", e);
        return Err(WorkerError::SchedulerError(e));
    }
    info!("Scheduler '{}' started, lock key '{}'", config.schedule.name, config.lock.key);

    let mut term_signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .map_err(|e| WorkerError::IoError(format!("Failed to register TERM signal handler: {}", e)))?;

    let ctrl_c = tokio::signal::ctrl_c();
    pin!(ctrl_c);

    tokio::select! {
        _ = &mut ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = term_signal.recv() => {
            info!("Received SIGTERM signal");
        }
    }

    // In-flight firings finish and release their lease before this returns.
    schedulers.stop_all().await;
    drop(schedulers);

    match Arc::try_unwrap(client) {
        Ok(client) => client.disconnect(),
        Err(_) => warn!("Lease store still referenced at shutdown, leaving the connection to close on exit"),
    }
    info!("Lease worker stopped");
    Ok(())
}
