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

use std::sync::Arc;

use chrono::Local;
use distributed_lock::{DistributedLockError, LockCoordinator, LockOptions};
use log::{error, info, warn};

use crate::error::JobError;
use crate::scheduler::BoxedTask;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// What happened in this instance for one firing
#[derive(Debug)]
pub enum FiringOutcome {
    /// This instance held the lease and ran the body; carries the body's result
    Executed(Result<(), JobError>),
    /// Another instance held the lease for the whole wait budget
    Skipped,
    /// The lease store could not be reached, the body did not run
    AcquireFailed(DistributedLockError),
}

impl FiringOutcome {
    pub fn is_executed(&self) -> bool {
        matches!(self, FiringOutcome::Executed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, FiringOutcome::Skipped)
    }
}

/// Runs a task body at most once across the fleet per firing.
///
/// Each firing asks the coordinator for the lease on `lock_key`. Only the
/// holder runs the body; the lease is released after the body on every path.
/// A firing that does not get the lease is not retried, the next firing is.
pub struct ScheduledTaskRunner {
    name: String,
    coordinator: Arc<LockCoordinator>,
    lock_key: String,
    lock_options: LockOptions,
    body: Arc<BoxedTask>,
}

impl ScheduledTaskRunner {
    pub fn new(
        name: impl Into<String>,
        coordinator: Arc<LockCoordinator>,
        lock_key: impl Into<String>,
        lock_options: LockOptions,
        body: BoxedTask,
    ) -> Self {
        Self {
            name: name.into(),
            coordinator,
            lock_key: lock_key.into(),
            lock_options,
            body: Arc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lock_key(&self) -> &str {
        &self.lock_key
    }

    /// Handles one firing and logs its outcome with the instance identity.
    pub async fn fire(&self) -> FiringOutcome {
        let instance = self.coordinator.instance();
        let body = Arc::clone(&self.body);

        let acquired = self.coordinator.with_lock(&self.lock_key, &self.lock_options, || {
            info!(
                "Task '{}' is executing on instance {} at {}",
                self.name,
                instance,
                Local::now().format(TIME_FORMAT)
            );
            body()
        });

        match acquired.await {
            Ok(Some(result)) => {
                match &result {
                    Ok(()) => info!(
                        "Task '{}' finished on instance {}, released lock '{}' at {}",
                        self.name,
                        instance,
                        self.lock_key,
                        Local::now().format(TIME_FORMAT)
                    ),
                    Err(e) => error!(
                        "Task '{}' failed on instance {}, released lock '{}' at {}: {}",
                        self.name,
                        instance,
                        self.lock_key,
                        Local::now().format(TIME_FORMAT),
                        e
                    ),
                }
                FiringOutcome::Executed(result)
            },
            Ok(None) => {
                warn!(
                    "Task '{}' skipped on instance {} at {}, lock '{}' is held elsewhere",
                    self.name,
                    instance,
                    Local::now().format(TIME_FORMAT),
                    self.lock_key
                );
                FiringOutcome::Skipped
            },
            Err(e) => {
                error!(
                    "Task '{}' failed to acquire lock '{}' on instance {} at {}: {}",
                    self.name,
                    self.lock_key,
                    instance,
                    Local::now().format(TIME_FORMAT),
                    e
                );
                FiringOutcome::AcquireFailed(e)
            },
        }
    }

    /// Adapts the runner into a scheduler task. Skips complete successfully;
    /// body failures and acquisition failures surface as task errors.
    pub fn into_task(self) -> BoxedTask {
        let runner = Arc::new(self);
        Box::new(move || {
            let runner = Arc::clone(&runner);
            Box::pin(async move {
                match runner.fire().await {
                    FiringOutcome::Executed(result) => result,
                    FiringOutcome::Skipped => Ok(()),
                    FiringOutcome::AcquireFailed(e) => Err(JobError::LockError(e)),
                }
            })
        })
    }
}
