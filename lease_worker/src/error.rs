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

use thiserror::Error;

use distributed_lock::DistributedLockError;
use lease_store::StoreError;
use schedule_job::JobError;

/// Bootstrap failures of the worker process. Any of them ends the process
/// with a non-zero exit code.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Lease store error: {0}")]
    StoreError(#[from] StoreError),

    #[error("Lock error: {0}")]
    LockError(#[from] DistributedLockError),

    #[error("Scheduler error: {0}")]
    SchedulerError(#[from] JobError),
}
