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

use distributed_lock::DistributedLockError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Scheduler state error: {0}")]
    StateError(String),

    #[error("Lock error: {0}")]
    LockError(#[from] DistributedLockError),
}
