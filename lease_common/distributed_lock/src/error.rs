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


use lease_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DistributedLockError {
    #[error("Lease store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("Lock release failed: {0}")]
    ReleaseFailed(String),

    #[error("Parameter error: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, DistributedLockError>;
