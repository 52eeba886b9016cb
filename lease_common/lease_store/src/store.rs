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

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Operations a shared store must offer to back a distributed lock.
///
/// Every method is a single round trip. `set_if_absent`, `delete_if_value` and
/// `expire_if_value` must be atomic on the server side: a store that can only
/// emulate them with several commands is not a valid backing store.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Creates `key` with `value` and `ttl` only if the key does not exist.
    ///
    /// # Returns
    ///
    /// `Ok(true)` if this call created the record, `Ok(false)` if it already existed.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Reads the current value of `key`, `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Deletes `key` unconditionally. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Deletes `key` only if its current value equals `value`.
    ///
    /// # Returns
    ///
    /// `Ok(true)` if the record was removed, `Ok(false)` if it was absent or held another value.
    async fn delete_if_value(&self, key: &str, value: &str) -> Result<bool>;

    /// Resets the expiry of `key` to `ttl` only if its current value equals `value`.
    async fn expire_if_value(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Remaining time to live of `key`, `None` when absent or without expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>>;
}
