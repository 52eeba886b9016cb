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

use tokio::time::Instant;

use super::error::{DistributedLockError, Result};

/// Timing of one acquisition.
///
/// All three values share one unit system (`Duration`); configuration files
/// express them in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    /// Lifetime of the lease record in the store. Must exceed the expected
    /// duration of the critical section plus a margin: if the holder is still
    /// working when it elapses, another instance can acquire the same key.
    pub ttl: Duration,
    /// Maximum time spent polling before giving up
    pub wait_budget: Duration,
    /// Pause between two acquisition attempts
    pub retry_interval: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5),
            wait_budget: Duration::from_millis(500),
            retry_interval: Duration::from_millis(100),
        }
    }
}

impl LockOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the lease lifetime.
    ///
    /// # Arguments
    ///
    /// * `ttl` - Lifetime of the lease record, longer than the guarded task
    ///
    /// # Returns
    ///
    /// Self for method chaining
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets how long `acquire_lock` keeps polling. Zero means a single attempt.
    pub fn wait_budget(mut self, budget: Duration) -> Self {
        self.wait_budget = budget;
        self
    }

    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Rejects settings the store or the polling loop cannot honour.
    ///
    /// # Errors
    ///
    /// * `DistributedLockError::InvalidArgument` - If the TTL is shorter than one
    ///   millisecond or the retry interval is zero.
    pub fn validate(&self) -> Result<()> {
        if self.ttl < Duration::from_millis(1) {
            return Err(DistributedLockError::InvalidArgument(format!(
                "lease ttl must be at least 1ms, got {:?}",
                self.ttl
            )));
        }
        if self.retry_interval.is_zero() {
            return Err(DistributedLockError::InvalidArgument("retry interval must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// A granted lease on one lock key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    /// Lock key name
    key: String,
    /// Token stored as the record value, identifies this acquisition
    token: String,
    /// Lifetime requested at acquisition or at the last extension
    ttl: Duration,
    /// Local time the record was created or last extended
    granted_at: Instant,
}

impl Lease {
    pub(crate) fn new(key: impl Into<String>, token: impl Into<String>, ttl: Duration) -> Self {
        Self { key: key.into(), token: token.into(), ttl, granted_at: Instant::now() }
    }

    pub(crate) fn renewed(&self, ttl: Duration) -> Self {
        Self { key: self.key.clone(), token: self.token.clone(), ttl, granted_at: Instant::now() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Local estimate of when the store drops the record. The store's own clock is
    /// authoritative; the record may disappear earlier but never later than this
    /// plus the round trip that created it.
    pub fn expires_at(&self) -> Instant {
        self.granted_at + self.ttl
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at()
    }
}
