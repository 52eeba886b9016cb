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

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use lease_store::{LeaseStore, StoreError};
use log::{debug, error, warn};
use tokio::time::{sleep, Instant};

use super::error::{DistributedLockError, Result};
use super::guard::{release_lease, LeaseGuard};
use super::identity::InstanceId;
use super::lock::{Lease, LockOptions};

/// Default bound for a single store round trip
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// Acquires and releases leases on named keys through a shared store.
///
/// The coordinator keeps no lock state of its own: the record in the store is
/// the only evidence of ownership, and mutual exclusion rests on the store's
/// atomic `set_if_absent`.
pub struct LockCoordinator {
    store: Arc<dyn LeaseStore>,
    instance: InstanceId,
    store_timeout: Duration,
}

impl LockCoordinator {
    pub fn new(store: Arc<dyn LeaseStore>, instance: InstanceId) -> Self {
        Self { store, instance, store_timeout: DEFAULT_STORE_TIMEOUT }
    }

    /// Bounds every store round trip issued by this coordinator.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn instance(&self) -> &InstanceId {
        &self.instance
    }

    /// Tries to take the lease on `key`, polling until `options.wait_budget` elapses.
    ///
    /// At least one attempt is made, also with a zero budget. Between attempts the
    /// task sleeps `retry_interval`, never past the deadline.
    ///
    /// # Arguments
    ///
    /// * `key` - Lock key name, must not be empty
    /// * `options` - Lease ttl, wait budget and retry interval
    ///
    /// # Returns
    ///
    /// `Ok(Some(lease))` when granted, `Ok(None)` when the budget ran out while
    /// another holder kept the key.
    ///
    /// # Errors
    ///
    /// * `DistributedLockError::InvalidArgument` - If the key is empty or the options are invalid.
    /// * `DistributedLockError::StoreUnavailable` - If a store call fails; polling stops at the first failure.
    pub async fn acquire_lock(&self, key: &str, options: &LockOptions) -> Result<Option<Lease>> {
        if key.is_empty() {
            return Err(DistributedLockError::InvalidArgument("lock key must not be empty".to_string()));
        }
        options.validate()?;

        let token = self.instance.lease_token();
        let deadline = Instant::now() + options.wait_budget;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            let created = self
                .bounded("set_if_absent", self.store.set_if_absent(key, &token, options.ttl))
                .await
                .map_err(|e| {
                    error!("Instance {} could not reach the lease store for lock '{}': {}", self.instance, key, e);
                    DistributedLockError::StoreUnavailable(e)
                })?;

            if created {
                debug!(
                    "Instance {} acquired lock '{}' for {:?} after {} attempt(s)",
                    self.instance, key, options.ttl, attempts
                );
                return Ok(Some(Lease::new(key, token, options.ttl)));
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(
                    "Instance {} gave up on lock '{}' after {} attempt(s) in {:?}",
                    self.instance, key, attempts, options.wait_budget
                );
                return Ok(None);
            }
            sleep(options.retry_interval.min(deadline - now)).await;
        }
    }

    /// Releases `lease` if the store still holds this very acquisition.
    ///
    /// Releasing a lease that already expired, or whose key was re-acquired by
    /// someone else, deletes nothing and returns `Ok(false)`.
    ///
    /// # Errors
    ///
    /// * `DistributedLockError::ReleaseFailed` - If the store could not be reached.
    pub async fn release_lock(&self, lease: &Lease) -> Result<bool> {
        release_lease(self.store.as_ref(), lease, self.store_timeout).await
    }

    /// Resets the lease lifetime to `ttl` from now, if it is still held.
    pub async fn extend_lock(&self, lease: &Lease, ttl: Duration) -> Result<Option<Lease>> {
        let extended = self
            .bounded("expire_if_value", self.store.expire_if_value(lease.key(), lease.token(), ttl))
            .await?;
        if extended {
            Ok(Some(lease.renewed(ttl)))
        } else {
            warn!("Instance {} could not extend lock '{}', the lease is gone", self.instance, lease.key());
            Ok(None)
        }
    }

    /// Remaining ttl of whichever lease currently holds `key`.
    pub async fn lock_ttl(&self, key: &str) -> Result<Option<Duration>> {
        Ok(self.bounded("ttl", self.store.ttl(key)).await?)
    }

    /// Like [`acquire_lock`](Self::acquire_lock), returning a guard that owns the lease.
    pub async fn lock_guard(&self, key: &str, options: &LockOptions) -> Result<Option<LeaseGuard>> {
        let lease = self.acquire_lock(key, options).await?;
        Ok(lease.map(|lease| LeaseGuard::new(Arc::clone(&self.store), lease, self.store_timeout)))
    }

    /// Runs `body` while holding the lease on `key`.
    ///
    /// The lease is released exactly once after `body` finishes, whether it
    /// returned normally, returned an error inside `T`, or panicked. A panic is
    /// re-raised after the release. Release failures are logged only, the
    /// record then expires with its ttl.
    ///
    /// # Returns
    ///
    /// `Ok(Some(output))` when the body ran, `Ok(None)` when the lock was not granted.
    pub async fn with_lock<F, Fut, T>(&self, key: &str, options: &LockOptions, body: F) -> Result<Option<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let guard = match self.lock_guard(key, options).await? {
            Some(guard) => guard,
            None => return Ok(None),
        };

        let outcome = AssertUnwindSafe(body()).catch_unwind().await;

        if let Err(e) = guard.release().await {
            error!("Instance {} failed to release lock '{}': {}", self.instance, key, e);
        }

        match outcome {
            Ok(output) => Ok(Some(output)),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn bounded<T, Fut>(&self, op: &str, call: Fut) -> std::result::Result<T, StoreError>
    where
        Fut: Future<Output = std::result::Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(format!("{} exceeded {:?}", op, self.store_timeout))),
        }
    }
}
