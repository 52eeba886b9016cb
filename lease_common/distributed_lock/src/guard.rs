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
use std::time::Duration;

use lease_store::{LeaseStore, StoreError};
use log::{debug, error, warn};

use super::error::{DistributedLockError, Result};
use super::lock::Lease;

/// Compare-and-delete of `lease`, bounded by `timeout`.
///
/// `Ok(false)` means the record had already expired or now belongs to another
/// acquisition; nothing is deleted in that case.
pub(crate) async fn release_lease(store: &dyn LeaseStore, lease: &Lease, timeout: Duration) -> Result<bool> {
    let outcome = match tokio::time::timeout(timeout, store.delete_if_value(lease.key(), lease.token())).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(format!("release of '{}' exceeded {:?}", lease.key(), timeout))),
    };

    match outcome {
        Ok(true) => {
            debug!("Released lock '{}' ({})", lease.key(), lease.token());
            Ok(true)
        },
        Ok(false) => {
            warn!(
                "Lock '{}' expired or was taken over before release ({}), consider a longer ttl than {:?}",
                lease.key(),
                lease.token(),
                lease.ttl()
            );
            Ok(false)
        },
        Err(e) => Err(DistributedLockError::ReleaseFailed(format!("{}: {}", lease.key(), e))),
    }
}

/// Holds a lease until released.
///
/// Call [`LeaseGuard::release`] on every path out of the critical section. A
/// guard dropped without it (cancelled future, early `?`) schedules a
/// background release on the current tokio runtime; outside a runtime the
/// record is left to expire.
pub struct LeaseGuard {
    store: Arc<dyn LeaseStore>,
    lease: Lease,
    store_timeout: Duration,
    released: bool,
}

impl LeaseGuard {
    pub(crate) fn new(store: Arc<dyn LeaseStore>, lease: Lease, store_timeout: Duration) -> Self {
        Self { store, lease, store_timeout, released: false }
    }

    pub fn lease(&self) -> &Lease {
        &self.lease
    }

    /// Extends the held lease to `ttl` from now.
    ///
    /// # Returns
    ///
    /// `Ok(false)` if the lease was already lost; the guard keeps the old expiry estimate.
    pub async fn extend(&mut self, ttl: Duration) -> Result<bool> {
        let extended = match tokio::time::timeout(
            self.store_timeout,
            self.store.expire_if_value(self.lease.key(), self.lease.token(), ttl),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(DistributedLockError::StoreUnavailable(StoreError::Timeout(format!(
                    "extend of '{}' exceeded {:?}",
                    self.lease.key(),
                    self.store_timeout
                ))))
            },
        };
        if extended {
            self.lease = self.lease.renewed(ttl);
        }
        Ok(extended)
    }

    /// Releases the lease. Consumes the guard so the release runs once.
    pub async fn release(mut self) -> Result<bool> {
        self.released = true;
        release_lease(self.store.as_ref(), &self.lease, self.store_timeout).await
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let store = Arc::clone(&self.store);
        let lease = self.lease.clone();
        let timeout = self.store_timeout;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = release_lease(store.as_ref(), &lease, timeout).await {
                        error!("Failed to release dropped lock: {}", e);
                    }
                });
            },
            Err(_) => {
                warn!("Lock '{}' dropped outside a runtime, it will expire after {:?}", lease.key(), lease.ttl());
            },
        }
    }
}
