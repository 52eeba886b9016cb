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

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::{Result, StoreError};
use crate::store::LeaseStore;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-process lease store.
///
/// Every operation runs under one mutex, so the conditional operations are atomic
/// among all tasks of this process. Expiry follows `tokio::time`, which lets tests
/// pause and advance the clock. It coordinates a single process only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    unavailable: AtomicBool,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a store outage: while unavailable every call fails.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Number of times `op` (the trait method name) has been called.
    pub fn call_count(&self, op: &str) -> usize {
        self.calls.lock().get(op).copied().unwrap_or(0)
    }

    /// Stores a record without expiry, bypassing the conditional path.
    pub fn insert_persistent(&self, key: &str, value: &str) {
        self.entries.lock().insert(key.to_string(), Entry { value: value.to_string(), expires_at: None });
    }

    fn enter(&self, op: &'static str) -> Result<()> {
        *self.calls.lock().entry(op).or_insert(0) += 1;
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("{} rejected: memory store is offline", op)));
        }
        Ok(())
    }

    /// Returns the live entry for `key`, dropping it first if it has expired.
    fn live_entry<'a>(entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
        let now = Instant::now();
        if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(key);
        }
        entries.get_mut(key)
    }
}

#[async_trait]
impl LeaseStore for MemoryStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        self.enter("set_if_absent")?;
        let mut entries = self.entries.lock();
        if Self::live_entry(&mut entries, key).is_some() {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry { value: value.to_string(), expires_at: Some(Instant::now() + ttl) },
        );
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.enter("get")?;
        let mut entries = self.entries.lock();
        Ok(Self::live_entry(&mut entries, key).map(|entry| entry.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.enter("delete")?;
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn delete_if_value(&self, key: &str, value: &str) -> Result<bool> {
        self.enter("delete_if_value")?;
        let mut entries = self.entries.lock();
        let owned = Self::live_entry(&mut entries, key).is_some_and(|entry| entry.value == value);
        if owned {
            entries.remove(key);
        }
        Ok(owned)
    }

    async fn expire_if_value(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        self.enter("expire_if_value")?;
        let mut entries = self.entries.lock();
        match Self::live_entry(&mut entries, key) {
            Some(entry) if entry.value == value => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            },
            _ => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        self.enter("ttl")?;
        let mut entries = self.entries.lock();
        let now = Instant::now();
        Ok(Self::live_entry(&mut entries, key)
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }
}
