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

//! Lease store client: a shared key-value store with per-key expiry and atomic
//! conditional writes, used as the coordination medium for distributed locks.

pub mod client;
pub mod error;
pub mod memory;
pub mod operations;
pub mod scripts;
pub mod store;

pub use client::{RedisClient, StoreConfig};
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use store::LeaseStore;
