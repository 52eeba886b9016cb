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

//! Distributed lock module, providing lease based mutual exclusion over a shared store

pub mod coordinator;
pub mod error;
pub mod guard;
pub mod identity;
pub mod lock;

pub use coordinator::LockCoordinator;
pub use error::{DistributedLockError, Result};
pub use guard::LeaseGuard;
pub use identity::InstanceId;
pub use lock::{Lease, LockOptions};
