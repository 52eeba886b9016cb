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

use std::fmt;

use uuid::Uuid;

/// Environment variable that pins the instance identity, e.g. to a pod name
pub const INSTANCE_ID_ENV: &str = "INSTANCE_ID";

/// Opaque identity of one process, fixed for its lifetime.
///
/// Used to attribute log lines and as the prefix of every lease token this
/// process writes, so a record in the store shows which instance holds it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        InstanceId(id.into())
    }

    /// Random identity, unique per process start
    pub fn generate() -> Self {
        InstanceId(Uuid::new_v4().to_string())
    }

    /// Uses `INSTANCE_ID` when set and non-empty, otherwise generates one.
    pub fn from_env() -> Self {
        match std::env::var(INSTANCE_ID_ENV) {
            Ok(id) if !id.trim().is_empty() => InstanceId(id.trim().to_string()),
            _ => Self::generate(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fresh token for one acquisition. Two leases taken by the same instance
    /// never share a token.
    pub fn lease_token(&self) -> String {
        format!("{}:{}", self.0, Uuid::new_v4().simple())
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
