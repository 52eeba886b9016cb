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

use crate::client::RedisClient;
use crate::error::Result;
use crate::store::LeaseStore;

/// Redis expiry arguments are whole milliseconds; zero would be rejected by the server.
fn millis(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

#[async_trait]
impl LeaseStore for RedisClient {
    /// `SET key value NX PX ttl` creates the record and its expiry in one command,
    /// so a crash can never leave a lease without a TTL.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let reply: Option<String> = self
            .run("SET NX", |mut conn| async move {
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("NX")
                    .arg("PX")
                    .arg(millis(ttl))
                    .query_async(&mut conn)
                    .await
            })
            .await?;
        Ok(reply.is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.run("GET", |mut conn| async move { redis::cmd("GET").arg(key).query_async(&mut conn).await })
            .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let _removed: i64 = self
            .run("DEL", |mut conn| async move { redis::cmd("DEL").arg(key).query_async(&mut conn).await })
            .await?;
        Ok(())
    }

    async fn delete_if_value(&self, key: &str, value: &str) -> Result<bool> {
        let script = &self.delete_script;
        let removed: i64 = self
            .run("DELETE IF VALUE", |mut conn| async move {
                script.key(key).arg(value).invoke_async(&mut conn).await
            })
            .await?;
        Ok(removed == 1)
    }

    async fn expire_if_value(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let script = &self.expire_script;
        let extended: i64 = self
            .run("EXPIRE IF VALUE", |mut conn| async move {
                script.key(key).arg(value).arg(millis(ttl)).invoke_async(&mut conn).await
            })
            .await?;
        Ok(extended == 1)
    }

    /// `PTTL` answers -2 for a missing key and -1 for a key without expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let remaining: i64 = self
            .run("PTTL", |mut conn| async move { redis::cmd("PTTL").arg(key).query_async(&mut conn).await })
            .await?;
        if remaining > 0 {
            Ok(Some(Duration::from_millis(remaining as u64)))
        } else {
            Ok(None)
        }
    }
}
