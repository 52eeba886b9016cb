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
use std::time::Duration;

use log::{debug, info};
use redis::aio::ConnectionManager;
use redis::{Client, RedisResult, Script};

use crate::error::{Result, StoreError};
use crate::scripts::{DELETE_IF_VALUE, EXPIRE_IF_VALUE};

/// Connection settings for the Redis backed lease store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Redis connection url, e.g. `redis://redis:6379`
    pub url: String,
    /// Upper bound for opening and verifying the connection
    pub connect_timeout: Duration,
    /// Upper bound for a single command round trip
    pub command_timeout: Duration,
}

impl StoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(2),
        }
    }
}

/// Redis client owning one managed connection for the lifetime of the coordinator.
///
/// The connection is opened by [`RedisClient::connect`] and closed by
/// [`RedisClient::disconnect`]; there is no process-wide instance. The underlying
/// `ConnectionManager` reconnects on its own after transient failures, which
/// surface to callers as `StoreError` until the server is reachable again.
pub struct RedisClient {
    pub(crate) manager: ConnectionManager,
    pub(crate) command_timeout: Duration,
    pub(crate) delete_script: Script,
    pub(crate) expire_script: Script,
    url: String,
}

impl RedisClient {
    /// Opens the connection and verifies it with `PING`.
    ///
    /// # Errors
    ///
    /// * `StoreError::ConnectionError` - If the url is invalid or the server refuses the connection.
    /// * `StoreError::Timeout` - If the server does not answer within `connect_timeout`.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;
        let manager = tokio::time::timeout(config.connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Timeout(format!("connect to {} exceeded {:?}", config.url, config.connect_timeout)))??;

        let redis_client = RedisClient {
            manager,
            command_timeout: config.command_timeout,
            delete_script: Script::new(DELETE_IF_VALUE),
            expire_script: Script::new(EXPIRE_IF_VALUE),
            url: config.url.clone(),
        };

        let pong: String = redis_client
            .run("PING", |mut conn| async move { redis::cmd("PING").query_async(&mut conn).await })
            .await?;
        if pong != "PONG" {
            return Err(StoreError::Unavailable(format!("unexpected PING reply: {}", pong)));
        }

        info!("Connected to lease store at {}", redis_client.url);
        Ok(redis_client)
    }

    /// Closes the connection. Pending commands issued through clones of the
    /// connection finish or fail on their own.
    pub fn disconnect(self) {
        info!("Disconnected from lease store at {}", self.url);
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Runs one command on a clone of the managed connection, bounded by the command timeout.
    pub(crate) async fn run<T, F, Fut>(&self, op: &str, command: F) -> Result<T>
    where
        F: FnOnce(ConnectionManager) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let conn = self.manager.clone();
        match tokio::time::timeout(self.command_timeout, command(conn)).await {
            Ok(result) => result.map_err(|e| {
                debug!("Redis {} failed: {}", op, e);
                if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout() {
                    StoreError::ConnectionError(e)
                } else {
                    StoreError::OperationError(format!("{}: {}", op, e))
                }
            }),
            Err(_) => Err(StoreError::Timeout(format!("{} exceeded {:?}", op, self.command_timeout))),
        }
    }
}
