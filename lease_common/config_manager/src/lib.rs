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

/// Configuration management module for loading and accessing application configuration.
///
/// This module provides a thread-safe singleton for configuration data loaded
/// from YAML files. It uses Rust's `OnceLock` to ensure thread safety and
/// proper initialization semantics.
///
/// # Example
///
/// ```no_run
/// use serde::Deserialize;
///
/// use config_manager::{ConfigSingleton, ConfigSource};
///
/// #[derive(Deserialize)]
/// struct AppConfig {
///     app_name: String,
///     #[serde(default)]
///     port: u16,
/// }
///
/// impl ConfigSource for AppConfig {}
///
/// static CONFIG: ConfigSingleton<AppConfig> = ConfigSingleton::new();
///
/// CONFIG.initialize("config.yaml").expect("Failed to load config");
/// let app_config = CONFIG.get_instance().expect("Config not initialized");
/// println!("App running: {} on port {}", app_config.app_name, app_config.port);
/// ```
pub mod manager;
pub mod types;

// Re-export key struct
pub use manager::{ConfigSingleton, ConfigSource};
pub use types::context::{WorkerConfig, REDIS_URL_ENV, WORKER_CONFIG};
