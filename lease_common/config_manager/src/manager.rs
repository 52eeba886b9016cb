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

use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::OnceLock;

/// A configuration type that can be loaded by [`ConfigSingleton`].
pub trait ConfigSource: for<'a> Deserialize<'a> + Send + Sync + 'static {
    /// Applies environment variable overrides after the file has been parsed.
    fn apply_env_overrides(&mut self) {}

    /// Checks the loaded values, returning a description of the first problem.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// A thread-safe singleton configuration manager that loads and provides access to configuration data.
///
/// # Type Parameters
///
/// * `T` - The configuration type, deserialized from YAML.
pub struct ConfigSingleton<T: ConfigSource> {
    instance: OnceLock<T>,
}

impl<T: ConfigSource> ConfigSingleton<T> {
    /// Creates a new, uninitialized `ConfigSingleton` instance.
    pub const fn new() -> Self {
        ConfigSingleton { instance: OnceLock::new() }
    }

    /// Parses and validates a configuration file without storing it.
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// * The file cannot be opened or read
    /// * The YAML content cannot be parsed into the target type `T`
    /// * `T::validate` rejects the parsed values
    pub fn load<P: AsRef<Path>>(path: P) -> Result<T, String> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| format!("Failed to open config file {}: {}", path.display(), e))?;

        let mut contents = String::new();
        let mut reader = BufReader::new(file);
        reader.read_to_string(&mut contents).map_err(|e| format!("Failed to read config file: {}", e))?;

        let mut config: T = serde_yaml::from_str(&contents).map_err(|e| format!("Failed to parse YAML: {}", e))?;
        config.apply_env_overrides();
        config.validate().map_err(|e| format!("Invalid configuration: {}", e))?;
        Ok(config)
    }

    /// Initializes the singleton from a YAML configuration file.
    ///
    /// If the singleton has already been initialized, this method returns
    /// `Ok(())` without changing the existing configuration.
    pub fn initialize<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        if self.instance.get().is_some() {
            return Ok(());
        }

        let config = Self::load(path)?;
        let _ = self.instance.set(config);
        Ok(())
    }

    /// Retrieves a reference to the initialized configuration instance.
    ///
    /// # Errors
    ///
    /// Returns an error if `initialize` has not been called successfully before calling this method.
    pub fn get_instance(&self) -> Result<&T, String> {
        self.instance.get().ok_or_else(|| "Configuration not initialized".to_string())
    }
}

impl<T: ConfigSource> Default for ConfigSingleton<T> {
    fn default() -> Self {
        Self::new()
    }
}
