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

use chrono::{DateTime, Local};
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger as SizeBasedTriggerPolicy;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::{
    append::rolling_file::RollingFileAppender,
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    Config, Handle,
};
use std::env;
use std::path::PathBuf;
use crate::config::{LogConfig, LoggerConfig};

const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S:%3f)} {l} [{M}:{L}] - {m}{n}";

/// Optional base directory prepended to every relative `log_directory`
pub const LOG_OUTPUT_DIR_ENV: &str = "LOG_OUTPUT_DIR";

pub struct Logger {
    _handle: Handle,
}

impl Logger {
    pub fn new_from_yaml(config_path: impl Into<PathBuf>) -> Result<Self, Box<dyn std::error::Error>> {
        let config = LogConfig::from_yaml(config_path)?;
        Self::new_from_config(config)
    }

    pub fn new_from_config(config: LogConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let log4rs_config = Self::build_config(&config)?;
        let handle = log4rs::init_config(log4rs_config)?;
        Ok(Self { _handle: handle })
    }

    /// Translates the logger list into a log4rs configuration.
    ///
    /// Every non-root entry becomes a logger for its module path prefix. Entries
    /// without an appender of their own only set the level and forward to root.
    pub(crate) fn build_config(config: &LogConfig) -> Result<Config, Box<dyn std::error::Error>> {
        let mut log4rs_config = Config::builder();

        for logger_config in config.loggers.iter().filter(|l| l.path_prefix != "root") {
            let appenders = Self::create_appenders(logger_config)?;
            let appender_names: Vec<String> = appenders.iter().map(|a| a.name().to_string()).collect();
            log4rs_config = log4rs_config.appenders(appenders);

            let logger = log4rs::config::Logger::builder()
                .appenders(appender_names.clone())
                .additive(appender_names.is_empty())
                .build(logger_config.path_prefix.clone(), Self::parse_level(&logger_config.level));
            log4rs_config = log4rs_config.logger(logger);
        }

        let (mut root_appenders, root_level) = match config.get_root_config() {
            Some(root_config) => (Self::create_appenders(root_config)?, Self::parse_level(&root_config.level)),
            None => (Vec::new(), LevelFilter::Info),
        };
        if root_appenders.is_empty() {
            root_appenders.push(Self::console_appender("root_console"));
        }
        let root_names: Vec<String> = root_appenders.iter().map(|a| a.name().to_string()).collect();
        log4rs_config = log4rs_config.appenders(root_appenders);

        let root = Root::builder().appenders(root_names).build(root_level);
        Ok(log4rs_config.build(root)?)
    }

    fn create_appenders(config: &LoggerConfig) -> Result<Vec<Appender>, Box<dyn std::error::Error>> {
        let mut appenders = Vec::new();
        if !config.log_directory.is_empty() {
            let file = Self::create_file_appender(config)?;
            appenders.push(Appender::builder().build(format!("{}_file", config.path_prefix), Box::new(file)));
        }
        if config.console {
            appenders.push(Self::console_appender(&format!("{}_console", config.path_prefix)));
        }
        Ok(appenders)
    }

    fn console_appender(name: &str) -> Appender {
        let console = ConsoleAppender::builder().encoder(Box::new(PatternEncoder::new(LOG_PATTERN))).build();
        Appender::builder().build(name, Box::new(console))
    }

    fn create_file_appender(config: &LoggerConfig) -> Result<RollingFileAppender, Box<dyn std::error::Error>> {
        let log_directory = match env::var(LOG_OUTPUT_DIR_ENV) {
            Ok(base) if !base.is_empty() => PathBuf::from(base).join(&config.log_directory),
            _ => PathBuf::from(&config.log_directory),
        };

        std::fs::create_dir_all(&log_directory)?;

        let now: DateTime<Local> = Local::now();
        let formatted_time = now.format("%Y%m%d%H%M%S%3f").to_string();

        let log_file = log_directory.join(&config.log_file_name);
        let archived_log_pattern = format!(
            "{}/{}-{{}}-{}.gz",
            log_directory.display(),
            config.log_file_name,
            formatted_time
        );

        let size_trigger = SizeBasedTriggerPolicy::new(config.max_file_size);
        let roller = FixedWindowRoller::builder().build(&archived_log_pattern, config.max_zip_count)?;
        let compound_policy = CompoundPolicy::new(Box::new(size_trigger), Box::new(roller));

        let appender = RollingFileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
            .build(log_file, Box::new(compound_policy))?;

        Ok(appender)
    }

    fn parse_level(level: &str) -> LevelFilter {
        match level.to_lowercase().as_str() {
            "trace" => LevelFilter::Trace,
            "debug" => LevelFilter::Debug,
            "info" => LevelFilter::Info,
            "warn" => LevelFilter::Warn,
            "error" => LevelFilter::Error,
            "off" => LevelFilter::Off,
            _ => LevelFilter::Info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logger_config(path_prefix: &str, log_directory: &str, console: bool) -> LoggerConfig {
        LoggerConfig {
            path_prefix: path_prefix.to_string(),
            log_directory: log_directory.to_string(),
            log_file_name: "worker.log".to_string(),
            max_file_size: 1024,
            max_zip_count: 2,
            level: "debug".to_string(),
            console,
        }
    }

    #[test]
    fn test_build_config_creates_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let config = LogConfig { loggers: vec![logger_config("root", log_dir.to_str().unwrap(), true)] };

        let built = Logger::build_config(&config).unwrap();
        assert_eq!(built.appenders().len(), 2);
        assert_eq!(built.root().level(), LevelFilter::Debug);
        assert!(log_dir.join("worker.log").exists());
    }

    #[test]
    fn test_module_logger_without_appender_forwards_to_root() {
        let config = LogConfig { loggers: vec![logger_config("schedule_job", "", false)] };

        let built = Logger::build_config(&config).unwrap();
        let logger = &built.loggers()[0];
        assert_eq!(logger.name(), "schedule_job");
        assert!(logger.additive());
        assert_eq!(built.root().appenders(), ["root_console".to_string()]);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(Logger::parse_level("WARN"), LevelFilter::Warn);
        assert_eq!(Logger::parse_level("verbose"), LevelFilter::Info);
    }
}
