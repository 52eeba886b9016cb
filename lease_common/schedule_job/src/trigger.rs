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
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use cron::Schedule;

use crate::error::JobError;

/// When a scheduled task fires.
///
/// Both variants are anchored to the wall clock, so instances whose clocks agree
/// fire at the same moments without talking to each other.
#[derive(Clone)]
pub enum Trigger {
    /// Every `period`, on multiples of the period since the Unix epoch
    Interval(Duration),
    /// Cron expression with a seconds field, e.g. `*/10 * * * * *`
    Cron(Box<Schedule>),
}

impl Trigger {
    pub fn every(period: Duration) -> Result<Self, JobError> {
        if period < Duration::from_millis(1) {
            return Err(JobError::ConfigError("Trigger period must be at least 1ms".to_string()));
        }
        Ok(Trigger::Interval(period))
    }

    pub fn cron(expr: &str) -> Result<Self, JobError> {
        let schedule = Schedule::from_str(expr)
            .map_err(|e| JobError::ConfigError(format!("Invalid cron expression '{}': {}", expr, e)))?;
        Ok(Trigger::Cron(Box::new(schedule)))
    }

    /// Next firing strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Trigger::Interval(period) => {
                let period_ms = period.as_millis() as i64;
                if period_ms <= 0 {
                    return None;
                }
                let now_ms = after.timestamp_millis();
                let next_ms = (now_ms.div_euclid(period_ms) + 1) * period_ms;
                Utc.timestamp_millis_opt(next_ms).single()
            },
            Trigger::Cron(schedule) => schedule.after(&after).next(),
        }
    }

    /// Time to wait from `now` until the next firing.
    pub fn delay_from(&self, now: DateTime<Utc>) -> Option<Duration> {
        let next = self.next_after(now)?;
        Some((next - now).to_std().unwrap_or(Duration::ZERO))
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Interval(period) => write!(f, "every {:?}", period),
            Trigger::Cron(schedule) => write!(f, "cron '{}'", schedule),
        }
    }
}
