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

//! Periodic task scheduling, with a runner that lets only the lease holder
//! among all instances execute a firing

pub mod error;
pub mod runner;
pub mod scheduler;
pub mod trigger;

pub use error::JobError;
pub use runner::{FiringOutcome, ScheduledTaskRunner};
pub use scheduler::{boxed_task, BoxedTask, SchedulerBuilders, SchedulerConfig, SchedulerState};
pub use trigger::Trigger;
