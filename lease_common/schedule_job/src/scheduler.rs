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

use crate::error::JobError;
use crate::trigger::Trigger;
use chrono::{DateTime, Local, Utc};
use futures::FutureExt;
use log::{debug, error, info, warn};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval_at, sleep, Instant, Interval, MissedTickBehavior};

pub struct SchedulerBuilders {
    schedulers: Vec<SingleTaskScheduler>,
}

impl SchedulerBuilders {
    pub fn new() -> Self {
        Self { schedulers: Vec::new() }
    }

    pub fn add(&mut self, config: SchedulerConfig, task: BoxedTask) {
        let scheduler = SingleTaskScheduler::new(config, task);
        self.schedulers.push(scheduler);
    }

    pub async fn start_all(&self) -> Result<(), JobError> {
        for scheduler in self.schedulers.iter() {
            scheduler.start().await?;
        }
        Ok(())
    }

    /// Stops every scheduler and waits for their in-flight firings to finish.
    pub async fn stop_all(&self) {
        for scheduler in self.schedulers.iter() {
            scheduler.stop().await;
        }
    }
}

impl Default for SchedulerBuilders {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration of one periodic task.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Task name (used for logging)
    pub name: String,
    /// When the task fires
    pub trigger: Option<Trigger>,
    /// Maximum number of firings of this task running at once in this process
    pub max_queue_size: usize,
    /// Whether the task is scheduled at all
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { name: "unnamed_task".to_string(), trigger: None, max_queue_size: 1, enabled: true }
    }
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name of the task for identification in logs.
    ///
    /// # Arguments
    ///
    /// * `name` - Name to identify the task in logs and diagnostics
    ///
    /// # Returns
    ///
    /// Self for method chaining
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Fires the task every `time` seconds, on multiples of the interval.
    ///
    /// # Arguments
    /// - `time`: The interval. The unit is second.
    ///
    /// # Returns
    /// Result containing Self for method chaining, or an error if the interval is zero
    pub fn intervals(self, time: u64) -> Result<Self, JobError> {
        self.every(Duration::from_secs(time))
    }

    /// Fires the task every `period`, on multiples of the period.
    pub fn every(mut self, period: Duration) -> Result<Self, JobError> {
        self.trigger = Some(Trigger::every(period)?);
        Ok(self)
    }

    /// Fires the task on a cron schedule with a seconds field.
    ///
    /// # Arguments
    ///
    /// * `expr` - Cron expression such as `*/10 * * * * *`
    ///
    /// # Returns
    ///
    /// Result containing Self for method chaining, or an error if the expression does not parse
    pub fn cron(mut self, expr: &str) -> Result<Self, JobError> {
        self.trigger = Some(Trigger::cron(expr)?);
        Ok(self)
    }

    /// Set the maximum number of concurrent firings
    ///
    /// # Arguments
    ///
    /// * `size` - Maximum queue size (must be greater than zero)
    ///
    /// # Returns
    ///
    /// Result containing Self for method chaining, or an error if size is invalid
    pub fn max_queue_size(mut self, size: usize) -> Result<Self, JobError> {
        if size == 0 {
            return Err(JobError::ConfigError("Maximum queue size cannot be zero, must be at least 1".to_string()));
        }

        self.max_queue_size = size;
        Ok(self)
    }

    /// Enables or disables scheduled task
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Represents the current state of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SchedulerState {
    /// Scheduler has been created but not started or has been stopped
    Idle,
    /// Scheduler is waiting for or executing firings
    Running,
    /// Scheduler is in the process of stopping
    Stopping,
}

/// Task function type for internal representation
pub type BoxedTask = Box<dyn Fn() -> Pin<Box<dyn Future<Output = Result<(), JobError>> + Send>> + Send + Sync>;

/// Wraps an async closure into a [`BoxedTask`].
pub fn boxed_task<F, Fut>(task: F) -> BoxedTask
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    Box::new(move || Box::pin(task()))
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic payload"
    }
}

/// Result type for waiting operations
#[derive(Debug)]
enum WaitResult {
    /// Time to execute the task
    TimeToExecute,
    /// Stop command received
    StopRequested,
}

/// Source of firing times for one running scheduler.
///
/// Interval triggers use a tokio interval whose first tick lands on the next
/// wall-clock boundary; cron triggers recompute the next time after each firing.
enum Ticks {
    Interval(Interval),
    Cron { trigger: Trigger, last_fired: Option<DateTime<Utc>> },
}

impl Ticks {
    fn new(trigger: &Trigger) -> Result<Self, JobError> {
        match trigger {
            Trigger::Interval(period) => {
                let first = trigger
                    .delay_from(Utc::now())
                    .ok_or_else(|| JobError::ConfigError("Trigger has no next firing time".to_string()))?;
                let mut interval = interval_at(Instant::now() + first, *period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                Ok(Ticks::Interval(interval))
            },
            Trigger::Cron(_) => Ok(Ticks::Cron { trigger: trigger.clone(), last_fired: None }),
        }
    }

    async fn next(&mut self) -> Result<(), JobError> {
        match self {
            Ticks::Interval(interval) => {
                interval.tick().await;
                Ok(())
            },
            Ticks::Cron { trigger, last_fired } => {
                let now = Utc::now();
                let from = match *last_fired {
                    Some(last) if last > now => last,
                    _ => now,
                };
                let next = trigger
                    .next_after(from)
                    .ok_or_else(|| JobError::ConfigError("Cron schedule has no upcoming firing".to_string()))?;
                debug!("The next trigger time for the scheduled task is: {}", next.with_timezone(&Local));
                sleep((next - now).to_std().unwrap_or(Duration::ZERO)).await;
                *last_fired = Some(next);
                Ok(())
            },
        }
    }
}

/// Single-task scheduler for periodic task execution.
///
/// Every firing runs on its own tokio task, so a body that outlasts the period
/// does not shift the cadence. At most `max_queue_size` firings run at once;
/// firings beyond that are skipped.
struct SingleTaskScheduler {
    /// Task configuration
    config: SchedulerConfig,
    /// The task function to execute
    task: Arc<BoxedTask>,
    /// Current scheduler state
    state: Arc<Mutex<SchedulerState>>,
    /// Command sender channel
    tx: mpsc::Sender<()>,
    /// Command receiver channel
    rx: Arc<Mutex<mpsc::Receiver<()>>>,
    /// Current number of firings in flight
    queue_size: Arc<Mutex<usize>>,
}

impl SingleTaskScheduler {
    fn new(config: SchedulerConfig, task: BoxedTask) -> Self {
        let (tx, rx) = mpsc::channel(3);

        Self {
            config,
            task: Arc::new(task),
            state: Arc::new(Mutex::new(SchedulerState::Idle)),
            tx,
            rx: Arc::new(Mutex::new(rx)),
            queue_size: Arc::new(Mutex::new(0)),
        }
    }

    /// Starts the scheduler.
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - No trigger has been configured
    /// - The scheduler is already running
    async fn start(&self) -> Result<(), JobError> {
        let ticks = self.validate_scheduler().await?;

        let mut state = self.state.lock().await;
        *state = SchedulerState::Running;
        drop(state);

        // A stop command sent while the previous run was already leaving its loop is stale.
        let mut rx_guard = self.rx.lock().await;
        while rx_guard.try_recv().is_ok() {}
        drop(rx_guard);

        let task = Arc::clone(&self.task);
        let config = self.config.clone();
        let state = Arc::clone(&self.state);
        let rx = Arc::clone(&self.rx);
        let queue_size = Arc::clone(&self.queue_size);

        tokio::spawn(async move {
            if config.enabled {
                Self::handle_scheduled_execution(task, config, ticks, state, rx, queue_size).await;
            } else {
                Self::finish_execution(&state, &config.name).await;
                info!("The {} task is not scheduled to run periodically", config.name);
            }
        });

        Ok(())
    }

    async fn validate_scheduler(&self) -> Result<Ticks, JobError> {
        let trigger = self
            .config
            .trigger
            .as_ref()
            .ok_or_else(|| JobError::ConfigError(format!("Trigger must be set for task '{}'", self.config.name)))?;

        let state = self.state.lock().await;
        if *state != SchedulerState::Idle {
            return Err(JobError::StateError(format!("Scheduler is already in state: {:?}", *state)));
        }

        Ticks::new(trigger)
    }

    async fn handle_scheduled_execution(
        task: Arc<BoxedTask>,
        config: SchedulerConfig,
        mut ticks: Ticks,
        state: Arc<Mutex<SchedulerState>>,
        rx: Arc<Mutex<mpsc::Receiver<()>>>,
        queue_size: Arc<Mutex<usize>>,
    ) {
        info!("Starting scheduled execution of task '{}' {:?}", config.name, config.trigger);

        while !Self::should_stop(&state).await {
            match Self::wait_with_cancellation(&mut ticks, &rx).await {
                Ok(WaitResult::TimeToExecute) => Self::process_task_execution(&task, &config, &queue_size).await,
                Ok(WaitResult::StopRequested) => {
                    info!("Received stop command for task: {}", config.name);
                    break;
                },
                Err(e) => {
                    error!("Scheduling error for task '{}': {}", config.name, e);
                    break;
                },
            }
        }

        Self::drain_in_flight(&config.name, &queue_size).await;
        Self::finish_execution(&state, &config.name).await;
    }

    async fn should_stop(state: &Arc<Mutex<SchedulerState>>) -> bool {
        *state.lock().await == SchedulerState::Stopping
    }

    async fn finish_execution(state: &Arc<Mutex<SchedulerState>>, task_name: &str) {
        *state.lock().await = SchedulerState::Idle;
        info!("Scheduled execution stopped for task: {}", task_name);
    }

    async fn drain_in_flight(task_name: &str, queue_size: &Arc<Mutex<usize>>) {
        loop {
            let in_flight = *queue_size.lock().await;
            if in_flight == 0 {
                break;
            }
            debug!("Waiting for {} in-flight firing(s) of task '{}'", in_flight, task_name);
            sleep(Duration::from_millis(10)).await;
        }
    }

    async fn wait_with_cancellation(
        ticks: &mut Ticks,
        rx: &Arc<Mutex<mpsc::Receiver<()>>>,
    ) -> Result<WaitResult, JobError> {
        let mut rx_guard = rx.lock().await;

        select! {
            tick = ticks.next() => tick.map(|_| WaitResult::TimeToExecute),
            cmd = rx_guard.recv() => match cmd {
                Some(_) => Ok(WaitResult::StopRequested),
                None => {
                    error!("Command channel closed unexpectedly, all senders have been dropped");
                    Err(JobError::StateError("Command channel closed unexpectedly".to_string()))
                }
            }
        }
    }

    async fn process_task_execution(task: &Arc<BoxedTask>, config: &SchedulerConfig, queue_size: &Arc<Mutex<usize>>) {
        let now = Local::now();

        {
            let mut queue = queue_size.lock().await;
            if *queue >= config.max_queue_size {
                warn!("Queue full for task '{}' (size: {}), skipping firing at {}", config.name, *queue, now);
                return;
            }
            *queue += 1;
            debug!("Adding firing to queue for '{}' (new queue size: {})", config.name, *queue);
        }

        debug!("Firing scheduled task: {} at {}", config.name, now);

        let task = Arc::clone(task);
        let name = config.name.clone();
        let queue_size = Arc::clone(queue_size);
        tokio::spawn(async move {
            let result = Self::execute_task(&task).await;

            {
                let mut queue = queue_size.lock().await;
                *queue = queue.saturating_sub(1);
                debug!("Firing completed for '{}' (queue size: {})", name, *queue);
            }

            if let Err(e) = result {
                error!("Task execution failed: {} - {}", name, e);
            }
        });
    }

    /// Runs one firing. A panicking body is reported as a failed execution so
    /// the in-flight count is always given back.
    async fn execute_task(task: &Arc<BoxedTask>) -> Result<(), JobError> {
        let task = Arc::clone(task);
        match AssertUnwindSafe(async move { task().await }).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(JobError::ExecutionError(format!("task panicked: {}", panic_message(panic.as_ref())))),
        }
    }

    /// Stops the scheduler.
    ///
    /// Sends a stop command and waits until the scheduling loop has left and
    /// every in-flight firing has completed, so their leases are released
    /// before this returns.
    async fn stop(&self) {
        let mut state = self.state.lock().await;
        if *state != SchedulerState::Running {
            return;
        }

        *state = SchedulerState::Stopping;
        drop(state);

        if let Err(e) = self.tx.send(()).await {
            debug!("Failed to send stop command: {}", e);
        }

        loop {
            let state = self.state.lock().await;
            if *state == SchedulerState::Idle {
                break;
            }
            drop(state);
            sleep(Duration::from_millis(10)).await;
        }
    }

    #[cfg(test)]
    async fn state(&self) -> SchedulerState {
        *self.state.lock().await
    }
}
