//! Cooperative single-loop scheduler for recurring maintenance tasks.
//!
//! Tasks sit in one queue ordered by due instant, then priority, then insertion
//! order. Exactly one task body runs at a time and every task is queued again
//! after each run, whether it succeeded or not.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ecumene_core::AppResult;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info};

mod tasks;


pub use tasks::{CleanAdminCacheTask, RefreshTokensTask, SweepAuditTask};

/// Rank used to order tasks due at the same instant; lower runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TaskPriority(pub u8);

impl TaskPriority {
    /// Rank of the token refresh pass.
    pub const REFRESH: Self = Self(0);
    /// Rank of the credential cleanup pass.
    pub const CLEANUP: Self = Self(1);
    /// Rank of the audit staleness sweep.
    pub const AUDIT_SWEEP: Self = Self(2);
}

/// One recurring unit of work.
#[async_trait]
pub trait ScheduledTask: Send + Sync {
    /// Stable task name used in logs.
    fn name(&self) -> &'static str;

    /// Tie-break rank for tasks due at the same instant.
    fn priority(&self) -> TaskPriority;

    /// Runs the task body and returns the delay before its next run.
    async fn run(&self) -> AppResult<Duration>;

    /// Delay before the next run after the body failed.
    fn retry_delay(&self) -> Duration;
}

/// Outcome of one executed task body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRun {
    /// Task name.
    pub name: &'static str,
    /// Whether the body returned without error.
    pub succeeded: bool,
    /// Delay until the task runs again.
    pub next_delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct QueueEntry {
    due: Instant,
    priority: TaskPriority,
    sequence: u64,
    slot: usize,
}

/// Priority-queue driven scheduler.
#[derive(Default)]
pub struct Scheduler {
    tasks: Vec<Arc<dyn ScheduledTask>>,
    queue: BinaryHeap<Reverse<QueueEntry>>,
    next_sequence: u64,
}

impl Scheduler {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a task with its first run at `first_run`.
    pub fn schedule(&mut self, task: Arc<dyn ScheduledTask>, first_run: Instant) {
        let slot = self.tasks.len();
        debug!(task = task.name(), "registered scheduled task");
        self.tasks.push(task);
        self.enqueue(slot, first_run);
    }

    /// Registers a task to run as soon as the loop starts.
    pub fn schedule_now(&mut self, task: Arc<dyn ScheduledTask>) {
        self.schedule(task, Instant::now());
    }

    /// Returns the instant the next task is due, if any task is registered.
    #[must_use]
    pub fn next_due(&self) -> Option<Instant> {
        self.queue.peek().map(|Reverse(entry)| entry.due)
    }

    /// Sleeps until the next task is due and runs it.
    pub async fn run_next(&mut self) -> Option<TaskRun> {
        let due = self.next_due()?;
        sleep_until(due).await;
        self.run_due().await
    }

    /// Runs tasks until `shutdown` resolves.
    ///
    /// Shutdown is only observed between task bodies; a running body always
    /// finishes before the loop returns.
    pub async fn run_until<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(tasks = self.tasks.len(), "scheduler started");

        while let Some(due) = self.next_due() {
            tokio::select! {
                () = &mut shutdown => break,
                () = sleep_until(due) => {}
            }
            self.run_due().await;
        }

        info!("scheduler stopped");
    }

    async fn run_due(&mut self) -> Option<TaskRun> {
        let Reverse(entry) = self.queue.pop()?;
        let task = self.tasks.get(entry.slot)?.clone();

        let started = Instant::now();
        let (succeeded, next_delay) = match task.run().await {
            Ok(delay) => (true, delay),
            Err(failure) => {
                error!(
                    task = task.name(),
                    error = %failure,
                    "scheduled task failed"
                );
                (false, task.retry_delay())
            }
        };

        self.enqueue(entry.slot, Instant::now() + next_delay);
        debug!(
            task = task.name(),
            succeeded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            next_delay_secs = next_delay.as_secs(),
            "rescheduled task"
        );

        Some(TaskRun {
            name: task.name(),
            succeeded,
            next_delay,
        })
    }

    fn enqueue(&mut self, slot: usize, due: Instant) {
        let Some(task) = self.tasks.get(slot) else {
            return;
        };
        let entry = QueueEntry {
            due,
            priority: task.priority(),
            sequence: self.next_sequence,
            slot,
        };
        self.next_sequence += 1;
        self.queue.push(Reverse(entry));
    }
}
