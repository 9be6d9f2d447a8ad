//! Background Task Scheduling
//!
//! Recurring work such as chapter prefetch runs outside any user action. The
//! host decides how that maps onto the platform (BGTaskScheduler, WorkManager,
//! a tokio interval on desktop).

use std::time::Duration;

use crate::{error::Result, platform::PlatformSendSync};

/// Task execution constraints
#[derive(Debug, Clone)]
pub struct TaskConstraints {
    /// Require any network connection
    pub requires_network: bool,
    /// Require an unmetered connection
    pub requires_unmetered: bool,
}

impl Default for TaskConstraints {
    fn default() -> Self {
        Self {
            requires_network: true,
            requires_unmetered: false,
        }
    }
}

/// Scheduled task identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// Task execution status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Task is scheduled but has not run yet
    Scheduled,
    /// Task is currently executing
    Running,
    /// Last run completed successfully
    Completed,
    /// Last run failed
    Failed,
    /// Task was cancelled
    Cancelled,
}

/// Background task executor trait
///
/// Each task id must have a handler registered with the concrete executor
/// before it can be scheduled.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::background::{BackgroundExecutor, TaskConstraints};
/// use std::time::Duration;
///
/// async fn schedule_prefetch(executor: &dyn BackgroundExecutor) -> Result<()> {
///     executor
///         .schedule_task("chapter_prefetch", Duration::from_secs(900), TaskConstraints::default())
///         .await?;
///     Ok(())
/// }
/// ```
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait BackgroundExecutor: PlatformSendSync {
    /// Schedule a recurring task
    ///
    /// The first run happens immediately, then once per `interval`.
    async fn schedule_task(
        &self,
        task_id: &str,
        interval: Duration,
        constraints: TaskConstraints,
    ) -> Result<TaskId>;

    /// Cancel a scheduled task
    async fn cancel_task(&self, task_id: &TaskId) -> Result<()>;

    /// Get status of a task
    async fn get_task_status(&self, task_id: &TaskId) -> Result<TaskStatus>;

    /// List all scheduled tasks
    async fn list_tasks(&self) -> Result<Vec<TaskId>>;
}
