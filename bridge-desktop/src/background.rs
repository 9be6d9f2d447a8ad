//! Background Task Execution Implementation

use async_trait::async_trait;
use bridge_traits::{
    background::{BackgroundExecutor, TaskConstraints, TaskId, TaskStatus},
    error::{BridgeError, Result},
    time::{Clock, SystemClock},
};
use futures_util::{future::BoxFuture, FutureExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

type TaskHandler = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Probe used to decide whether network-constrained tasks may run.
pub type ConnectivityCheck = Arc<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>;

/// Tokio-based background executor for desktop.
pub struct TokioBackgroundExecutor {
    tasks: Arc<RwLock<HashMap<TaskId, TaskInfo>>>,
    handlers: Arc<RwLock<HashMap<String, TaskHandler>>>,
    connectivity: Option<ConnectivityCheck>,
    clock: Arc<dyn Clock>,
}

struct TaskInfo {
    status: TaskStatus,
    handle: Option<JoinHandle<()>>,
    cancel: CancellationToken,
    last_run: Option<i64>,
}

struct RecurringRun {
    tasks: Arc<RwLock<HashMap<TaskId, TaskInfo>>>,
    id: TaskId,
    handler: TaskHandler,
    period: Duration,
    constraints: TaskConstraints,
    cancel: CancellationToken,
    connectivity: Option<ConnectivityCheck>,
    clock: Arc<dyn Clock>,
}

impl TokioBackgroundExecutor {
    /// Create a new background executor that assumes the network is up.
    pub fn new() -> Self {
        Self::with_connectivity_and_clock(None, Arc::new(SystemClock))
    }

    /// Create a background executor that consults `check` before
    /// network-constrained runs.
    pub fn with_connectivity_check(check: ConnectivityCheck) -> Self {
        Self::with_connectivity_and_clock(Some(check), Arc::new(SystemClock))
    }

    pub fn with_connectivity_and_clock(
        connectivity: Option<ConnectivityCheck>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            handlers: Arc::new(RwLock::new(HashMap::new())),
            connectivity,
            clock,
        }
    }

    /// Register a handler that will be invoked when the task executes.
    pub async fn register_task_handler<F, Fut>(&self, task_id: &str, handler: F) -> Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        let mut handlers = self.handlers.write().await;
        handlers.insert(task_id.to_string(), Arc::new(move || handler().boxed()));
        Ok(())
    }

    /// Unix millis of the last finished run, if any.
    pub async fn last_run(&self, task_id: &TaskId) -> Option<i64> {
        let tasks = self.tasks.read().await;
        tasks.get(task_id).and_then(|info| info.last_run)
    }

    async fn handler_for(&self, task_id: &str) -> Option<TaskHandler> {
        let handlers = self.handlers.read().await;
        handlers.get(task_id).cloned()
    }

    async fn constraints_satisfied(
        connectivity: Option<&ConnectivityCheck>,
        constraints: &TaskConstraints,
    ) -> bool {
        if !(constraints.requires_network || constraints.requires_unmetered) {
            return true;
        }

        match connectivity {
            Some(check) => check().await,
            None => true,
        }
    }

    async fn set_status(
        tasks: &RwLock<HashMap<TaskId, TaskInfo>>,
        id: &TaskId,
        status: TaskStatus,
        finished_at: Option<i64>,
    ) {
        let mut tasks = tasks.write().await;
        if let Some(info) = tasks.get_mut(id) {
            info.status = status;
            if finished_at.is_some() {
                info.last_run = finished_at;
            }
        }
    }

    async fn run_recurring_task(run: RecurringRun) {
        let mut ticker = tokio::time::interval(run.period);
        loop {
            tokio::select! {
                _ = run.cancel.cancelled() => {
                    Self::set_status(&run.tasks, &run.id, TaskStatus::Cancelled, None).await;
                    break;
                }
                _ = ticker.tick() => {
                    if !Self::constraints_satisfied(run.connectivity.as_ref(), &run.constraints).await {
                        debug!(task_id = %run.id.0, "Constraints not satisfied; skipping run");
                        continue;
                    }

                    Self::set_status(&run.tasks, &run.id, TaskStatus::Running, None).await;

                    let status = match (run.handler)().await {
                        Ok(()) => TaskStatus::Completed,
                        Err(err) => {
                            warn!(task_id = %run.id.0, error = %err, "Recurring task failed");
                            TaskStatus::Failed
                        }
                    };

                    let now = run.clock.unix_timestamp_millis();
                    Self::set_status(&run.tasks, &run.id, status, Some(now)).await;
                }
            }
        }
    }
}

impl Default for TokioBackgroundExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackgroundExecutor for TokioBackgroundExecutor {
    async fn schedule_task(
        &self,
        task_id: &str,
        interval: Duration,
        constraints: TaskConstraints,
    ) -> Result<TaskId> {
        let id = TaskId::new(task_id);

        debug!(
            task_id = task_id,
            interval_secs = interval.as_secs(),
            "Scheduling recurring task"
        );

        let handler = self.handler_for(task_id).await.ok_or_else(|| {
            BridgeError::OperationFailed(format!("No handler registered for task: {}", task_id))
        })?;

        let cancel = CancellationToken::new();
        let mut tasks = self.tasks.write().await;

        // Rescheduling replaces the previous loop
        if let Some(mut previous) = tasks.remove(&id) {
            previous.cancel.cancel();
            if let Some(handle) = previous.handle.take() {
                handle.abort();
            }
        }

        let run = RecurringRun {
            tasks: Arc::clone(&self.tasks),
            id: id.clone(),
            handler,
            period: interval,
            constraints,
            cancel: cancel.clone(),
            connectivity: self.connectivity.clone(),
            clock: Arc::clone(&self.clock),
        };

        // The write guard is held until the entry exists, so the spawned loop
        // can never observe a missing task.
        let handle = tokio::spawn(Self::run_recurring_task(run));
        tasks.insert(
            id.clone(),
            TaskInfo {
                status: TaskStatus::Scheduled,
                handle: Some(handle),
                cancel,
                last_run: None,
            },
        );

        Ok(id)
    }

    async fn cancel_task(&self, task_id: &TaskId) -> Result<()> {
        debug!(task_id = ?task_id, "Cancelling task");

        let removed = {
            let mut tasks = self.tasks.write().await;
            tasks.remove(task_id)
        };

        match removed {
            Some(mut info) => {
                info.cancel.cancel();
                if let Some(handle) = info.handle.take() {
                    handle.abort();
                }
                Ok(())
            }
            None => Err(BridgeError::OperationFailed(format!(
                "Task not found: {:?}",
                task_id
            ))),
        }
    }

    async fn get_task_status(&self, task_id: &TaskId) -> Result<TaskStatus> {
        let tasks = self.tasks.read().await;
        tasks
            .get(task_id)
            .map(|info| info.status.clone())
            .ok_or_else(|| BridgeError::OperationFailed(format!("Task not found: {:?}", task_id)))
    }

    async fn list_tasks(&self) -> Result<Vec<TaskId>> {
        let tasks = self.tasks.read().await;
        Ok(tasks.keys().cloned().collect())
    }
}
