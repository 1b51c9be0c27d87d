use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;

use chrono::Utc;
use dashmap::DashMap;
use futures::FutureExt;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::errors::HeraldError;
use crate::queue::JobQueue;
use crate::skills::{Skill, SkillRegistry, SkillResult};
use crate::store::{AgentStore, InMemoryStore};
use crate::task::{ExecutionMetrics, Task, TaskResult, TaskSpec};
use super::events::{panic_message, EventBus, ListenerId, RunnerEvent};
use super::metrics::{compute_metrics, AgentMetrics};
use super::state::{AgentConfig, AgentState, AgentStatus, RunnerOptions};

/// How a single skill invocation settled.
enum Outcome {
    Succeeded(SkillResult),
    Cancelled(String),
    Failed(HeraldError),
}

/// Removes a task from the running set when its execution settles, even on panic.
struct RunningGuard<'a> {
    running: &'a DashMap<String, CancellationToken>,
    task_id: String,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.running.remove(&self.task_id);
    }
}

struct RunnerInner {
    config: AgentConfig,
    options: RunnerOptions,
    registry: SkillRegistry,
    store: Arc<dyn AgentStore>,
    queue: Arc<JobQueue>,
    state: RwLock<AgentState>,
    running: DashMap<String, CancellationToken>,
    tracker: TaskTracker,
    shutdown: StdMutex<CancellationToken>,
    // Held across every move between the queue and the running set so idle checks never see a task in neither place.
    admission: StdMutex<()>,
    // Serializes snapshot-and-save so an older snapshot never lands after a newer one.
    state_writes: Mutex<()>,
    sequence: AtomicU64,
    events: EventBus,
}

/// Coordinates task lifecycle for a single agent: lifecycle control, the
/// bounded-concurrency dispatch loop, timeouts, retries, metrics and events.
pub struct AgentRunner {
    inner: Arc<RunnerInner>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl AgentRunner {
    pub fn new(
        config: AgentConfig,
        registry: SkillRegistry,
        store: Arc<dyn AgentStore>,
        queue: Arc<JobQueue>,
        options: RunnerOptions,
    ) -> Result<Self, HeraldError> {
        config.validate()?;

        for task_type in &config.skills {
            if !registry.contains(*task_type) {
                warn!(agent_id = %config.id, task_type = %task_type, "Configured skill has no registered implementation");
            }
        }

        info!(
            agent_id = %config.id,
            skills = registry.len(),
            max_concurrent = config.max_concurrent_tasks,
            store = store.backend_name(),
            "Agent runner created"
        );

        let state = AgentState::new(&config.id);
        Ok(Self {
            inner: Arc::new(RunnerInner {
                config,
                options,
                registry,
                store,
                queue,
                state: RwLock::new(state),
                running: DashMap::new(),
                tracker: TaskTracker::new(),
                shutdown: StdMutex::new(CancellationToken::new()),
                admission: StdMutex::new(()),
                state_writes: Mutex::new(()),
                sequence: AtomicU64::new(1),
                events: EventBus::new(),
            }),
            loop_handle: Mutex::new(None),
        })
    }

    /// Runner with a fresh queue, an in-memory store and default options.
    pub fn in_memory(config: AgentConfig, registry: SkillRegistry) -> Result<Self, HeraldError> {
        Self::new(
            config,
            registry,
            Arc::new(InMemoryStore::new()),
            Arc::new(JobQueue::new()),
            RunnerOptions::default(),
        )
    }

    /// Forward every runner event into a channel, e.g. for a CLI progress printer.
    pub fn with_event_channel(self, tx: mpsc::UnboundedSender<RunnerEvent>) -> Self {
        self.inner.events.subscribe_channel(tx);
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.inner.config
    }

    pub async fn start(&self) -> Result<(), HeraldError> {
        {
            let mut state = self.inner.state.write().await;
            if matches!(state.status, AgentStatus::Running | AgentStatus::Paused) {
                return Err(HeraldError::AlreadyRunning);
            }
            state.status = AgentStatus::Running;
            state.touch();
        }

        let shutdown = CancellationToken::new();
        *self.inner.lock_shutdown() = shutdown.clone();
        self.inner.tracker.reopen();

        self.inner.persist_state().await;
        self.inner.events.emit(RunnerEvent::Started);
        info!(agent_id = %self.inner.config.id, "Agent runner started");

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            let result = AssertUnwindSafe(inner.clone().dispatch_loop(shutdown))
                .catch_unwind()
                .await;
            if let Err(panic) = result {
                inner.fault(panic_message(&*panic)).await;
            }
        });
        *self.loop_handle.lock().await = Some(handle);
        Ok(())
    }

    /// Stop dispatching and wait for every in-flight execution to settle.
    /// Queued tasks stay queued. A faulted runner is drained the same way.
    pub async fn stop(&self) -> Result<(), HeraldError> {
        {
            let mut state = self.inner.state.write().await;
            if !matches!(state.status, AgentStatus::Running | AgentStatus::Paused | AgentStatus::Error) {
                debug!(agent_id = %self.inner.config.id, status = %state.status, "Stop requested while not running");
                return Ok(());
            }
            state.status = AgentStatus::Stopped;
            state.touch();
        }

        self.inner.lock_shutdown().cancel();
        let handle = self.loop_handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(agent_id = %self.inner.config.id, error = %e, "Dispatch loop ended abnormally");
            }
        }

        let in_flight = self.inner.tracker.len();
        if in_flight > 0 {
            info!(agent_id = %self.inner.config.id, in_flight, "Draining in-flight tasks");
        }
        self.inner.tracker.close();
        self.inner.tracker.wait().await;

        {
            let mut state = self.inner.state.write().await;
            state.current_task = None;
            state.touch();
        }
        self.inner.persist_state().await;
        self.inner.events.emit(RunnerEvent::Stopped);
        info!(agent_id = %self.inner.config.id, pending = self.inner.queue.size(), "Agent runner stopped");
        Ok(())
    }

    pub async fn pause(&self) -> Result<(), HeraldError> {
        {
            let mut state = self.inner.state.write().await;
            if state.status != AgentStatus::Running {
                return Err(HeraldError::NotRunning);
            }
            state.status = AgentStatus::Paused;
            state.touch();
        }
        self.inner.persist_state().await;
        self.inner.events.emit(RunnerEvent::Paused);
        info!(agent_id = %self.inner.config.id, "Agent runner paused");
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), HeraldError> {
        {
            let mut state = self.inner.state.write().await;
            if state.status != AgentStatus::Paused {
                return Err(HeraldError::NotPaused);
            }
            state.status = AgentStatus::Running;
            state.touch();
        }
        self.inner.persist_state().await;
        self.inner.events.emit(RunnerEvent::Resumed);
        info!(agent_id = %self.inner.config.id, "Agent runner resumed");
        Ok(())
    }

    /// Queue a new task and return its id. Accepted in any runner state.
    pub async fn add_task(&self, spec: TaskSpec) -> String {
        let sequence = self.inner.sequence.fetch_add(1, Ordering::SeqCst);
        let task = Task::from_spec(spec, &self.inner.config.id, sequence, self.inner.config.retry_attempts);
        let id = task.id.clone();

        self.inner.persist_task(&task).await;
        debug!(
            task_id = %id,
            task_type = %task.task_type,
            priority = %task.priority,
            "Task queued"
        );
        self.inner.queue.add(task);
        id
    }

    pub async fn get_state(&self) -> AgentState {
        self.inner.state.read().await.clone()
    }

    pub async fn get_metrics(&self) -> AgentMetrics {
        let state = self.inner.state.read().await;
        compute_metrics(&state.completed_tasks, &state.failed_tasks, state.created_at, Utc::now())
    }

    /// Cancel a queued or running task. Returns false when the id is unknown
    /// or the task has already settled.
    pub async fn cancel_task(&self, task_id: &str) -> bool {
        if let Some(mut task) = self.inner.queue.remove(task_id) {
            if let Err(e) = task.mark_cancelled("Cancelled before execution".to_string()) {
                warn!(task_id, error = %e, "Queued task could not be cancelled");
                return false;
            }
            self.inner.persist_task(&task).await;
            info!(task_id, "Queued task cancelled");
            self.inner.events.emit(RunnerEvent::TaskCancelled(task));
            return true;
        }

        if let Some(token) = self.inner.running.get(task_id) {
            token.cancel();
            info!(task_id, "Cancellation requested for running task");
            return true;
        }

        false
    }

    /// Restore persisted state for this agent and requeue every task that
    /// had not settled when the previous process exited.
    pub async fn recover(&self) -> Result<usize, HeraldError> {
        let agent_id = self.inner.config.id.clone();

        if let Some(saved) = self.inner.store.load_state(&agent_id).await? {
            let mut state = self.inner.state.write().await;
            state.created_at = saved.created_at;
            state.completed_tasks = saved.completed_tasks;
            state.failed_tasks = saved.failed_tasks;
            state.metadata = saved.metadata;
            state.touch();
        }

        let tasks = self.inner.store.load_tasks_by_agent(&agent_id).await?;
        if let Some(max_seq) = tasks.iter().map(|t| t.sequence).max() {
            self.inner.sequence.fetch_max(max_seq + 1, Ordering::SeqCst);
        }

        let mut requeued = 0;
        for mut task in tasks {
            if task.is_terminal()
                || self.inner.queue.contains(&task.id)
                || self.inner.running.contains_key(&task.id)
            {
                continue;
            }
            task.reset_for_recovery();
            self.inner.persist_task(&task).await;
            self.inner.queue.add(task);
            requeued += 1;
        }

        info!(agent_id = %agent_id, requeued, "Recovered persisted tasks");
        Ok(requeued)
    }

    /// Resolves once the queue is empty and nothing is in flight. Never
    /// resolves while the runner is paused or stopped with work queued.
    pub async fn wait_for_idle(&self) {
        while !self.inner.is_idle() {
            tokio::time::sleep(self.inner.options.poll_interval / 4).await;
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&RunnerEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.events.unsubscribe(id)
    }

    pub fn pending_tasks(&self) -> Vec<Task> {
        self.inner.queue.snapshot()
    }

    pub fn running_task_ids(&self) -> Vec<String> {
        self.inner.running.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl RunnerInner {
    fn lock_shutdown(&self) -> std::sync::MutexGuard<'_, CancellationToken> {
        self.shutdown.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_admission(&self) -> std::sync::MutexGuard<'_, ()> {
        self.admission.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_idle(&self) -> bool {
        let _admission = self.lock_admission();
        self.queue.is_empty() && self.running.is_empty()
    }

    /// Pop the next task and register it as running in one step.
    fn admit_next(&self) -> Option<(Task, CancellationToken)> {
        let _admission = self.lock_admission();
        let task = self.queue.get_next()?;
        let token = CancellationToken::new();
        self.running.insert(task.id.clone(), token.clone());
        Some((task, token))
    }

    async fn dispatch_loop(self: Arc<Self>, shutdown: CancellationToken) {
        debug!(agent_id = %self.config.id, "Dispatch loop running");

        while !shutdown.is_cancelled() {
            let paused = self.state.read().await.status == AgentStatus::Paused;
            let saturated = self.running.len() >= self.config.max_concurrent_tasks;

            let next = if paused || saturated { None } else { self.admit_next() };

            match next {
                Some((task, token)) => {
                    debug!(task_id = %task.id, in_flight = self.running.len(), "Dispatching task");
                    self.tracker.spawn(self.clone().execute(task, token));
                }
                None => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.options.poll_interval) => {}
                    }
                }
            }
        }

        debug!(agent_id = %self.config.id, "Dispatch loop exited");
    }

    async fn execute(self: Arc<Self>, mut task: Task, token: CancellationToken) {
        let guard = RunningGuard {
            running: &self.running,
            task_id: task.id.clone(),
        };

        if let Err(e) = task.mark_running() {
            error!(task_id = %task.id, error = %e, "Dequeued task could not start");
            return;
        }
        {
            let mut state = self.state.write().await;
            state.current_task = Some(task.clone());
            state.touch();
        }
        self.persist_task(&task).await;
        self.persist_state().await;
        info!(task_id = %task.id, task_type = %task.task_type, attempt = task.retry_count + 1, "Task started");
        self.events.emit(RunnerEvent::TaskStarted(task.clone()));

        let Some(skill) = self.registry.get_skill(task.task_type) else {
            let task_type = task.task_type;
            self.fail(task, HeraldError::NoSkill(task_type)).await;
            return;
        };

        let started = Instant::now();
        match self.invoke(skill, &task, &token).await {
            Outcome::Succeeded(result) => {
                let elapsed = started.elapsed().as_millis() as u64;
                self.complete(task, result, elapsed).await;
            }
            Outcome::Cancelled(reason) => self.cancelled(task, reason).await,
            Outcome::Failed(err) => {
                if let Some(task) = self.handle_failure(task, err).await {
                    self.requeue(guard, task);
                }
            }
        }
    }

    /// Move a retried task from the running set back into the queue in one step.
    /// The entry must leave the running set before the task can be admitted again.
    fn requeue(&self, guard: RunningGuard<'_>, task: Task) {
        let _admission = self.lock_admission();
        drop(guard);
        self.queue.add(task);
    }

    /// Race the skill against the task timeout and its cancellation token.
    async fn invoke(&self, skill: Arc<dyn Skill>, task: &Task, token: &CancellationToken) -> Outcome {
        let timeout = self.config.timeout();
        let execution = AssertUnwindSafe(skill.execute(&task.payload, token.clone())).catch_unwind();

        tokio::select! {
            biased;
            _ = token.cancelled() => Outcome::Cancelled("Cancelled while running".to_string()),
            settled = execution => match settled {
                Ok(Ok(result)) if result.success => Outcome::Succeeded(result),
                Ok(Ok(result)) => Outcome::Failed(HeraldError::SkillRejected(
                    result.error.unwrap_or_else(|| format!("{} reported failure", skill.name())),
                )),
                Ok(Err(e)) if token.is_cancelled() => Outcome::Cancelled(e.to_string()),
                Ok(Err(HeraldError::Skill(message))) => Outcome::Failed(HeraldError::Skill(message)),
                Ok(Err(e)) => Outcome::Failed(HeraldError::Skill(e.to_string())),
                Err(panic) => Outcome::Failed(HeraldError::Panicked(format!(
                    "skill {} panicked: {}",
                    skill.name(),
                    panic_message(&*panic)
                ))),
            },
            _ = tokio::time::sleep(timeout) => {
                token.cancel();
                Outcome::Failed(HeraldError::Timeout(self.config.timeout_ms))
            }
        }
    }

    async fn complete(&self, mut task: Task, result: SkillResult, elapsed_ms: u64) {
        let metrics = ExecutionMetrics {
            execution_time_ms: elapsed_ms,
            tokens_used: result.tokens_used(),
            api_calls: result.api_calls(),
        };
        let artifacts = result.metadata.and_then(|m| m.artifacts);
        let outcome = TaskResult {
            success: true,
            data: result.data,
            metrics,
            artifacts,
        };

        if let Err(e) = task.mark_completed(outcome) {
            error!(task_id = %task.id, error = %e, "Could not record completion");
            return;
        }
        self.persist_task(&task).await;
        {
            let mut state = self.state.write().await;
            state.completed_tasks.push(task.clone());
            Self::clear_current(&mut state, &task.id);
            state.touch();
        }
        self.persist_state().await;
        info!(task_id = %task.id, elapsed_ms, "Task completed");
        self.events.emit(RunnerEvent::TaskCompleted(task));
    }

    /// Returns the task when it should go back into the queue.
    async fn handle_failure(&self, mut task: Task, err: HeraldError) -> Option<Task> {
        let classification = err.classify();
        if classification.retryable && task.can_retry() {
            warn!(
                task_id = %task.id,
                error_type = classification.error_type,
                error = %err,
                retry = task.retry_count + 1,
                max_retries = task.max_retries,
                "Task failed, requeueing"
            );
            if let Err(e) = task.mark_retrying(err.to_string()) {
                error!(task_id = %task.id, error = %e, "Could not requeue task");
                self.fail(task, err).await;
                return None;
            }
            self.persist_task(&task).await;
            {
                let mut state = self.state.write().await;
                Self::clear_current(&mut state, &task.id);
                state.touch();
            }
            self.persist_state().await;
            self.events.emit(RunnerEvent::TaskRetrying(task.clone()));
            return Some(task);
        }

        self.fail(task, err).await;
        None
    }

    async fn fail(&self, mut task: Task, err: HeraldError) {
        let classification = err.classify();
        if let Err(e) = task.mark_failed(err.to_string()) {
            error!(task_id = %task.id, error = %e, "Could not record failure");
            return;
        }
        self.persist_task(&task).await;
        {
            let mut state = self.state.write().await;
            state.failed_tasks.push(task.clone());
            Self::clear_current(&mut state, &task.id);
            state.touch();
        }
        self.persist_state().await;
        error!(
            task_id = %task.id,
            error_type = classification.error_type,
            retries = task.retry_count,
            error = %err,
            "Task failed"
        );
        self.events.emit(RunnerEvent::TaskFailed(task));
    }

    async fn cancelled(&self, mut task: Task, reason: String) {
        if let Err(e) = task.mark_cancelled(reason) {
            error!(task_id = %task.id, error = %e, "Could not record cancellation");
            return;
        }
        self.persist_task(&task).await;
        {
            let mut state = self.state.write().await;
            Self::clear_current(&mut state, &task.id);
            state.touch();
        }
        self.persist_state().await;
        info!(task_id = %task.id, "Task cancelled");
        self.events.emit(RunnerEvent::TaskCancelled(task));
    }

    fn clear_current(state: &mut AgentState, task_id: &str) {
        if state.current_task.as_ref().is_some_and(|t| t.id == task_id) {
            state.current_task = None;
        }
    }

    async fn fault(&self, error: String) {
        {
            let mut state = self.state.write().await;
            state.status = AgentStatus::Error;
            state.touch();
        }
        self.persist_state().await;
        error!(agent_id = %self.config.id, error = %error, "Dispatch loop faulted");
        self.events.emit(RunnerEvent::Faulted { error });
    }

    async fn persist_state(&self) {
        let _writes = self.state_writes.lock().await;
        let snapshot = self.state.read().await.clone();
        if let Err(e) = self.store.save_state(&snapshot).await {
            warn!(agent_id = %self.config.id, error = %e, "Failed to persist agent state");
        }
    }

    async fn persist_task(&self, task: &Task) {
        if let Err(e) = self.store.save_task(task).await {
            warn!(task_id = %task.id, error = %e, "Failed to persist task");
        }
    }
}
