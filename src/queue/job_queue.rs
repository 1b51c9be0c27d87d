use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::task::Task;

/// Priority-ordered buffer of pending tasks.
///
/// Tasks are kept sorted by descending priority and, within a priority, by
/// submission `sequence`. A fresh task always carries the highest sequence so
/// it lands at the tail of its tier; a retried task keeps its sequence and
/// re-enters at its original rank. The buffer is mutex-guarded so producers
/// may call [`JobQueue::add`] concurrently with the dispatcher.
#[derive(Debug, Default)]
pub struct JobQueue {
    tasks: Mutex<VecDeque<Task>>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Task>> {
        // Every mutation leaves the deque consistent, so a poisoned lock is safe to reuse.
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add(&self, task: Task) {
        let mut tasks = self.lock();
        let position = tasks
            .iter()
            .position(|queued| {
                queued.priority < task.priority
                    || (queued.priority == task.priority && queued.sequence > task.sequence)
            })
            .unwrap_or(tasks.len());
        tasks.insert(position, task);
    }

    pub fn get_next(&self) -> Option<Task> {
        self.lock().pop_front()
    }

    /// Remove a queued task by id. Linear scan.
    pub fn remove(&self, task_id: &str) -> Option<Task> {
        let mut tasks = self.lock();
        let index = tasks.iter().position(|t| t.id == task_id)?;
        tasks.remove(index)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn size(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.lock().iter().any(|t| t.id == task_id)
    }

    /// Pending tasks in dequeue order.
    pub fn snapshot(&self) -> Vec<Task> {
        self.lock().iter().cloned().collect()
    }
}
