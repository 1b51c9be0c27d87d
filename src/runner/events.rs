use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tracing::warn;

use crate::task::Task;

/// Lifecycle and task notifications published by the runner.
#[derive(Debug, Clone)]
pub enum RunnerEvent {
    /// Dispatch loop launched
    Started,
    /// Runner drained and stopped
    Stopped,
    Paused,
    Resumed,
    TaskStarted(Task),
    TaskCompleted(Task),
    /// Terminal failure: configuration error or retries exhausted
    TaskFailed(Task),
    /// Transient failure, task was put back on the queue
    TaskRetrying(Task),
    TaskCancelled(Task),
    /// The dispatch loop died and the runner moved to the error state
    Faulted { error: String },
}

impl RunnerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::Paused => "paused",
            Self::Resumed => "resumed",
            Self::TaskStarted(_) => "taskStarted",
            Self::TaskCompleted(_) => "taskCompleted",
            Self::TaskFailed(_) => "taskFailed",
            Self::TaskRetrying(_) => "taskRetrying",
            Self::TaskCancelled(_) => "taskCancelled",
            Self::Faulted { .. } => "faulted",
        }
    }

    pub fn task(&self) -> Option<&Task> {
        match self {
            Self::TaskStarted(t)
            | Self::TaskCompleted(t)
            | Self::TaskFailed(t)
            | Self::TaskRetrying(t)
            | Self::TaskCancelled(t) => Some(t),
            _ => None,
        }
    }
}

pub type Listener = Arc<dyn Fn(&RunnerEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Ordered listener list with synchronous, panic-isolated delivery.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<(ListenerId, Listener)>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&RunnerEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((id, Arc::new(listener)));
        id
    }

    /// Forward every event into an unbounded channel. A closed receiver is ignored.
    pub fn subscribe_channel(&self, tx: mpsc::UnboundedSender<RunnerEvent>) -> ListenerId {
        self.subscribe(move |event| {
            let _ = tx.send(event.clone());
        })
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn emit(&self, event: RunnerEvent) {
        // Snapshot so listeners may (un)subscribe from inside a callback.
        let snapshot: Vec<Listener> = self.listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in snapshot {
            if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                warn!(event = event.name(), panic = %panic_message(&*panic), "Event listener panicked");
            }
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_listeners_called_in_subscription_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["a", "b", "c"] {
            let seen = seen.clone();
            bus.subscribe(move |event| seen.lock().unwrap().push(format!("{}:{}", tag, event.name())));
        }

        bus.emit(RunnerEvent::Started);
        assert_eq!(*seen.lock().unwrap(), vec!["a:started", "b:started", "c:started"]);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicU64::new(0));
        bus.subscribe(|_| panic!("listener exploded"));
        let counter = hits.clone();
        bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(RunnerEvent::Paused);
        bus.emit(RunnerEvent::Resumed);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicU64::new(0));
        let counter = hits.clone();
        let id = bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(RunnerEvent::Started);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(RunnerEvent::Stopped);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_subscribe_during_delivery_does_not_deadlock() {
        let bus = Arc::new(EventBus::new());
        let inner = bus.clone();
        bus.subscribe(move |_| {
            inner.subscribe(|_| {});
        });

        bus.emit(RunnerEvent::Started);
        assert_eq!(bus.listener_count(), 2);
    }

    #[tokio::test]
    async fn test_channel_listener() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        bus.subscribe_channel(tx);

        bus.emit(RunnerEvent::Started);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "started");
    }
}
