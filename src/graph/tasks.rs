//! Background loads - TaskStatus pattern
//!
//! A load is spawned onto the widget's shared tokio runtime and writes its
//! result into a shared slot. The UI polls the slot once per frame; the task
//! wakes it with `request_repaint` when it finishes. If the widget is gone by
//! then, the result lands in a slot nobody polls.

use crate::error::LoadError;
use crate::graph::loader::LoadFuture;
use std::sync::{Arc, Mutex};
use tokio::runtime::{Handle, Runtime};

// =============================================================================
// TASK STATUS
// =============================================================================

/// Lifecycle of a background operation
#[derive(Debug, Clone, Default)]
pub enum TaskStatus<T, E> {
    #[default]
    Idle,
    InProgress,
    Finished(Result<T, E>),
}

impl<T, E> TaskStatus<T, E> {
    pub fn is_idle(&self) -> bool {
        matches!(self, TaskStatus::Idle)
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, TaskStatus::InProgress)
    }

    /// Take the result if finished, leaving Idle
    pub fn take_result(&mut self) -> Option<Result<T, E>> {
        match std::mem::take(self) {
            TaskStatus::Finished(result) => Some(result),
            other => {
                *self = other;
                None
            }
        }
    }
}

// =============================================================================
// PENDING SLOT
// =============================================================================

/// Shared slot a worker writes one result into
pub struct PendingSlot<T> {
    inner: Arc<Mutex<TaskStatus<T, LoadError>>>,
}

impl<T> Clone for PendingSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for PendingSlot<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(TaskStatus::Idle)),
        }
    }
}

impl<T> PendingSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_progress(&self) -> bool {
        self.inner
            .lock()
            .map(|status| status.is_in_progress())
            .unwrap_or(false)
    }

    fn mark_in_progress(&self) {
        if let Ok(mut status) = self.inner.lock() {
            *status = TaskStatus::InProgress;
        }
    }

    fn finish(&self, result: Result<T, LoadError>) {
        if let Ok(mut status) = self.inner.lock() {
            *status = TaskStatus::Finished(result);
        }
    }

    /// Result of a finished task, if any. Leaves the slot idle.
    pub fn poll(&self) -> Option<Result<T, LoadError>> {
        self.inner.lock().ok()?.take_result()
    }
}

impl<T> std::fmt::Debug for PendingSlot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingSlot")
            .field("in_progress", &self.is_in_progress())
            .finish()
    }
}

// =============================================================================
// SPAWN
// =============================================================================

/// Multi-threaded runtime shared by every load of a widget
pub fn load_runtime() -> std::io::Result<Arc<Runtime>> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("mindmesh-load")
        .enable_all()
        .build()
        .map(Arc::new)
}

/// Drive `future` to completion on `runtime`, then store its result.
///
/// `wake` runs after the result is stored (typically `ctx.request_repaint()`).
pub fn spawn_load<T, W>(runtime: &Handle, slot: &PendingSlot<T>, future: LoadFuture<T>, wake: W)
where
    T: Send + 'static,
    W: FnOnce() + Send + 'static,
{
    slot.mark_in_progress();
    let slot = slot.clone();
    runtime.spawn(async move {
        let result = future.await;
        slot.finish(result);
        wake();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_take_result_only_when_finished() {
        let mut status: TaskStatus<u32, String> = TaskStatus::InProgress;
        assert!(status.take_result().is_none());
        assert!(status.is_in_progress());

        status = TaskStatus::Finished(Ok(3));
        assert_eq!(status.take_result(), Some(Ok(3)));
        assert!(status.is_idle());
    }

    #[test]
    fn test_spawn_load_fills_slot_and_wakes() {
        let runtime = load_runtime().unwrap();
        let slot: PendingSlot<u32> = PendingSlot::new();
        let (tx, rx) = mpsc::channel();

        spawn_load(runtime.handle(), &slot, Box::pin(async { Ok(42) }), move || {
            let _ = tx.send(());
        });

        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(slot.poll(), Some(Ok(42))));
        assert!(slot.poll().is_none());
    }

    #[test]
    fn test_error_result_is_kept() {
        let runtime = load_runtime().unwrap();
        let slot: PendingSlot<u32> = PendingSlot::new();
        let (tx, rx) = mpsc::channel();

        spawn_load(
            runtime.handle(),
            &slot,
            Box::pin(async { Err(LoadError::Backend("offline".into())) }),
            move || {
                let _ = tx.send(());
            },
        );

        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(slot.poll(), Some(Err(LoadError::Backend("offline".into()))));
    }

    #[test]
    fn test_loads_share_one_runtime() {
        let runtime = load_runtime().unwrap();
        let (tx, rx) = mpsc::channel();
        let slots: Vec<PendingSlot<String>> = (0..4).map(|_| PendingSlot::new()).collect();

        for slot in &slots {
            let tx = tx.clone();
            spawn_load(
                runtime.handle(),
                slot,
                Box::pin(async {
                    Ok(std::thread::current().name().unwrap_or_default().to_string())
                }),
                move || {
                    let _ = tx.send(());
                },
            );
        }
        for _ in 0..slots.len() {
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }

        for slot in &slots {
            assert_eq!(slot.poll(), Some(Ok("mindmesh-load".to_string())));
        }
    }
}
