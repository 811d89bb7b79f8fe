//! Counts in-flight handling tasks so shutdown can wait for them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    count: AtomicUsize,
    idle: Notify,
}

#[derive(Debug, Clone, Default)]
pub struct TaskTracker {
    inner: Arc<Inner>,
}

/// Held by a running task; dropping it marks the task finished.
#[derive(Debug)]
pub struct TaskGuard {
    inner: Arc<Inner>,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self) -> TaskGuard {
        self.inner.count.fetch_add(1, Ordering::SeqCst);
        TaskGuard {
            inner: self.inner.clone(),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.inner.count.load(Ordering::SeqCst)
    }

    /// Resolve once no task is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a guard dropped in between still wakes us.
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        if self.inner.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}
