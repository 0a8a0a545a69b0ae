//! Shutdown coordination for background tasks.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Coordinator for graceful shutdown.
///
/// Long-running tasks subscribe to a broadcast channel; spawned tasks are
/// remembered so `drain` can wait for them to finish.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    tasks: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Spawn a task built from a fresh shutdown receiver and track it.
    pub fn spawn<F, Fut>(&self, name: &'static str, task: F)
    where
        F: FnOnce(broadcast::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task(self.subscribe()));
        tracing::debug!(task = name, "Background task started");
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((name, handle));
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Wait for tracked tasks to exit. Tasks still running at the deadline
    /// are aborted. Returns true if every task exited on its own.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let tasks = std::mem::take(
            &mut *self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        let deadline = tokio::time::Instant::now() + timeout;
        let mut clean = true;

        for (name, mut handle) in tasks {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => tracing::debug!(task = name, "Background task stopped"),
                Ok(Err(e)) => {
                    clean = false;
                    tracing::error!(task = name, error = %e, "Background task failed");
                }
                Err(_) => {
                    clean = false;
                    tracing::warn!(task = name, "Background task did not stop in time, aborting");
                    handle.abort();
                }
            }
        }
        clean
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tasks_stop_on_trigger() {
        let shutdown = Shutdown::new();
        shutdown.spawn("waiter", |mut rx| async move {
            let _ = rx.recv().await;
        });
        assert_eq!(shutdown.receiver_count(), 1);

        shutdown.trigger();
        assert!(shutdown.drain(Duration::from_secs(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_task_aborted() {
        let shutdown = Shutdown::new();
        shutdown.spawn("stuck", |_rx| async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        shutdown.trigger();
        assert!(!shutdown.drain(Duration::from_millis(50)).await);
    }
}
