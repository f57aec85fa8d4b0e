use tokio::task::JoinHandle;

/// Tracks a session's background tasks so teardown can take them all
/// down together.
pub struct TaskManager {
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Spawns a task under a label that shows up in teardown logs.
    pub fn spawn<F>(&mut self, label: &'static str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.tasks.push((label, tokio::spawn(future)));
    }

    /// Aborts every tracked task without waiting for it.
    pub fn abort_all(&mut self) {
        for (label, handle) in self.tasks.drain(..) {
            tracing::debug!(task = label, "aborting background task");
            handle.abort();
        }
    }

    /// Aborts everything and waits until the tasks are really gone.
    pub async fn shutdown(mut self) {
        let tasks = std::mem::take(&mut self.tasks);
        for (label, handle) in tasks {
            handle.abort();
            if let Err(err) = handle.await
                && !err.is_cancelled()
            {
                tracing::warn!(task = label, %err, "background task ended abnormally");
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn abort_all_stops_running_tasks() {
        let mut manager = TaskManager::new();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);

        manager.spawn("sleeper", async move {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            flag.store(true, Ordering::SeqCst);
        });

        manager.abort_all();
        assert!(manager.is_empty());
        tokio::task::yield_now().await;
        assert!(!finished.load(Ordering::SeqCst));
    }
}
