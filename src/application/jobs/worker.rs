use std::{sync::Arc, time::Duration};

use tokio::{sync::Notify, task::JoinHandle};
use tracing::{debug, error};

use super::executor::TaskExecutor;
use super::queue::TaskQueue;

/// Something that drains the queue when asked to.
pub trait BackgroundRunner: Send + Sync {
    /// Must return immediately; processing happens elsewhere.
    fn wake(&self);
}

/// Leaves draining to a separate `folio work` process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalRunner;

impl BackgroundRunner for ExternalRunner {
    fn wake(&self) {
        debug!(
            target = "application::jobs::worker",
            "Queue saved; waiting for an external worker"
        );
    }
}

/// In-process runner: a spawned loop that drains the queue whenever it is
/// woken, and on a fixed interval as a fallback.
#[derive(Debug, Clone, Default)]
pub struct QueueWorker {
    notify: Arc<Notify>,
}

impl QueueWorker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(
        &self,
        queue: Arc<TaskQueue>,
        executor: Arc<dyn TaskExecutor>,
        poll_interval: Duration,
    ) -> JoinHandle<()> {
        let notify = Arc::clone(&self.notify);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            loop {
                tokio::select! {
                    _ = notify.notified() => {}
                    _ = interval.tick() => {}
                }
                if let Err(err) = queue.run_pending(executor.as_ref()).await {
                    error!(
                        target = "application::jobs::worker",
                        error = %err,
                        "Queue drain failed"
                    );
                }
            }
        })
    }
}

impl BackgroundRunner for QueueWorker {
    fn wake(&self) {
        self.notify.notify_one();
    }
}
