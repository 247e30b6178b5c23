use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use folio::application::jobs::{
    ExternalRunner, MemoryQueueStore, QueueStore, RetryPolicy, TaskBatch, TaskDescriptor,
    TaskError, TaskExecutor, TaskQueue,
};
use folio::infra::queue_file::FileQueueStore;

/// Fails every task whose id is listed, counting each attempt.
#[derive(Default)]
struct FlakyExecutor {
    failing: Vec<String>,
    attempts: Mutex<HashMap<String, u32>>,
}

impl FlakyExecutor {
    fn failing(ids: &[&str]) -> Self {
        Self {
            failing: ids.iter().map(|id| id.to_string()).collect(),
            ..Self::default()
        }
    }

    fn attempts(&self, id: &str) -> u32 {
        self.attempts
            .lock()
            .expect("attempts")
            .get(id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl TaskExecutor for FlakyExecutor {
    async fn execute(&self, task: &TaskDescriptor) -> Result<(), TaskError> {
        *self
            .attempts
            .lock()
            .expect("attempts")
            .entry(task.id.clone())
            .or_default() += 1;
        if self.failing.contains(&task.id) {
            return Err(TaskError::Failed("renderer unavailable".into()));
        }
        Ok(())
    }
}

#[tokio::test]
async fn failing_generation_is_tried_three_times_then_dispatch_runs() {
    let store = Arc::new(MemoryQueueStore::new());
    let queue = TaskQueue::new(store.clone(), Arc::new(ExternalRunner), RetryPolicy::default());
    let executor = FlakyExecutor::failing(&["generate:3:12:inv"]);

    queue.push(TaskBatch::for_notification(3, 12, "a", ["inv", "receipt"]));
    queue.save().await.expect("save");
    let summary = queue.run_pending(&executor).await.expect("run");

    assert_eq!(executor.attempts("generate:3:12:inv"), 3);
    assert_eq!(executor.attempts("generate:3:12:receipt"), 1);
    assert_eq!(executor.attempts("dispatch:3:12:a"), 1);
    assert_eq!(summary.abandoned, 1);
    assert_eq!(summary.retried, 2);
    assert!(store.load().await.expect("load").is_empty());
}

#[tokio::test]
async fn saved_batches_survive_a_new_queue_instance() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("queue.json");

    let first = TaskQueue::new(
        Arc::new(FileQueueStore::new(&path)),
        Arc::new(ExternalRunner),
        RetryPolicy::default(),
    );
    first.push(TaskBatch::for_notification(3, 12, "a", ["inv"]));
    first.push(TaskBatch::reclaim(3, 12));
    first.save().await.expect("save");
    drop(first);

    let second = TaskQueue::new(
        Arc::new(FileQueueStore::new(&path)),
        Arc::new(ExternalRunner),
        RetryPolicy::default(),
    );
    let pending = second.snapshot().await.expect("snapshot");
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].len(), 2);

    let executor = FlakyExecutor::default();
    let summary = second.run_pending(&executor).await.expect("run");
    assert_eq!(summary.succeeded, 3);
    assert!(second.is_empty().await.expect("is_empty"));
    assert_eq!(executor.attempts("reclaim:3:12"), 1);
}

fn file_queue(path: &std::path::Path) -> Arc<TaskQueue> {
    Arc::new(TaskQueue::new(
        Arc::new(FileQueueStore::new(path)),
        Arc::new(ExternalRunner),
        RetryPolicy::default(),
    ))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn processes_sharing_a_queue_file_lose_and_repeat_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("queue.json");
    let executor = Arc::new(FlakyExecutor::default());

    let producers: Vec<_> = [0u64, 100]
        .into_iter()
        .map(|first| {
            let queue = file_queue(&path);
            tokio::spawn(async move {
                for entry_id in first..first + 20 {
                    queue
                        .save_batches(&[TaskBatch::reclaim(3, entry_id)])
                        .await
                        .expect("save");
                }
            })
        })
        .collect();
    let workers: Vec<_> = (0..2)
        .map(|_| {
            let queue = file_queue(&path);
            let executor = Arc::clone(&executor);
            tokio::spawn(async move {
                for _ in 0..10 {
                    queue.run_pending(executor.as_ref()).await.expect("run");
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    for handle in producers.into_iter().chain(workers) {
        handle.await.expect("task joins");
    }
    let last = file_queue(&path);
    last.run_pending(executor.as_ref()).await.expect("final run");

    for entry_id in (0..20).chain(100..120) {
        assert_eq!(executor.attempts(&format!("reclaim:3:{entry_id}")), 1);
    }
    assert!(last.is_empty().await.expect("is_empty"));
}
