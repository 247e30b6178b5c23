use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use crate::application::testing::{Harness, RecordingRenderer, sample_entry};

use super::*;

fn queue() -> TaskQueue {
    TaskQueue::new(
        Arc::new(MemoryQueueStore::new()),
        Arc::new(ExternalRunner),
        RetryPolicy::default(),
    )
}

#[tokio::test]
async fn dispatch_sees_every_artifact_generated_ahead_of_it() {
    let dir = TempDir::new().expect("temp dir");
    let harness = Harness::new(dir.path(), RecordingRenderer::default(), ReclaimMode::All);
    let queue = queue();
    queue.push(TaskBatch::for_notification(3, 12, "a", ["inv", "receipt"]));
    queue.save().await.expect("save");

    let summary = queue.run_pending(&harness.context).await.expect("run");

    assert_eq!(summary.succeeded, 3);
    let sent = harness.dispatcher.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "a");
    assert_eq!(
        sent[0].1,
        vec![harness.artifact("inv"), harness.artifact("receipt")]
    );
}

#[tokio::test]
async fn second_generation_is_a_cache_hit() {
    let dir = TempDir::new().expect("temp dir");
    let harness = Harness::new(dir.path(), RecordingRenderer::default(), ReclaimMode::All);
    let task = TaskDescriptor::generate(3, 12, "inv");

    harness.context.execute(&task).await.expect("first");
    harness.context.execute(&task).await.expect("second");

    assert_eq!(harness.renderer.calls(), 1);
    assert!(harness.artifact("inv").is_file());
}

#[tokio::test]
async fn concurrent_duplicates_render_once() {
    let dir = TempDir::new().expect("temp dir");
    let harness = Harness::new(dir.path(), RecordingRenderer::default(), ReclaimMode::All);
    let task = TaskDescriptor::generate(3, 12, "inv");

    let (first, second) = tokio::join!(
        harness.context.execute(&task),
        harness.context.execute(&task)
    );
    first.expect("first");
    second.expect("second");

    assert_eq!(harness.renderer.calls(), 1);
}

#[tokio::test]
async fn failing_generation_leaves_no_artifact_and_dispatch_still_runs() {
    let dir = TempDir::new().expect("temp dir");
    let harness = Harness::new(
        dir.path(),
        RecordingRenderer::failing("invoice"),
        ReclaimMode::All,
    );
    let queue = queue();
    queue.push(TaskBatch::for_notification(3, 12, "a", ["inv", "receipt"]));
    queue.save().await.expect("save");

    let summary = queue.run_pending(&harness.context).await.expect("run");

    assert_eq!(summary.abandoned, 1);
    assert_eq!(harness.renderer.calls(), DEFAULT_MAX_ATTEMPTS as usize + 1);
    assert!(!harness.artifact("inv").exists());
    let sent = harness.dispatcher.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1, vec![harness.artifact("receipt")]);
}

#[tokio::test]
async fn generation_fails_for_entry_of_another_form() {
    let dir = TempDir::new().expect("temp dir");
    let harness = Harness::new(dir.path(), RecordingRenderer::default(), ReclaimMode::All);

    let err = harness
        .context
        .execute(&TaskDescriptor::generate(4, 12, "inv"))
        .await
        .expect_err("mismatch");
    assert_eq!(err.code(), "domain");

    let err = harness
        .context
        .execute(&TaskDescriptor::generate(3, 12, "missing"))
        .await
        .expect_err("unknown settings");
    assert_eq!(err.code(), "domain");
    assert_eq!(harness.renderer.calls(), 0);
}

#[tokio::test]
async fn reclaim_removes_directories_of_older_entry_versions() {
    let dir = TempDir::new().expect("temp dir");
    let harness = Harness::new(dir.path(), RecordingRenderer::default(), ReclaimMode::All);
    harness
        .context
        .execute(&TaskDescriptor::generate(3, 12, "inv"))
        .await
        .expect("generate");
    let stale = harness.artifact("inv");

    let mut updated = sample_entry();
    updated.values.insert("1".into(), json!("Grace"));
    harness.repo.put_entry(updated);
    harness
        .context
        .execute(&TaskDescriptor::generate(3, 12, "summary"))
        .await
        .expect("generate");

    harness
        .context
        .execute(&TaskDescriptor::reclaim(3, 12))
        .await
        .expect("reclaim");

    assert!(!stale.exists());
    let leftovers = std::fs::read_dir(harness.addresser.site_root())
        .expect("site root")
        .count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn reclaim_first_mode_stops_after_one_directory() {
    let dir = TempDir::new().expect("temp dir");
    let harness = Harness::new(dir.path(), RecordingRenderer::default(), ReclaimMode::First);
    for settings_id in ["inv", "receipt"] {
        harness
            .context
            .execute(&TaskDescriptor::generate(3, 12, settings_id))
            .await
            .expect("generate");
    }

    harness
        .context
        .execute(&TaskDescriptor::reclaim(3, 12))
        .await
        .expect("reclaim");

    let remaining = std::fs::read_dir(harness.addresser.site_root())
        .expect("site root")
        .count();
    assert_eq!(remaining, 1);
}

#[tokio::test]
async fn reclaim_after_deletion_falls_back_to_entry_prefix() {
    let dir = TempDir::new().expect("temp dir");
    let harness = Harness::new(dir.path(), RecordingRenderer::default(), ReclaimMode::All);
    harness
        .context
        .execute(&TaskDescriptor::generate(3, 12, "inv"))
        .await
        .expect("generate");
    let unrelated = harness.addresser.site_root().join("1-3-120-inv-notes");
    std::fs::create_dir_all(&unrelated).expect("unrelated dir");

    harness.repo.remove_entry(12);
    harness.repo.remove_form(3);
    harness
        .context
        .execute(&TaskDescriptor::reclaim(3, 12))
        .await
        .expect("reclaim");

    assert!(!harness.artifact("inv").exists());
    assert!(unrelated.exists());
}

#[tokio::test]
async fn reclaim_without_cache_root_is_a_no_op() {
    let dir = TempDir::new().expect("temp dir");
    let harness = Harness::new(dir.path(), RecordingRenderer::default(), ReclaimMode::All);

    harness
        .context
        .execute(&TaskDescriptor::reclaim(3, 12))
        .await
        .expect("reclaim");
}
