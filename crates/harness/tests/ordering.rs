use std::time::Duration;

use quizsync_cache::EntityCache;
use quizsync_core::patch::{QuizDraft, QuizPatch};
use quizsync_core::{ActionType, EntityKey, EntityKind};
use quizsync_engine::{MutationStatus, SyncError};
use quizsync_harness::{fixtures, TestClient};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn retitle(title: &str) -> QuizPatch {
    QuizPatch {
        title: Some(title.into()),
        ..Default::default()
    }
}

/// Lets spawned tasks run until they block on a marker or the gate.
async fn let_tasks_queue() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

// ============================================================================
// Serialization
// ============================================================================

#[tokio::test]
async fn same_key_updates_never_interleave() -> TestResult {
    let client = TestClient::new();
    client.hydrate_quiz(fixtures::quiz(7, "Start", Vec::new())).await?;

    client.server.hold();
    let first = tokio::spawn({
        let engine = client.engine.clone();
        async move { engine.update_quiz(7, retitle("First")).await }
    });
    client.server.wait_for_calls(2).await;
    let second = tokio::spawn({
        let engine = client.engine.clone();
        async move { engine.update_quiz(7, retitle("Second")).await }
    });
    let_tasks_queue().await;

    // The second update waits on the marker; only one call reached the server.
    assert_eq!(client.server.calls(), vec!["fetch", "update_quiz"]);
    assert_eq!(client.cached_quiz(7)?.ok_or("quiz missing")?.title, "First");

    client.server.release();
    assert_eq!(first.await??.title, "First");
    assert_eq!(second.await??.title, "Second");

    let titles: Vec<String> = client
        .server
        .history(EntityKey::quiz(7))
        .iter()
        .filter(|entry| entry.action == ActionType::Update)
        .filter_map(|entry| entry.previous_state.as_ref()?.get("title")?.as_str().map(String::from))
        .collect();
    assert_eq!(titles, vec!["Start", "First"]);
    assert_eq!(client.cached_quiz(7)?.ok_or("quiz missing")?.title, "Second");
    Ok(())
}

#[tokio::test]
async fn disjoint_keys_run_concurrently() -> TestResult {
    let client = TestClient::new();
    client.hydrate_quiz(fixtures::quiz(7, "Seven", Vec::new())).await?;
    client.hydrate_quiz(fixtures::quiz(8, "Eight", Vec::new())).await?;

    client.server.hold();
    let a = tokio::spawn({
        let engine = client.engine.clone();
        async move { engine.update_quiz(7, retitle("Seven*")).await }
    });
    let b = tokio::spawn({
        let engine = client.engine.clone();
        async move { engine.update_quiz(8, retitle("Eight*")).await }
    });
    client.server.wait_for_calls(4).await;

    let pending = client.engine.pending();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|m| m.status == MutationStatus::InFlight && m.label == "update_quiz"));
    assert!(pending.iter().any(|m| m.touches(&EntityKey::quiz(7))));
    assert!(pending.iter().any(|m| m.touches(&EntityKey::quiz(8))));

    client.server.release();
    a.await??;
    b.await??;
    assert!(client.engine.pending().is_empty());
    Ok(())
}

// ============================================================================
// Delete precedence
// ============================================================================

#[tokio::test]
async fn delete_overtakes_queued_updates() -> TestResult {
    let client = TestClient::new();
    client.hydrate_quiz(fixtures::quiz(7, "Start", vec![fixtures::multiple_choice("Q")])).await?;

    client.server.hold();
    let in_flight = tokio::spawn({
        let engine = client.engine.clone();
        async move { engine.update_quiz(7, retitle("In flight")).await }
    });
    client.server.wait_for_calls(2).await;
    let queued = tokio::spawn({
        let engine = client.engine.clone();
        async move { engine.update_quiz(7, retitle("Queued")).await }
    });
    let_tasks_queue().await;
    let delete = tokio::spawn({
        let engine = client.engine.clone();
        async move { engine.delete_quiz(7).await }
    });
    let_tasks_queue().await;

    client.server.release();
    assert_eq!(in_flight.await??.title, "In flight");
    delete.await??;
    let err = queued.await?.unwrap_err();

    assert!(matches!(err, SyncError::NotFound(_)));
    assert_eq!(client.server.calls(), vec!["fetch", "update_quiz", "delete_quiz"]);
    assert!(client.dump()?.is_empty());
    assert!(!client.engine.is_in_flight(&EntityKey::quiz(7)));
    Ok(())
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn dropped_caller_still_reconciles() -> TestResult {
    let client = TestClient::new();
    client.hydrate_quiz(fixtures::quiz(7, "Start", Vec::new())).await?;

    client.server.hold();
    let caller = tokio::spawn({
        let engine = client.engine.clone();
        async move { engine.update_quiz(7, retitle("Abandoned")).await }
    });
    client.server.wait_for_calls(2).await;
    caller.abort();
    assert!(caller.await.is_err());

    assert!(client.engine.is_in_flight(&EntityKey::quiz(7)));
    client.server.release();
    assert!(client.settle(Duration::from_secs(5)).await);

    let on_server = client.server.quiz(7).ok_or("quiz missing on server")?;
    assert_eq!(on_server.title, "Abandoned");
    assert_eq!(client.cached_quiz(7)?, Some(on_server));
    assert!(!client.engine.is_in_flight(&EntityKey::quiz(7)));
    Ok(())
}

#[tokio::test]
async fn dropped_caller_still_rolls_back() -> TestResult {
    let client = TestClient::new();
    client.hydrate_quiz(fixtures::quiz(7, "Start", Vec::new())).await?;
    let before = client.dump()?;

    client.server.hold();
    client.server.set_offline(true);
    let caller = tokio::spawn({
        let engine = client.engine.clone();
        async move { engine.update_quiz(7, retitle("Never")).await }
    });
    client.server.wait_for_calls(2).await;
    caller.abort();
    let _ = caller.await;

    client.server.release();
    assert!(client.settle(Duration::from_secs(5)).await);
    assert_eq!(client.dump()?, before);
    Ok(())
}

// ============================================================================
// Temporary ids
// ============================================================================

#[tokio::test]
async fn queued_update_follows_created_key() -> TestResult {
    let client = TestClient::new();

    client.server.hold();
    let create = tokio::spawn({
        let engine = client.engine.clone();
        async move { engine.create_quiz(QuizDraft::new("Draft", "rust")).await }
    });
    client.server.wait_for_calls(1).await;

    let keys = client.engine.cache().keys(EntityKind::Quiz)?;
    assert_eq!(keys.len(), 1);
    let temp = keys[0];
    assert!(temp.id.is_local());

    let update = tokio::spawn({
        let engine = client.engine.clone();
        async move { engine.update_quiz(temp.id, retitle("Named")).await }
    });
    let_tasks_queue().await;

    client.server.release();
    let created = create.await??;
    let updated = update.await??;

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.title, "Named");
    // Nothing waits on the temporary key any more, so its alias is gone.
    assert_eq!(client.engine.resolve(temp), temp);
    assert!(!client.engine.is_in_flight(&temp));
    assert_eq!(client.engine.cache().keys(EntityKind::Quiz)?, vec![created.key()]);
    assert_eq!(client.cached_quiz(created.id)?, Some(updated));
    Ok(())
}
