use quizsync_cache::{CacheEvent, EntityCache, SqliteCache};
use quizsync_core::patch::{QuestionDraft, QuizPatch};
use quizsync_core::{EntityKey, EntityKind, RecordId};
use quizsync_engine::SyncError;
use quizsync_harness::{fixtures, TestClient};

type TestResult = Result<(), Box<dyn std::error::Error>>;

// ============================================================================
// SQLite cache
// ============================================================================

#[tokio::test]
async fn confirmed_state_survives_reopen() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("cache.db");

    let client = TestClient::with_cache(SqliteCache::open(&path)?);
    client
        .hydrate_quiz(fixtures::quiz(7, "Quiz", vec![fixtures::multiple_choice("Q1")]))
        .await?;
    let patch = QuizPatch {
        title: Some("Persisted".into()),
        ..Default::default()
    };
    client.engine.update_quiz(7, patch).await?;
    let added = client.engine.add_question(7, QuestionDraft::default()).await?;

    // A rolled-back edit leaves the last confirmed state on disk.
    client.server.set_offline(true);
    let patch = QuizPatch {
        title: Some("Lost".into()),
        ..Default::default()
    };
    assert!(matches!(
        client.engine.update_quiz(7, patch).await,
        Err(SyncError::Network(_))
    ));
    let expected = client.cached_quiz(7)?.ok_or("quiz missing")?;
    drop(client);

    let cache = SqliteCache::open(&path)?;
    let quiz = cache.quiz(RecordId::Server(7))?.ok_or("quiz not persisted")?;
    assert_eq!(quiz, expected);
    assert_eq!(quiz.title, "Persisted");
    assert_eq!(quiz.questions.len(), 2);
    assert_eq!(cache.question(added.id)?, Some(added));
    assert_eq!(cache.keys(EntityKind::Question)?.len(), 2);
    assert_eq!(cache.purge_local()?, 0);
    assert!(cache.fingerprint(&EntityKey::quiz(7))?.is_some());
    Ok(())
}

// ============================================================================
// Cache events
// ============================================================================

#[tokio::test]
async fn create_emits_rekey_event() -> TestResult {
    let client = TestClient::new();
    client.hydrate_quiz(fixtures::quiz(7, "Quiz", Vec::new())).await?;
    let mut events = client.engine.cache().subscribe();

    let added = client.engine.add_question(7, QuestionDraft::default()).await?;

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    let rekeyed = seen.iter().find_map(|event| match event {
        CacheEvent::Rekeyed { from, to } => Some((*from, *to)),
        _ => None,
    });
    let (from, to) = rekeyed.ok_or("no rekey event")?;
    assert!(from.id.is_local());
    assert_eq!(to, added.key());
    assert!(seen.iter().any(|event| *event == CacheEvent::Put(EntityKey::quiz(7))));
    Ok(())
}
