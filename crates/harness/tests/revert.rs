use quizsync_core::patch::{DocumentDraft, QuestionPatch, QuizDraft, QuizPatch};
use quizsync_core::{ActionType, EntityKey, EntityKind, Snapshot};
use quizsync_engine::SyncError;
use quizsync_gateway::GatewayError;
use quizsync_harness::{fixtures, TestClient};
use serde_json::json;

type TestResult = Result<(), Box<dyn std::error::Error>>;

// ============================================================================
// History listing
// ============================================================================

#[tokio::test]
async fn history_lists_most_recent_first() -> TestResult {
    let client = TestClient::new();
    client.hydrate_quiz(fixtures::quiz(7, "v0", Vec::new())).await?;
    for title in ["v1", "v2", "v3"] {
        let patch = QuizPatch {
            title: Some(title.into()),
            ..Default::default()
        };
        client.engine.update_quiz(7, patch).await?;
    }

    let entries = client.engine.list_history(EntityKind::Quiz, 7, None).await?;
    let previous: Vec<&str> = entries
        .iter()
        .filter_map(|e| e.previous_state.as_ref()?.get("title")?.as_str())
        .collect();
    assert_eq!(previous, vec!["v2", "v1", "v0"]);
    assert!(entries.iter().all(|e| e.action == ActionType::Update));

    let latest = client.engine.list_history(EntityKind::Quiz, 7, Some(1)).await?;
    assert_eq!(latest.len(), 1);
    assert!(latest[0].summary().starts_with("Updated title"));
    Ok(())
}

#[tokio::test]
async fn documents_keep_no_history() -> TestResult {
    let client = TestClient::new();
    let document = client
        .engine
        .create_document(DocumentDraft {
            filename: "notes.txt".into(),
            file_type: "text/plain".into(),
            content: "ownership".into(),
        })
        .await?;
    let calls = client.server.calls().len();

    let err = client
        .engine
        .list_history(EntityKind::Document, document.id, None)
        .await
        .unwrap_err();
    assert!(err.is_validation());
    let err = client
        .engine
        .revert(EntityKind::Document, document.id, None)
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(client.server.calls().len(), calls);
    Ok(())
}

#[tokio::test]
async fn user_activity_spans_every_kind() -> TestResult {
    let client = TestClient::new();
    let quiz = client
        .hydrate_quiz(fixtures::quiz(7, "Quiz", vec![fixtures::multiple_choice("Q1")]))
        .await?;
    client.server.seed_project(fixtures::project(20, "Course"));
    client.engine.load(EntityKind::Project, 20).await?;

    let rename = QuizPatch {
        title: Some("Renamed".into()),
        ..Default::default()
    };
    client.engine.update_quiz(7, rename).await?;
    client.engine.add_quiz_to_project(20, 7, None).await?;
    let question = &quiz.questions[0];
    let reword = QuestionPatch {
        question_text: Some("Reworded".into()),
        ..Default::default()
    };
    client.engine.update_question(question.id, reword).await?;

    let feed = client.engine.list_user_history(None).await?;
    let keys: Vec<EntityKey> = feed.iter().map(|a| a.key()).collect();
    assert_eq!(keys, vec![question.key(), EntityKey::project(20), EntityKey::quiz(7)]);
    assert!(feed[0].summary().starts_with("Updated question text"));
    assert_eq!(feed[1].summary(), "Added quiz to project with 0 existing quizzes");
    assert!(feed[2].summary().starts_with("Updated title"));

    let latest = client.engine.list_user_history(Some(1)).await?;
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].key(), question.key());
    Ok(())
}

// ============================================================================
// Revert
// ============================================================================

#[tokio::test]
async fn revert_question_to_recorded_text() -> TestResult {
    let client = TestClient::new();
    let quiz = client
        .hydrate_quiz(fixtures::quiz(7, "Quiz", vec![fixtures::multiple_choice("New text")]))
        .await?;
    let question = &quiz.questions[0];
    client.server.seed_history(
        question.key(),
        42,
        ActionType::Update,
        json!({ "question_text": "Old text" }),
    );

    let reverted = client
        .engine
        .revert(EntityKind::Question, question.id, Some(42))
        .await?
        .into_question()?;

    assert_eq!(reverted.id, question.id);
    assert_eq!(reverted.question_text, "Old text");
    assert_eq!(reverted.answers, question.answers);
    let cached = client.cached_question(question.id)?.ok_or("question missing")?;
    assert_eq!(cached.question_text, "Old text");
    let cached_quiz = client.cached_quiz(7)?.ok_or("quiz missing")?;
    assert_eq!(cached_quiz.questions[0].question_text, "Old text");

    let history = client.server.history(question.key());
    let last = history.last().ok_or("no history")?;
    assert_eq!(last.action, ActionType::Revert);
    assert!(last.id > 42);
    assert_eq!(last.previous_state, Some(json!({ "question_text": "New text" })));
    Ok(())
}

#[tokio::test]
async fn revert_round_trip_restores_prior_snapshot() -> TestResult {
    let client = TestClient::new();
    let quiz = client
        .hydrate_quiz(fixtures::quiz(7, "Original", vec![fixtures::boolean("Q", true)]))
        .await?;
    let before = Snapshot::from(quiz).without_timestamps();

    let patch = QuizPatch {
        title: Some("Edited".into()),
        description: Some("now with a description".into()),
        use_default_prompt: Some(false),
        custom_prompt: Some("be terse".into()),
        ..Default::default()
    };
    client.engine.update_quiz(7, patch).await?;
    let reverted = client.engine.revert(EntityKind::Quiz, 7, None).await?;

    assert_eq!(reverted.without_timestamps(), before);
    let cached = client.cached(EntityKey::quiz(7))?.ok_or("quiz missing")?;
    assert_eq!(cached.without_timestamps(), before);

    let actions: Vec<ActionType> = client
        .server
        .history(EntityKey::quiz(7))
        .iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(actions, vec![ActionType::Update, ActionType::Revert]);
    Ok(())
}

#[tokio::test]
async fn revert_regeneration_restores_questions() -> TestResult {
    let client = TestClient::new();
    let quiz = client
        .hydrate_quiz(fixtures::quiz(
            7,
            "Quiz",
            vec![fixtures::multiple_choice("Q1"), fixtures::boolean("Q2", false)],
        ))
        .await?;
    let regenerated = client.engine.regenerate_quiz(7, true).await?;

    let reverted = client
        .engine
        .revert(EntityKind::Quiz, 7, None)
        .await?
        .into_quiz()?;

    assert_eq!(
        reverted.questions.iter().map(|q| q.id).collect::<Vec<_>>(),
        quiz.questions.iter().map(|q| q.id).collect::<Vec<_>>()
    );
    for question in &quiz.questions {
        let cached = client.cached_question(question.id)?.ok_or("question missing")?;
        assert_eq!(cached.question_text, question.question_text);
    }
    for question in &regenerated.questions {
        assert_eq!(client.cached_question(question.id)?, None);
    }
    Ok(())
}

#[tokio::test]
async fn failed_revert_rolls_back() -> TestResult {
    let client = TestClient::new();
    client.hydrate_quiz(fixtures::quiz(7, "Original", Vec::new())).await?;
    let patch = QuizPatch {
        title: Some("Edited".into()),
        ..Default::default()
    };
    client.engine.update_quiz(7, patch).await?;
    let before = client.dump()?;

    client.server.fail_next_on("revert", GatewayError::Network("reset by peer".into()));
    let err = client.engine.revert(EntityKind::Quiz, 7, None).await.unwrap_err();

    assert!(matches!(err, SyncError::Network(_)));
    assert_eq!(client.dump()?, before);
    assert_eq!(client.server.history(EntityKey::quiz(7)).len(), 1);
    Ok(())
}

#[tokio::test]
async fn revert_without_revertible_entry_is_rejected_locally() -> TestResult {
    let client = TestClient::new();
    let created = client.engine.create_quiz(QuizDraft::new("Fresh", "rust")).await?;

    let err = client
        .engine
        .revert(EntityKind::Quiz, created.id, None)
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert!(!client.server.calls().contains(&"revert"));
    Ok(())
}

#[tokio::test]
async fn revert_of_deleted_entity_is_not_found() -> TestResult {
    let client = TestClient::new();
    client.hydrate_quiz(fixtures::quiz(7, "Quiz", Vec::new())).await?;
    client.engine.delete_quiz(7).await?;

    let err = client.engine.revert(EntityKind::Quiz, 7, None).await.unwrap_err();

    assert!(matches!(err, SyncError::NotFound(_)));
    assert!(!err.is_retryable());
    assert!(client.dump()?.is_empty());
    Ok(())
}
