//! In-process stand-in for the quiz service.
//!
//! Keeps every entity under integer ids, appends a history entry for each
//! accepted action the way the service does, and lets tests inject failures,
//! go offline, or hold responses at a gate.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use tokio::sync::watch;

use quizsync_core::convert::apply_conversion;
use quizsync_core::history::restore_from;
use quizsync_core::patch::{
    DocumentDraft, DocumentPatch, GenerateRequest, ProjectDraft, ProjectPatch, QuestionDraft,
    QuestionPatch, QuizDraft, QuizPatch,
};
use quizsync_core::{
    ActionType, Answer, Document, EntityKey, EntityKind, HistoryEntry, Project, ProjectQuiz,
    Question, QuestionType, Quiz, RecordId, Snapshot, UserHistory,
};
use quizsync_gateway::{Gateway, GatewayError, Target};

#[derive(Default)]
struct Store {
    next_id: i64,
    next_history_id: i64,
    quizzes: BTreeMap<i64, Quiz>,
    /// Questions not assigned to any quiz.
    loose: BTreeMap<i64, Question>,
    projects: BTreeMap<i64, Project>,
    documents: BTreeMap<i64, Document>,
    history: Vec<(EntityKey, HistoryEntry)>,
    /// Document-sourcing flags received by generation calls, in order.
    source_flags: Vec<(&'static str, bool)>,
}

fn not_found(what: impl std::fmt::Display) -> GatewayError {
    GatewayError::NotFound(format!("{what} not found"))
}

fn server(id: i64) -> RecordId {
    RecordId::Server(id)
}

impl Store {
    fn allocate(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn claim(&mut self, id: RecordId) -> RecordId {
        match id.as_server() {
            Some(n) => {
                self.next_id = self.next_id.max(n);
                id
            }
            None => server(self.allocate()),
        }
    }

    fn assign_question(&mut self, question: &mut Question) {
        question.id = self.claim(question.id);
        for answer in &mut question.answers {
            answer.id = self.claim(answer.id);
        }
    }

    fn assign_quiz(&mut self, quiz: &mut Quiz) {
        quiz.id = self.claim(quiz.id);
        for question in &mut quiz.questions {
            self.assign_question(question);
            question.quiz_id = Some(quiz.id);
        }
    }

    fn record(&mut self, key: EntityKey, action: ActionType, previous_state: Option<Value>) {
        self.next_history_id += 1;
        self.history.push((
            key,
            HistoryEntry {
                id: self.next_history_id,
                entity_id: key.id,
                action,
                timestamp: Utc::now(),
                previous_state,
            },
        ));
    }

    fn quiz_mut(&mut self, id: i64) -> Result<&mut Quiz, GatewayError> {
        self.quizzes.get_mut(&id).ok_or_else(|| not_found(format!("quiz {id}")))
    }

    fn project_mut(&mut self, id: i64) -> Result<&mut Project, GatewayError> {
        self.projects.get_mut(&id).ok_or_else(|| not_found(format!("project {id}")))
    }

    fn question_mut(&mut self, quiz_id: Option<i64>, id: i64) -> Result<&mut Question, GatewayError> {
        let found = match quiz_id {
            Some(quiz_id) => self
                .quizzes
                .get_mut(&quiz_id)
                .and_then(|quiz| quiz.questions.iter_mut().find(|q| q.id == server(id))),
            None => self.loose.get_mut(&id),
        };
        found.ok_or_else(|| not_found(format!("question {id}")))
    }

    fn snapshot(&self, target: Target) -> Result<Snapshot, GatewayError> {
        let found = match target {
            Target::Quiz(id) => self.quizzes.get(&id).cloned().map(Snapshot::from),
            Target::Question { quiz_id, id } => {
                let nested = self
                    .quizzes
                    .iter()
                    .filter(|(qid, _)| quiz_id.is_none_or(|wanted| wanted == **qid))
                    .find_map(|(_, quiz)| quiz.question(server(id)).cloned());
                nested.or_else(|| self.loose.get(&id).cloned()).map(Snapshot::from)
            }
            Target::Project(id) => self.projects.get(&id).cloned().map(Snapshot::from),
            Target::Document(id) => self.documents.get(&id).cloned().map(Snapshot::from),
        };
        found.ok_or_else(|| not_found(target))
    }

    fn replace(&mut self, snapshot: Snapshot) -> Result<(), GatewayError> {
        match snapshot {
            Snapshot::Quiz(quiz) => {
                let id = quiz.id.require_server("quiz").map_err(|e| GatewayError::rejected(e.to_string()))?;
                self.quizzes.insert(id, quiz);
            }
            Snapshot::Question(question) => {
                let id = question.id.require_server("question").map_err(|e| GatewayError::rejected(e.to_string()))?;
                match question.quiz_id.and_then(|quiz_id| quiz_id.as_server()) {
                    Some(quiz_id) => {
                        let quiz = self.quiz_mut(quiz_id)?;
                        *quiz = quiz.with_question(question, None);
                    }
                    None => {
                        self.loose.insert(id, question);
                    }
                }
            }
            Snapshot::Project(project) => {
                let id = project.id.require_server("project").map_err(|e| GatewayError::rejected(e.to_string()))?;
                self.projects.insert(id, project);
            }
            Snapshot::Document(document) => {
                let id = document.id.require_server("document").map_err(|e| GatewayError::rejected(e.to_string()))?;
                self.documents.insert(id, document);
            }
        }
        Ok(())
    }

    fn revert(&mut self, target: Target, history_id: i64) -> Result<Snapshot, GatewayError> {
        let key = target.key();
        let current = self.snapshot(target)?;
        let state = self
            .history
            .iter()
            .find(|(k, entry)| *k == key && entry.id == history_id)
            .map(|(_, entry)| entry.previous_state.clone())
            .ok_or_else(|| not_found(format!("history entry {history_id}")))?
            .ok_or_else(|| GatewayError::rejected("history entry has no previous state"))?;

        let mut restored = restore_from(&current, &state).map_err(|e| GatewayError::rejected(e.to_string()))?;
        match &mut restored {
            Snapshot::Quiz(quiz) => {
                self.assign_quiz(quiz);
                quiz.updated_at = Some(Utc::now());
            }
            Snapshot::Question(question) => {
                self.assign_question(question);
                question.updated_at = Some(Utc::now());
            }
            Snapshot::Project(project) => project.updated_at = Some(Utc::now()),
            Snapshot::Document(_) => return Err(GatewayError::rejected("documents keep no history")),
        }

        let recorded = fields_of(&current, &state);
        self.replace(restored.clone())?;
        self.record(key, ActionType::Revert, Some(recorded));
        Ok(restored)
    }
}

/// The current values of the fields `like` carries.
fn fields_of(snapshot: &Snapshot, like: &Value) -> Value {
    let body = match serde_json::to_value(snapshot) {
        Ok(Value::Object(mut envelope)) => envelope.remove("snapshot"),
        _ => None,
    };
    let (Some(Value::Object(body)), Value::Object(like)) = (body, like) else {
        return Value::Object(Map::new());
    };
    Value::Object(
        body.into_iter()
            .filter(|(field, _)| like.contains_key(field))
            .collect(),
    )
}

fn quiz_state(quiz: &Quiz) -> Value {
    json!({
        "title": quiz.title,
        "topic": quiz.topic,
        "description": quiz.description,
        "use_default_prompt": quiz.use_default_prompt,
        "custom_prompt": quiz.custom_prompt,
    })
}

fn question_state(question: &Question) -> Value {
    json!({
        "question_text": question.question_text,
        "question_type": question.question_type,
        "explanation": question.explanation,
        "position": question.position,
        "answers": question.answers,
    })
}

fn project_state(project: &Project) -> Value {
    json!({
        "title": project.title,
        "description": project.description,
        "use_default_prompt": project.use_default_prompt,
        "custom_prompt": project.custom_prompt,
    })
}

fn membership_state(project: &Project) -> Value {
    json!({ "quizzes": project.quizzes })
}

/// What the service's generator produces for one question slot.
fn generated_question(topic: &str, position: i32) -> Question {
    Question {
        id: RecordId::local(),
        quiz_id: None,
        question_text: format!("Generated question {} about {topic}", position + 1),
        question_type: QuestionType::MultipleChoice,
        explanation: Some(format!("Generated explanation {}", position + 1)),
        correct_answer: None,
        answers: (0..4)
            .map(|i| Answer::new(format!("Generated option {}", i + 1), i == 0, i))
            .collect(),
        position,
        created_at: Some(Utc::now()),
        updated_at: None,
    }
}

pub struct MockServer {
    store: Mutex<Store>,
    /// Injected failures, each optionally bound to one call label.
    failures: Mutex<VecDeque<(Option<&'static str>, GatewayError)>>,
    offline: AtomicBool,
    gate: watch::Sender<bool>,
    calls: watch::Sender<Vec<&'static str>>,
}

impl Default for MockServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockServer {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store::default()),
            failures: Mutex::new(VecDeque::new()),
            offline: AtomicBool::new(false),
            gate: watch::Sender::new(false),
            calls: watch::Sender::new(Vec::new()),
        }
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        match self.store.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn failures(&self) -> MutexGuard<'_, VecDeque<(Option<&'static str>, GatewayError)>> {
        match self.failures.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // ========================================================================
    // Test controls
    // ========================================================================

    /// The next call that passes the gate fails with `error`.
    pub fn fail_next(&self, error: GatewayError) {
        self.failures().push_back((None, error));
    }

    /// The next `label` call that passes the gate fails with `error`.
    pub fn fail_next_on(&self, label: &'static str, error: GatewayError) {
        self.failures().push_back((Some(label), error));
    }

    fn take_failure(&self, label: &'static str) -> Option<GatewayError> {
        let mut failures = self.failures();
        let index = failures
            .iter()
            .position(|(only, _)| only.is_none_or(|only| only == label))?;
        failures.remove(index).map(|(_, error)| error)
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Calls arriving from now on wait until `release`.
    pub fn hold(&self) {
        self.gate.send_replace(true);
    }

    pub fn release(&self) {
        self.gate.send_replace(false);
    }

    /// Labels of every call received so far, in arrival order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }

    /// Resolves once at least `n` calls have arrived.
    pub async fn wait_for_calls(&self, n: usize) {
        let mut rx = self.calls.subscribe();
        let _ = rx.wait_for(|calls| calls.len() >= n).await;
    }

    async fn enter(&self, label: &'static str) -> Result<(), GatewayError> {
        self.calls.send_modify(|calls| calls.push(label));
        let mut gate = self.gate.subscribe();
        let opened = gate.wait_for(|held| !*held).await.is_ok();
        if !opened {
            return Err(GatewayError::Network("server shut down".into()));
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(GatewayError::Network("connection refused".into()));
        }
        match self.take_failure(label) {
            Some(error) => {
                log::debug!("mock server: failing {label} with {error}");
                Err(error)
            }
            None => Ok(()),
        }
    }

    // ========================================================================
    // Seeding and inspection
    // ========================================================================

    /// Stores `quiz` as-is, assigning server ids wherever it carries local
    /// ones. Ids already set are kept.
    pub fn seed_quiz(&self, mut quiz: Quiz) -> Quiz {
        let mut store = self.store();
        store.assign_quiz(&mut quiz);
        if let Some(id) = quiz.id.as_server() {
            store.quizzes.insert(id, quiz.clone());
        }
        quiz
    }

    pub fn seed_project(&self, mut project: Project) -> Project {
        let mut store = self.store();
        project.id = store.claim(project.id);
        if let Some(id) = project.id.as_server() {
            store.projects.insert(id, project.clone());
        }
        project
    }

    pub fn seed_document(&self, mut document: Document) -> Document {
        let mut store = self.store();
        document.id = store.claim(document.id);
        if let Some(id) = document.id.as_server() {
            store.documents.insert(id, document.clone());
        }
        document
    }

    /// Appends a history entry with a chosen id, as if the service had
    /// recorded it earlier.
    pub fn seed_history(&self, key: EntityKey, id: i64, action: ActionType, previous_state: Value) {
        let mut store = self.store();
        store.history.push((
            key,
            HistoryEntry {
                id,
                entity_id: key.id,
                action,
                timestamp: Utc::now(),
                previous_state: Some(previous_state),
            },
        ));
        store.next_history_id = store.next_history_id.max(id);
    }

    pub fn quiz(&self, id: i64) -> Option<Quiz> {
        self.store().quizzes.get(&id).cloned()
    }

    pub fn project(&self, id: i64) -> Option<Project> {
        self.store().projects.get(&id).cloned()
    }

    pub fn document(&self, id: i64) -> Option<Document> {
        self.store().documents.get(&id).cloned()
    }

    /// `(label, flag)` for every regeneration or type change received.
    pub fn source_flags(&self) -> Vec<(&'static str, bool)> {
        self.store().source_flags.clone()
    }

    /// The entity's history, oldest first.
    pub fn history(&self, key: EntityKey) -> Vec<HistoryEntry> {
        self.store()
            .history
            .iter()
            .filter(|(k, _)| *k == key)
            .map(|(_, entry)| entry.clone())
            .collect()
    }
}

#[async_trait]
impl Gateway for MockServer {
    async fn create_quiz(&self, draft: &QuizDraft) -> Result<Quiz, GatewayError> {
        self.enter("create_quiz").await?;
        let mut store = self.store();
        let mut quiz = draft.predict();
        store.assign_quiz(&mut quiz);
        quiz.created_at = Some(Utc::now());
        store.replace(quiz.clone().into())?;
        store.record(quiz.key(), ActionType::Create, None);
        Ok(quiz)
    }

    async fn update_quiz(&self, id: i64, patch: &QuizPatch) -> Result<Quiz, GatewayError> {
        self.enter("update_quiz").await?;
        let mut store = self.store();
        let quiz = store.quiz_mut(id)?;
        let previous = quiz_state(quiz);
        *quiz = patch.apply(quiz);
        quiz.updated_at = Some(Utc::now());
        let updated = quiz.clone();
        store.record(EntityKey::quiz(id), ActionType::Update, Some(previous));
        Ok(updated)
    }

    async fn delete_quiz(&self, id: i64) -> Result<(), GatewayError> {
        self.enter("delete_quiz").await?;
        let mut store = self.store();
        let quiz = store.quizzes.remove(&id).ok_or_else(|| not_found(format!("quiz {id}")))?;
        let mut previous = quiz_state(&quiz);
        if let Value::Object(fields) = &mut previous {
            fields.insert("questions".into(), json!(quiz.questions));
        }
        store.record(EntityKey::quiz(id), ActionType::Delete, Some(previous));
        Ok(())
    }

    async fn regenerate_quiz(&self, id: i64, use_embeddings: bool) -> Result<Quiz, GatewayError> {
        self.enter("regenerate_quiz").await?;
        let mut store = self.store();
        store.source_flags.push(("regenerate_quiz", use_embeddings));
        let mut quiz = store.quiz_mut(id)?.clone();
        let previous = json!({ "questions": quiz.questions });
        let count = quiz.questions.len().max(1) as i32;
        quiz.questions = (0..count).map(|i| generated_question(&quiz.topic, i)).collect();
        store.assign_quiz(&mut quiz);
        quiz.updated_at = Some(Utc::now());
        store.replace(quiz.clone().into())?;
        store.record(EntityKey::quiz(id), ActionType::Regenerate, Some(previous));
        Ok(quiz)
    }

    async fn generate_quiz(&self, request: &GenerateRequest) -> Result<Quiz, GatewayError> {
        self.enter("generate_quiz").await?;
        let mut store = self.store();
        let mut quiz = QuizDraft::new(request.topic.clone(), request.topic.clone()).predict();
        quiz.use_default_prompt = request.use_default_prompt;
        quiz.custom_prompt = request.custom_prompt.clone();
        quiz.document_sources = request.document_ids.iter().copied().map(server).collect();
        quiz.questions = (0..request.num_questions as i32)
            .map(|i| generated_question(&request.topic, i))
            .collect();
        store.assign_quiz(&mut quiz);
        quiz.created_at = Some(Utc::now());
        store.replace(quiz.clone().into())?;
        store.record(quiz.key(), ActionType::Create, None);
        Ok(quiz)
    }

    async fn create_question(&self, quiz_id: i64, draft: &QuestionDraft) -> Result<Question, GatewayError> {
        self.enter("create_question").await?;
        let mut store = self.store();
        let position = store.quiz_mut(quiz_id)?.next_position();
        let mut question = draft.predict(Some(server(quiz_id)), position);
        store.assign_question(&mut question);
        question.created_at = Some(Utc::now());
        store.replace(question.clone().into())?;
        store.record(question.key(), ActionType::Create, None);
        Ok(question)
    }

    async fn update_question(
        &self,
        quiz_id: Option<i64>,
        id: i64,
        patch: &QuestionPatch,
    ) -> Result<Question, GatewayError> {
        self.enter("update_question").await?;
        let mut store = self.store();
        let current = store.question_mut(quiz_id, id)?.clone();
        let mut updated = patch.apply(&current);
        store.assign_question(&mut updated);
        updated.updated_at = Some(Utc::now());
        store.replace(updated.clone().into())?;
        store.record(updated.key(), ActionType::Update, Some(question_state(&current)));
        Ok(updated)
    }

    async fn delete_question(&self, quiz_id: Option<i64>, id: i64) -> Result<(), GatewayError> {
        self.enter("delete_question").await?;
        let mut store = self.store();
        let current = store.question_mut(quiz_id, id)?.clone();
        match quiz_id {
            Some(quiz_id) => {
                let quiz = store.quiz_mut(quiz_id)?;
                *quiz = quiz.without_question(current.id);
            }
            None => {
                store.loose.remove(&id);
            }
        }
        store.record(current.key(), ActionType::Delete, Some(question_state(&current)));
        Ok(())
    }

    async fn regenerate_question(
        &self,
        quiz_id: i64,
        id: i64,
        use_document_content: bool,
    ) -> Result<Question, GatewayError> {
        self.enter("regenerate_question").await?;
        let mut store = self.store();
        store.source_flags.push(("regenerate_question", use_document_content));
        let current = store.question_mut(Some(quiz_id), id)?.clone();
        let topic = store.quiz_mut(quiz_id)?.topic.clone();
        let mut fresh = generated_question(&topic, current.position);
        fresh.id = current.id;
        fresh.quiz_id = current.quiz_id;
        if current.question_type != QuestionType::MultipleChoice {
            fresh = apply_conversion(&fresh, current.question_type);
        }
        store.assign_question(&mut fresh);
        store.replace(fresh.clone().into())?;
        store.record(fresh.key(), ActionType::Regenerate, Some(question_state(&current)));
        Ok(fresh)
    }

    async fn change_question_type(
        &self,
        quiz_id: Option<i64>,
        id: i64,
        question_type: QuestionType,
        use_document_content: bool,
    ) -> Result<Question, GatewayError> {
        self.enter("change_question_type").await?;
        let mut store = self.store();
        store.source_flags.push(("change_question_type", use_document_content));
        let current = store.question_mut(quiz_id, id)?.clone();
        let mut converted = apply_conversion(&current, question_type);
        // The service stores conversions as fresh answer rows.
        for answer in &mut converted.answers {
            answer.id = RecordId::local();
        }
        store.assign_question(&mut converted);
        converted.updated_at = Some(Utc::now());
        store.replace(converted.clone().into())?;
        store.record(converted.key(), ActionType::Update, Some(question_state(&current)));
        Ok(converted)
    }

    async fn create_project(&self, draft: &ProjectDraft) -> Result<Project, GatewayError> {
        self.enter("create_project").await?;
        let mut store = self.store();
        let mut project = draft.predict();
        project.id = server(store.allocate());
        project.created_at = Some(Utc::now());
        store.replace(project.clone().into())?;
        store.record(project.key(), ActionType::Create, None);
        Ok(project)
    }

    async fn update_project(&self, id: i64, patch: &ProjectPatch) -> Result<Project, GatewayError> {
        self.enter("update_project").await?;
        let mut store = self.store();
        let project = store.project_mut(id)?;
        let previous = project_state(project);
        *project = patch.apply(project);
        project.updated_at = Some(Utc::now());
        let updated = project.clone();
        store.record(updated.key(), ActionType::Update, Some(previous));
        Ok(updated)
    }

    async fn delete_project(&self, id: i64) -> Result<(), GatewayError> {
        self.enter("delete_project").await?;
        let mut store = self.store();
        let project = store.projects.remove(&id).ok_or_else(|| not_found(format!("project {id}")))?;
        store.record(project.key(), ActionType::Delete, Some(project_state(&project)));
        Ok(())
    }

    async fn add_quiz_to_project(
        &self,
        project_id: i64,
        quiz_id: i64,
        position: i32,
    ) -> Result<Project, GatewayError> {
        self.enter("add_quiz_to_project").await?;
        let mut store = self.store();
        if !store.quizzes.contains_key(&quiz_id) {
            return Err(not_found(format!("quiz {quiz_id}")));
        }
        let project = store.project_mut(project_id)?;
        let previous = membership_state(project);
        match project.quizzes.iter_mut().find(|entry| entry.quiz_id == server(quiz_id)) {
            Some(existing) => existing.position = position,
            None => project.quizzes.push(ProjectQuiz {
                quiz_id: server(quiz_id),
                position,
            }),
        }
        project.quizzes.sort_by_key(|entry| entry.position);
        let updated = project.clone();
        store.record(updated.key(), ActionType::AddQuiz, Some(previous));
        Ok(updated)
    }

    async fn remove_quiz_from_project(&self, project_id: i64, quiz_id: i64) -> Result<Project, GatewayError> {
        self.enter("remove_quiz_from_project").await?;
        let mut store = self.store();
        let project = store.project_mut(project_id)?;
        let previous = membership_state(project);
        let before = project.quizzes.len();
        project.quizzes.retain(|entry| entry.quiz_id != server(quiz_id));
        if project.quizzes.len() == before {
            return Err(not_found(format!("quiz {quiz_id} in project {project_id}")));
        }
        let updated = project.clone();
        store.record(updated.key(), ActionType::RemoveQuiz, Some(previous));
        Ok(updated)
    }

    async fn reorder_project_quizzes(
        &self,
        project_id: i64,
        order: &[ProjectQuiz],
    ) -> Result<Project, GatewayError> {
        self.enter("reorder_project_quizzes").await?;
        let mut store = self.store();
        let project = store.project_mut(project_id)?;
        let previous = membership_state(project);
        for entry in &mut project.quizzes {
            if let Some(moved) = order.iter().find(|o| o.quiz_id == entry.quiz_id) {
                entry.position = moved.position;
            }
        }
        project.quizzes.sort_by_key(|entry| entry.position);
        let updated = project.clone();
        store.record(updated.key(), ActionType::Reorder, Some(previous));
        Ok(updated)
    }

    async fn create_document(&self, draft: &DocumentDraft) -> Result<Document, GatewayError> {
        self.enter("create_document").await?;
        let mut store = self.store();
        let mut document = draft.predict();
        document.id = server(store.allocate());
        document.embeddings_created = true;
        document.created_at = Some(Utc::now());
        store.replace(document.clone().into())?;
        Ok(document)
    }

    async fn update_document(&self, id: i64, patch: &DocumentPatch) -> Result<Document, GatewayError> {
        self.enter("update_document").await?;
        let mut store = self.store();
        let document = store
            .documents
            .get_mut(&id)
            .ok_or_else(|| not_found(format!("document {id}")))?;
        *document = patch.apply(document);
        Ok(document.clone())
    }

    async fn delete_document(&self, id: i64) -> Result<(), GatewayError> {
        self.enter("delete_document").await?;
        self.store()
            .documents
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(format!("document {id}")))
    }

    async fn fetch(&self, target: Target) -> Result<Snapshot, GatewayError> {
        self.enter("fetch").await?;
        self.store().snapshot(target)
    }

    async fn list_history(&self, target: Target, limit: usize) -> Result<Vec<HistoryEntry>, GatewayError> {
        self.enter("list_history").await?;
        let key = target.key();
        Ok(self
            .store()
            .history
            .iter()
            .rev()
            .filter(|(k, _)| *k == key)
            .map(|(_, entry)| entry.clone())
            .take(limit)
            .collect())
    }

    async fn revert(&self, target: Target, history_id: i64) -> Result<Snapshot, GatewayError> {
        self.enter("revert").await?;
        self.store().revert(target, history_id)
    }

    async fn list_user_history(&self, limit: usize) -> Result<UserHistory, GatewayError> {
        self.enter("list_user_history").await?;
        let store = self.store();
        let entries_of = |kind: EntityKind| -> Vec<HistoryEntry> {
            store
                .history
                .iter()
                .rev()
                .filter(|(k, _)| k.kind == kind)
                .map(|(_, entry)| entry.clone())
                .take(limit)
                .collect()
        };
        Ok(UserHistory {
            quiz_history: entries_of(EntityKind::Quiz),
            question_history: entries_of(EntityKind::Question),
            project_history: entries_of(EntityKind::Project),
        })
    }
}
