//! Boundary checks on decoded responses. Anything that fails here is
//! reported as a rejection and never reaches the cache.

use std::collections::HashSet;

use quizsync_core::{
    Document, HistoryEntry, Project, Question, Quiz, RecordId, Snapshot, UserHistory,
};

use crate::error::GatewayError;
use crate::target::Target;

fn server_id(id: RecordId, what: &str) -> Result<i64, GatewayError> {
    id.as_server()
        .ok_or_else(|| GatewayError::rejected(format!("{what} without server id: {id}")))
}

pub fn question(mut question: Question) -> Result<Question, GatewayError> {
    let id = server_id(question.id, "question")?;
    let mut seen = HashSet::new();
    for answer in &question.answers {
        let answer_id = server_id(answer.id, "answer")?;
        if !seen.insert(answer_id) {
            return Err(GatewayError::rejected(format!(
                "question {id} lists answer {answer_id} twice"
            )));
        }
        if answer.position < 0 {
            return Err(GatewayError::rejected(format!(
                "answer {answer_id} has negative position {}",
                answer.position
            )));
        }
    }
    question.answers.sort_by_key(|a| a.position);
    Ok(question)
}

pub fn quiz(mut quiz: Quiz) -> Result<Quiz, GatewayError> {
    let id = server_id(quiz.id, "quiz")?;
    let mut seen = HashSet::new();
    let mut questions = Vec::with_capacity(quiz.questions.len());
    for q in quiz.questions {
        let mut q = question(q)?;
        if !seen.insert(q.id) {
            return Err(GatewayError::rejected(format!(
                "quiz {id} lists question {} twice",
                q.id
            )));
        }
        q.quiz_id = Some(quiz.id);
        questions.push(q);
    }
    questions.sort_by_key(|q| q.position);
    quiz.questions = questions;
    Ok(quiz)
}

pub fn project(mut project: Project) -> Result<Project, GatewayError> {
    let id = server_id(project.id, "project")?;
    let mut seen = HashSet::new();
    for entry in &project.quizzes {
        let quiz_id = server_id(entry.quiz_id, "project quiz")?;
        if !seen.insert(quiz_id) {
            return Err(GatewayError::rejected(format!(
                "project {id} lists quiz {quiz_id} twice"
            )));
        }
    }
    project.quizzes.sort_by_key(|q| q.position);
    Ok(project)
}

pub fn document(document: Document) -> Result<Document, GatewayError> {
    server_id(document.id, "document")?;
    Ok(document)
}

pub fn snapshot(snapshot: Snapshot) -> Result<Snapshot, GatewayError> {
    Ok(match snapshot {
        Snapshot::Quiz(q) => quiz(q)?.into(),
        Snapshot::Question(q) => question(q)?.into(),
        Snapshot::Project(p) => project(p)?.into(),
        Snapshot::Document(d) => document(d)?.into(),
    })
}

/// Validates a snapshot returned for `target` and checks it is the entity asked for.
pub fn snapshot_for(target: Target, value: Snapshot) -> Result<Snapshot, GatewayError> {
    let value = snapshot(value)?;
    if value.key() != target.key() {
        return Err(GatewayError::rejected(format!(
            "asked for {target}, server returned {}",
            value.key()
        )));
    }
    Ok(value)
}

/// Checks every entry belongs to `target` and orders the log most recent first.
pub fn history(
    target: Target,
    mut entries: Vec<HistoryEntry>,
) -> Result<Vec<HistoryEntry>, GatewayError> {
    for entry in &entries {
        if entry.entity_id != RecordId::Server(target.id()) {
            return Err(GatewayError::rejected(format!(
                "history entry {} belongs to {}, not {target}",
                entry.id, entry.entity_id
            )));
        }
    }
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
    Ok(entries)
}

/// Checks every entry of the user's logs refers to a confirmed entity.
pub fn user_history(history: UserHistory) -> Result<UserHistory, GatewayError> {
    let logs = [
        ("quiz", &history.quiz_history),
        ("question", &history.question_history),
        ("project", &history.project_history),
    ];
    for (what, entries) in logs {
        for entry in entries {
            server_id(entry.entity_id, &format!("{what} history entry {}", entry.id))?;
        }
    }
    Ok(history)
}
