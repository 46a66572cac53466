use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::ids::{EntityKey, EntityKind, RecordId};
use crate::model::{Snapshot, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Create,
    Update,
    Delete,
    Regenerate,
    Revert,
    AddQuiz,
    RemoveQuiz,
    Reorder,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Regenerate => "regenerate",
            Self::Revert => "revert",
            Self::AddQuiz => "add_quiz",
            Self::RemoveQuiz => "remove_quiz",
            Self::Reorder => "reorder",
        }
    }
}

/// One append-only record of the server's edit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    #[serde(alias = "quiz_id", alias = "question_id", alias = "project_id")]
    pub entity_id: RecordId,
    pub action: ActionType,
    #[serde(with = "crate::time")]
    pub timestamp: Timestamp,
    /// State of the entity before the action. Partial: only the fields the
    /// action touched are recorded.
    #[serde(default)]
    pub previous_state: Option<Value>,
}

impl HistoryEntry {
    pub fn is_revertible(&self) -> bool {
        matches!(&self.previous_state, Some(Value::Object(map)) if !map.is_empty())
    }

    /// Human-readable one-liner for activity views.
    pub fn summary(&self) -> String {
        let Some(Value::Object(state)) = &self.previous_state else {
            return match self.action {
                ActionType::Create => "Created new item",
                ActionType::Update => "Updated item",
                ActionType::Delete => "Deleted item",
                ActionType::Regenerate => "Regenerated content",
                ActionType::Revert => "Reverted to previous state",
                ActionType::AddQuiz => "Added quiz to project",
                ActionType::RemoveQuiz => "Removed quiz from project",
                ActionType::Reorder => "Reordered items",
            }
            .to_string();
        };

        match self.action {
            ActionType::Create => "Created new item".to_string(),
            ActionType::Update => {
                let changed: Vec<&str> = [
                    ("title", "title"),
                    ("description", "description"),
                    ("question_text", "question text"),
                    ("answers", "answers"),
                    ("custom_prompt", "custom prompt"),
                ]
                .iter()
                .filter(|(key, _)| state.contains_key(*key))
                .map(|(_, label)| *label)
                .collect();
                if changed.is_empty() {
                    "Updated item properties".to_string()
                } else {
                    format!("Updated {}", changed.join(", "))
                }
            }
            ActionType::Delete => "Deleted item".to_string(),
            ActionType::Regenerate => match state.get("questions") {
                Some(Value::Array(questions)) => format!("Regenerated {} questions", questions.len()),
                _ if state.contains_key("question_text") => "Regenerated question".to_string(),
                _ => "Regenerated content".to_string(),
            },
            ActionType::Revert => "Reverted to previous state".to_string(),
            ActionType::AddQuiz => {
                let count = match state.get("quizzes") {
                    Some(Value::Array(quizzes)) => quizzes.len(),
                    _ => 0,
                };
                format!("Added quiz to project with {count} existing quizzes")
            }
            ActionType::RemoveQuiz => "Removed quiz from project".to_string(),
            ActionType::Reorder => "Reordered items".to_string(),
        }
    }
}

/// Every edit the signed-in user made, one log per entity kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserHistory {
    #[serde(default)]
    pub quiz_history: Vec<HistoryEntry>,
    #[serde(default)]
    pub question_history: Vec<HistoryEntry>,
    #[serde(default)]
    pub project_history: Vec<HistoryEntry>,
}

/// One line of the user's activity feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub kind: EntityKind,
    pub entry: HistoryEntry,
}

impl Activity {
    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.kind, self.entry.entity_id)
    }

    pub fn summary(&self) -> String {
        self.entry.summary()
    }
}

impl UserHistory {
    pub fn len(&self) -> usize {
        self.quiz_history.len() + self.question_history.len() + self.project_history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Merges the three logs most recent first and keeps the first `limit`.
    pub fn into_feed(self, limit: usize) -> Vec<Activity> {
        let tagged = |kind: EntityKind, entries: Vec<HistoryEntry>| {
            entries.into_iter().map(move |entry| Activity { kind, entry })
        };
        let mut feed: Vec<Activity> = tagged(EntityKind::Quiz, self.quiz_history)
            .chain(tagged(EntityKind::Question, self.question_history))
            .chain(tagged(EntityKind::Project, self.project_history))
            .collect();
        feed.sort_by(|a, b| {
            b.entry
                .timestamp
                .cmp(&a.entry.timestamp)
                .then(b.entry.id.cmp(&a.entry.id))
        });
        feed.truncate(limit);
        feed
    }
}

const PRESERVED_FIELDS: &[&str] = &["id", "quiz_id", "created_at", "updated_at", "user_id"];

/// Predicts the entity after reverting to `previous_state`: every field the
/// recorded state carries overrides the current snapshot, the rest is kept.
pub fn restore_from(current: &Snapshot, previous_state: &Value) -> Result<Snapshot, CoreError> {
    let Value::Object(recorded) = previous_state else {
        return Err(CoreError::InvalidData("history state is not an object".into()));
    };

    let encoded = serde_json::to_value(current).map_err(|e| CoreError::Serialization(e.to_string()))?;
    let Value::Object(mut envelope) = encoded else {
        return Err(CoreError::Serialization("snapshot did not encode as an object".into()));
    };
    let Some(Value::Object(fields)) = envelope.get_mut("snapshot") else {
        return Err(CoreError::Serialization("snapshot envelope missing body".into()));
    };

    overlay(fields, recorded);

    let restored: Snapshot = serde_json::from_value(Value::Object(envelope))
        .map_err(|e| CoreError::InvalidData(format!("history state does not fit {}: {e}", current.kind())))?;

    Ok(match restored {
        Snapshot::Quiz(mut quiz) => {
            for question in &mut quiz.questions {
                question.quiz_id = Some(quiz.id);
            }
            Snapshot::Quiz(quiz)
        }
        other => other,
    })
}

fn overlay(fields: &mut Map<String, Value>, recorded: &Map<String, Value>) {
    for (key, value) in recorded {
        if PRESERVED_FIELDS.contains(&key.as_str()) {
            continue;
        }
        fields.insert(key.clone(), value.clone());
    }
}
