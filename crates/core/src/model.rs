use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;
use crate::ids::{EntityKey, EntityKind, RecordId};

pub use crate::time::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    Boolean,
    OpenEnded,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MultipleChoice => "multiple_choice",
            Self::Boolean => "boolean",
            Self::OpenEnded => "open_ended",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "multiple_choice" => Ok(Self::MultipleChoice),
            "boolean" => Ok(Self::Boolean),
            "open_ended" => Ok(Self::OpenEnded),
            _ => Err(CoreError::InvalidData(format!("unknown question type: {s}"))),
        }
    }

    /// Types whose answer set carries exactly one correct answer.
    pub fn has_choices(&self) -> bool {
        !matches!(self, Self::OpenEnded)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    #[serde(default)]
    pub id: RecordId,
    pub answer_text: String,
    pub is_correct: bool,
    #[serde(default)]
    pub position: i32,
}

impl Answer {
    pub fn new(answer_text: impl Into<String>, is_correct: bool, position: i32) -> Self {
        Self {
            id: RecordId::local(),
            answer_text: answer_text.into(),
            is_correct,
            position,
        }
    }
}

/// Sorts answers by position and rewrites positions to 0..N-1.
pub fn renumber(mut answers: Vec<Answer>) -> Vec<Answer> {
    answers.sort_by_key(|a| a.position);
    for (index, answer) in answers.iter_mut().enumerate() {
        answer.position = index as i32;
    }
    answers
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(default)]
    pub id: RecordId,
    #[serde(default)]
    pub quiz_id: Option<RecordId>,
    pub question_text: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub correct_answer: Option<String>,
    #[serde(default)]
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub position: i32,
    #[serde(default, with = "crate::time::option")]
    pub created_at: Option<Timestamp>,
    #[serde(default, with = "crate::time::option")]
    pub updated_at: Option<Timestamp>,
}

impl Question {
    pub fn key(&self) -> EntityKey {
        EntityKey::question(self.id)
    }

    pub fn correct_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_correct).count()
    }

    pub fn correct_answer_text(&self) -> Option<&str> {
        self.answers
            .iter()
            .find(|a| a.is_correct)
            .map(|a| a.answer_text.as_str())
    }

    fn strip_timestamps(&mut self) {
        self.created_at = None;
        self.updated_at = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    #[serde(default)]
    pub id: RecordId,
    pub title: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub use_default_prompt: bool,
    #[serde(default)]
    pub custom_prompt: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default, with = "document_sources")]
    pub document_sources: Vec<RecordId>,
    #[serde(default, with = "crate::time::option")]
    pub created_at: Option<Timestamp>,
    #[serde(default, with = "crate::time::option")]
    pub updated_at: Option<Timestamp>,
}

impl Quiz {
    pub fn key(&self) -> EntityKey {
        EntityKey::quiz(self.id)
    }

    pub fn question(&self, id: RecordId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Inserts or replaces the question with the same id, keeping the list
    /// sorted by position. `previous_id` is the id the question was listed
    /// under before, when it differs (a temporary id being rewritten).
    pub fn with_question(&self, question: Question, previous_id: Option<RecordId>) -> Quiz {
        let mut quiz = self.clone();
        let old_id = previous_id.unwrap_or(question.id);
        quiz.questions.retain(|q| q.id != old_id && q.id != question.id);
        quiz.questions.push(question);
        quiz.questions.sort_by_key(|q| q.position);
        quiz
    }

    pub fn without_question(&self, id: RecordId) -> Quiz {
        let mut quiz = self.clone();
        quiz.questions.retain(|q| q.id != id);
        quiz
    }

    pub fn next_position(&self) -> i32 {
        self.questions.len() as i32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectQuiz {
    pub quiz_id: RecordId,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub id: RecordId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub use_default_prompt: bool,
    #[serde(default)]
    pub custom_prompt: Option<String>,
    #[serde(default)]
    pub quizzes: Vec<ProjectQuiz>,
    #[serde(default, with = "crate::time::option")]
    pub created_at: Option<Timestamp>,
    #[serde(default, with = "crate::time::option")]
    pub updated_at: Option<Timestamp>,
}

impl Project {
    pub fn key(&self) -> EntityKey {
        EntityKey::project(self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub id: RecordId,
    pub filename: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub embeddings_created: bool,
    #[serde(default, with = "crate::time::option")]
    pub created_at: Option<Timestamp>,
}

impl Document {
    pub fn key(&self) -> EntityKey {
        EntityKey::document(self.id)
    }
}

/// A complete, immutable value for one cached entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "snapshot", rename_all = "snake_case")]
pub enum Snapshot {
    Quiz(Quiz),
    Question(Question),
    Project(Project),
    Document(Document),
}

impl Snapshot {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Quiz(_) => EntityKind::Quiz,
            Self::Question(_) => EntityKind::Question,
            Self::Project(_) => EntityKind::Project,
            Self::Document(_) => EntityKind::Document,
        }
    }

    pub fn id(&self) -> RecordId {
        match self {
            Self::Quiz(q) => q.id,
            Self::Question(q) => q.id,
            Self::Project(p) => p.id,
            Self::Document(d) => d.id,
        }
    }

    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.kind(), self.id())
    }

    pub fn with_id(&self, id: RecordId) -> Snapshot {
        let mut snapshot = self.clone();
        match &mut snapshot {
            Self::Quiz(q) => q.id = id,
            Self::Question(q) => q.id = id,
            Self::Project(p) => p.id = id,
            Self::Document(d) => d.id = id,
        }
        snapshot
    }

    /// The same snapshot with every server timestamp cleared, nested ones included.
    pub fn without_timestamps(&self) -> Snapshot {
        let mut snapshot = self.clone();
        match &mut snapshot {
            Self::Quiz(q) => {
                q.created_at = None;
                q.updated_at = None;
                q.questions.iter_mut().for_each(Question::strip_timestamps);
            }
            Self::Question(q) => q.strip_timestamps(),
            Self::Project(p) => {
                p.created_at = None;
                p.updated_at = None;
            }
            Self::Document(d) => d.created_at = None,
        }
        snapshot
    }

    /// Content hash of the timestamp-free snapshot.
    pub fn fingerprint(&self) -> Result<blake3::Hash, CoreError> {
        let bytes = self.without_timestamps().to_msgpack()?;
        Ok(blake3::hash(&bytes))
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, CoreError> {
        rmp_serde::to_vec_named(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, CoreError> {
        rmp_serde::from_slice(bytes).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn as_quiz(&self) -> Option<&Quiz> {
        match self {
            Self::Quiz(q) => Some(q),
            _ => None,
        }
    }

    pub fn as_question(&self) -> Option<&Question> {
        match self {
            Self::Question(q) => Some(q),
            _ => None,
        }
    }

    pub fn as_project(&self) -> Option<&Project> {
        match self {
            Self::Project(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Self::Document(d) => Some(d),
            _ => None,
        }
    }

    pub fn into_quiz(self) -> Result<Quiz, CoreError> {
        match self {
            Self::Quiz(q) => Ok(q),
            other => Err(other.mismatch(EntityKind::Quiz)),
        }
    }

    pub fn into_question(self) -> Result<Question, CoreError> {
        match self {
            Self::Question(q) => Ok(q),
            other => Err(other.mismatch(EntityKind::Question)),
        }
    }

    pub fn into_project(self) -> Result<Project, CoreError> {
        match self {
            Self::Project(p) => Ok(p),
            other => Err(other.mismatch(EntityKind::Project)),
        }
    }

    pub fn into_document(self) -> Result<Document, CoreError> {
        match self {
            Self::Document(d) => Ok(d),
            other => Err(other.mismatch(EntityKind::Document)),
        }
    }

    fn mismatch(&self, expected: EntityKind) -> CoreError {
        CoreError::KindMismatch {
            expected: expected.as_str(),
            actual: self.kind().as_str(),
        }
    }
}

impl From<Quiz> for Snapshot {
    fn from(quiz: Quiz) -> Self {
        Self::Quiz(quiz)
    }
}

impl From<Question> for Snapshot {
    fn from(question: Question) -> Self {
        Self::Question(question)
    }
}

impl From<Project> for Snapshot {
    fn from(project: Project) -> Self {
        Self::Project(project)
    }
}

impl From<Document> for Snapshot {
    fn from(document: Document) -> Self {
        Self::Document(document)
    }
}

fn default_true() -> bool {
    true
}

/// The service stores document sources as `{"document_ids": [...]}`; older
/// payloads carry a bare list or null.
mod document_sources {
    use super::*;

    #[derive(Serialize)]
    struct Wrapped<'a> {
        document_ids: &'a [RecordId],
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Wrapped {
            #[serde(default)]
            document_ids: Vec<RecordId>,
        },
        List(Vec<RecordId>),
    }

    pub fn serialize<S: Serializer>(ids: &[RecordId], serializer: S) -> Result<S::Ok, S::Error> {
        Wrapped { document_ids: ids }.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<RecordId>, D::Error> {
        Ok(match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::Wrapped { document_ids }) => document_ids,
            Some(Raw::List(ids)) => ids,
            None => Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_question(id: i64, position: i32) -> Question {
        Question {
            id: RecordId::Server(id),
            quiz_id: Some(RecordId::Server(1)),
            question_text: format!("Question {id}"),
            question_type: QuestionType::MultipleChoice,
            explanation: None,
            correct_answer: None,
            answers: vec![
                Answer { id: RecordId::Server(id * 10), answer_text: "A".into(), is_correct: true, position: 0 },
                Answer { id: RecordId::Server(id * 10 + 1), answer_text: "B".into(), is_correct: false, position: 1 },
            ],
            position,
            created_at: Some(Utc::now()),
            updated_at: None,
        }
    }

    #[test]
    fn quiz_decodes_service_payload() {
        let json = r#"{
            "id": 7, "user_id": 1, "title": "Rust", "topic": "lang",
            "description": null, "use_default_prompt": true, "custom_prompt": null,
            "created_at": "2024-01-01T00:00:00.123456", "updated_at": "2024-01-02T08:30:00",
            "document_sources": {"document_ids": [3, 4]},
            "questions": [{
                "id": 11, "quiz_id": 7, "question_text": "Is Rust fast?",
                "question_type": "boolean", "explanation": "yes", "position": 0,
                "created_at": "2024-01-01T00:00:00Z", "updated_at": "2024-01-01T00:00:00Z",
                "answers": [
                    {"id": 1, "question_id": 11, "answer_text": "True", "is_correct": true, "position": 0},
                    {"id": 2, "question_id": 11, "answer_text": "False", "is_correct": false, "position": 1}
                ]
            }]
        }"#;
        let quiz: Quiz = serde_json::from_str(json).unwrap();
        assert_eq!(quiz.id, RecordId::Server(7));
        assert_eq!(quiz.document_sources, vec![RecordId::Server(3), RecordId::Server(4)]);
        assert_eq!(quiz.questions[0].question_type, QuestionType::Boolean);
        assert_eq!(quiz.questions[0].correct_answer_text(), Some("True"));
        let created = quiz.created_at.unwrap();
        assert_eq!(created.timestamp_subsec_micros(), 123_456);
        assert!(quiz.updated_at.unwrap() > created);
    }

    #[test]
    fn with_question_rewrites_temporary_id() {
        let quiz = Quiz {
            id: RecordId::Server(1),
            title: "Quiz".into(),
            topic: String::new(),
            description: None,
            use_default_prompt: true,
            custom_prompt: None,
            questions: vec![sample_question(1, 0)],
            document_sources: Vec::new(),
            created_at: None,
            updated_at: None,
        };
        let mut temp = sample_question(0, 1);
        temp.id = RecordId::local();
        let predicted = quiz.with_question(temp.clone(), None);
        assert_eq!(predicted.questions.len(), 2);

        let confirmed = sample_question(2, 1);
        let reconciled = predicted.with_question(confirmed, Some(temp.id));
        let ids: Vec<_> = reconciled.questions.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![RecordId::Server(1), RecordId::Server(2)]);
    }

    #[test]
    fn fingerprint_ignores_timestamps() {
        let a = Snapshot::from(sample_question(5, 0));
        let mut question = sample_question(5, 0);
        question.updated_at = Some(Utc::now());
        let b = Snapshot::from(question);
        assert_ne!(a, b);
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }

    #[test]
    fn msgpack_codec_keeps_snapshot() {
        let snapshot = Snapshot::from(sample_question(9, 3));
        let bytes = snapshot.to_msgpack().unwrap();
        assert_eq!(Snapshot::from_msgpack(&bytes).unwrap(), snapshot);
    }

    #[test]
    fn into_wrong_kind_is_mismatch() {
        let snapshot = Snapshot::from(sample_question(9, 3));
        assert!(matches!(
            snapshot.into_quiz(),
            Err(CoreError::KindMismatch { expected: "quiz", actual: "question" })
        ));
    }
}
