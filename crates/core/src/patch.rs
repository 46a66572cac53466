//! Request bodies for mutations, with the pure local prediction of each.

use serde::{Deserialize, Serialize};

use crate::ids::RecordId;
use crate::model::{renumber, Answer, Document, Project, Question, QuestionType, Quiz};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerDraft {
    pub answer_text: String,
    pub is_correct: bool,
    pub position: i32,
}

impl AnswerDraft {
    pub fn new(answer_text: impl Into<String>, is_correct: bool, position: i32) -> Self {
        Self {
            answer_text: answer_text.into(),
            is_correct,
            position,
        }
    }

    fn predict(&self) -> Answer {
        Answer::new(self.answer_text.clone(), self.is_correct, self.position)
    }
}

/// Answers the service creates when a new question arrives without any.
pub fn default_answers(question_type: QuestionType) -> Vec<AnswerDraft> {
    match question_type {
        QuestionType::Boolean => vec![
            AnswerDraft::new("True", true, 0),
            AnswerDraft::new("False", false, 1),
        ],
        QuestionType::MultipleChoice => vec![
            AnswerDraft::new("Option A", true, 0),
            AnswerDraft::new("Option B", false, 1),
            AnswerDraft::new("Option C", false, 2),
            AnswerDraft::new("Option D", false, 3),
        ],
        QuestionType::OpenEnded => Vec::new(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizDraft {
    pub title: String,
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub use_default_prompt: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<String>,
}

impl QuizDraft {
    pub fn new(title: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            topic: topic.into(),
            description: None,
            use_default_prompt: true,
            custom_prompt: None,
        }
    }

    pub fn predict(&self) -> Quiz {
        Quiz {
            id: RecordId::local(),
            title: self.title.clone(),
            topic: self.topic.clone(),
            description: self.description.clone(),
            use_default_prompt: self.use_default_prompt,
            custom_prompt: self.custom_prompt.clone(),
            questions: Vec::new(),
            document_sources: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_default_prompt: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<String>,
}

impl QuizPatch {
    pub fn apply(&self, quiz: &Quiz) -> Quiz {
        let mut next = quiz.clone();
        if let Some(title) = &self.title {
            next.title = title.clone();
        }
        if let Some(topic) = &self.topic {
            next.topic = topic.clone();
        }
        if let Some(description) = &self.description {
            next.description = Some(description.clone());
        }
        if let Some(use_default) = self.use_default_prompt {
            next.use_default_prompt = use_default;
        }
        if let Some(prompt) = &self.custom_prompt {
            next.custom_prompt = Some(prompt.clone());
        }
        next
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_type: Option<QuestionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub answers: Vec<AnswerDraft>,
}

impl QuestionDraft {
    pub fn question_type(&self) -> QuestionType {
        self.question_type.unwrap_or(QuestionType::MultipleChoice)
    }

    /// The answers the question will be created with: the supplied ones, or
    /// the service defaults for the type.
    pub fn effective_answers(&self) -> Vec<AnswerDraft> {
        if self.answers.is_empty() {
            default_answers(self.question_type())
        } else {
            self.answers.clone()
        }
    }

    pub fn predict(&self, quiz_id: Option<RecordId>, position: i32) -> Question {
        let answers = self.effective_answers().iter().map(AnswerDraft::predict).collect();
        Question {
            id: RecordId::local(),
            quiz_id,
            question_text: self
                .question_text
                .clone()
                .unwrap_or_else(|| format!("Question {}", position + 1)),
            question_type: self.question_type(),
            explanation: Some(self.explanation.clone().unwrap_or_default()),
            correct_answer: None,
            answers: renumber(answers),
            position,
            created_at: None,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_type: Option<QuestionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answers: Option<Vec<AnswerDraft>>,
}

impl QuestionPatch {
    pub fn apply(&self, question: &Question) -> Question {
        let mut next = question.clone();
        if let Some(text) = &self.question_text {
            next.question_text = text.clone();
        }
        if let Some(question_type) = self.question_type {
            next.question_type = question_type;
        }
        if let Some(explanation) = &self.explanation {
            next.explanation = Some(explanation.clone());
        }
        if let Some(position) = self.position {
            next.position = position;
        }
        if let Some(answers) = &self.answers {
            next.answers = renumber(answers.iter().map(AnswerDraft::predict).collect());
        }
        next
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDraft {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub use_default_prompt: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<String>,
}

impl ProjectDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            use_default_prompt: true,
            custom_prompt: None,
        }
    }

    pub fn predict(&self) -> Project {
        Project {
            id: RecordId::local(),
            title: self.title.clone(),
            description: self.description.clone(),
            use_default_prompt: self.use_default_prompt,
            custom_prompt: self.custom_prompt.clone(),
            quizzes: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_default_prompt: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<String>,
}

impl ProjectPatch {
    pub fn apply(&self, project: &Project) -> Project {
        let mut next = project.clone();
        if let Some(title) = &self.title {
            next.title = title.clone();
        }
        if let Some(description) = &self.description {
            next.description = Some(description.clone());
        }
        if let Some(use_default) = self.use_default_prompt {
            next.use_default_prompt = use_default;
        }
        if let Some(prompt) = &self.custom_prompt {
            next.custom_prompt = Some(prompt.clone());
        }
        next
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDraft {
    pub filename: String,
    pub file_type: String,
    pub content: String,
}

impl DocumentDraft {
    pub fn predict(&self) -> Document {
        Document {
            id: RecordId::local(),
            filename: self.filename.clone(),
            file_type: self.file_type.clone(),
            content: self.content.clone(),
            embeddings_created: false,
            created_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl DocumentPatch {
    pub fn apply(&self, document: &Document) -> Document {
        let mut next = document.clone();
        if let Some(filename) = &self.filename {
            next.filename = filename.clone();
        }
        next
    }
}

/// Input to server-side AI generation of a whole quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub topic: String,
    pub num_questions: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub document_ids: Vec<i64>,
    pub use_default_prompt: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<String>,
    pub use_embeddings: bool,
}

impl GenerateRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            num_questions: 10,
            document_ids: Vec::new(),
            use_default_prompt: true,
            custom_prompt: None,
            use_embeddings: true,
        }
    }
}
