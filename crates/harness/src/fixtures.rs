//! Builders for entities seeded into the mock server. Ids are local until
//! the server assigns them.

use quizsync_core::{Answer, Document, Project, Question, QuestionType, Quiz, RecordId};

pub fn question(text: &str, question_type: QuestionType, answers: &[(&str, bool)]) -> Question {
    Question {
        id: RecordId::local(),
        quiz_id: None,
        question_text: text.to_string(),
        question_type,
        explanation: Some(String::new()),
        correct_answer: None,
        answers: answers
            .iter()
            .enumerate()
            .map(|(i, (answer, correct))| Answer::new(*answer, *correct, i as i32))
            .collect(),
        position: 0,
        created_at: None,
        updated_at: None,
    }
}

/// Four options with the first one correct.
pub fn multiple_choice(text: &str) -> Question {
    question(
        text,
        QuestionType::MultipleChoice,
        &[("A", true), ("B", false), ("C", false), ("D", false)],
    )
}

pub fn boolean(text: &str, answer: bool) -> Question {
    question(text, QuestionType::Boolean, &[("True", answer), ("False", !answer)])
}

/// A quiz under `id` whose questions are positioned in list order.
pub fn quiz(id: i64, title: &str, questions: Vec<Question>) -> Quiz {
    Quiz {
        id: RecordId::Server(id),
        title: title.to_string(),
        topic: "general".to_string(),
        description: None,
        use_default_prompt: true,
        custom_prompt: None,
        questions: questions
            .into_iter()
            .enumerate()
            .map(|(i, mut q)| {
                q.position = i as i32;
                q.quiz_id = Some(RecordId::Server(id));
                q
            })
            .collect(),
        document_sources: Vec::new(),
        created_at: None,
        updated_at: None,
    }
}

pub fn project(id: i64, title: &str) -> Project {
    Project {
        id: RecordId::Server(id),
        title: title.to_string(),
        description: None,
        use_default_prompt: true,
        custom_prompt: None,
        quizzes: Vec::new(),
        created_at: None,
        updated_at: None,
    }
}

pub fn document(id: i64, filename: &str) -> Document {
    Document {
        id: RecordId::Server(id),
        filename: filename.to_string(),
        file_type: "text/plain".to_string(),
        content: format!("contents of {filename}"),
        embeddings_created: true,
        created_at: None,
    }
}
