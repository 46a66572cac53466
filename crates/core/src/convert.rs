//! Question-type conversion.
//!
//! `convert` computes the answer set a question should have after its type
//! changes. It is pure: the engine runs it once to predict the result
//! locally, and the server recomputes its own version, which always wins.

use crate::ids::RecordId;
use crate::model::{renumber, Answer, Question, QuestionType};
use crate::patch::default_answers;

/// Minimum number of options a multiple-choice question is padded to.
pub const MIN_CHOICES: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub answers: Vec<Answer>,
    pub correct_answer: Option<String>,
}

pub fn convert(question: &Question, target: QuestionType) -> Conversion {
    let existing = renumber(question.answers.clone());
    match target {
        QuestionType::Boolean => to_boolean(question, &existing),
        QuestionType::MultipleChoice => to_multiple_choice(question, existing),
        QuestionType::OpenEnded => to_open_ended(question),
    }
}

/// The question as it is predicted to look after changing to `target`.
pub fn apply_conversion(question: &Question, target: QuestionType) -> Question {
    let Conversion {
        answers,
        correct_answer,
    } = convert(question, target);
    let mut next = question.clone();
    next.question_type = target;
    next.answers = answers;
    next.correct_answer = correct_answer;
    next
}

fn is_boolean_shaped(question: &Question, answers: &[Answer]) -> bool {
    if question.question_type == QuestionType::Boolean {
        return true;
    }
    let has = |text: &str| answers.iter().any(|a| a.answer_text.eq_ignore_ascii_case(text));
    answers.len() == 2 && has("true") && has("false")
}

fn to_boolean(question: &Question, existing: &[Answer]) -> Conversion {
    let false_correct = is_boolean_shaped(question, existing)
        && existing
            .iter()
            .any(|a| a.is_correct && a.answer_text.eq_ignore_ascii_case("false"));

    let answers = with_reused_ids(
        existing,
        vec![("True".to_string(), !false_correct), ("False".to_string(), false_correct)],
    );
    Conversion {
        answers,
        correct_answer: None,
    }
}

fn to_multiple_choice(question: &Question, existing: Vec<Answer>) -> Conversion {
    let mut answers = if question.question_type == QuestionType::OpenEnded || existing.len() < 2 {
        let defaults = default_answers(QuestionType::MultipleChoice)
            .into_iter()
            .map(|a| (a.answer_text, a.is_correct))
            .collect();
        with_reused_ids(&existing, defaults)
    } else if question.question_type == QuestionType::Boolean {
        let mut padded = existing;
        while padded.len() < MIN_CHOICES {
            let position = padded.len();
            padded.push(Answer::new(placeholder(position), false, position as i32));
        }
        renumber(padded)
    } else {
        existing
    };

    if !answers.iter().any(|a| a.is_correct)
        && let Some(first) = answers.first_mut()
    {
        first.is_correct = true;
    }

    Conversion {
        answers,
        correct_answer: None,
    }
}

fn to_open_ended(question: &Question) -> Conversion {
    let correct_answer = question
        .correct_answer
        .clone()
        .filter(|s| !s.is_empty())
        .or_else(|| question.correct_answer_text().map(str::to_string))
        .or_else(|| question.explanation.clone().filter(|s| !s.is_empty()));

    Conversion {
        answers: Vec::new(),
        correct_answer,
    }
}

fn placeholder(index: usize) -> String {
    match u8::try_from(index) {
        Ok(i) if i < 26 => format!("Option {}", (b'A' + i) as char),
        _ => format!("Option {}", index + 1),
    }
}

/// Builds answers in order, keeping the id of whichever existing answer held
/// the same slot so repeated conversions settle on identical answer sets.
fn with_reused_ids(existing: &[Answer], slots: Vec<(String, bool)>) -> Vec<Answer> {
    slots
        .into_iter()
        .enumerate()
        .map(|(index, (answer_text, is_correct))| Answer {
            id: existing.get(index).map(|a| a.id).unwrap_or_else(RecordId::local),
            answer_text,
            is_correct,
            position: index as i32,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(question_type: QuestionType, answers: &[(&str, bool)]) -> Question {
        Question {
            id: RecordId::Server(1),
            quiz_id: Some(RecordId::Server(7)),
            question_text: "What is Rust?".into(),
            question_type,
            explanation: Some("A systems language".into()),
            correct_answer: None,
            answers: answers
                .iter()
                .enumerate()
                .map(|(i, (text, correct))| Answer {
                    id: RecordId::Server(100 + i as i64),
                    answer_text: text.to_string(),
                    is_correct: *correct,
                    position: i as i32,
                })
                .collect(),
            position: 0,
            created_at: None,
            updated_at: None,
        }
    }

    fn shape(answers: &[Answer]) -> Vec<(&str, bool, i32)> {
        answers
            .iter()
            .map(|a| (a.answer_text.as_str(), a.is_correct, a.position))
            .collect()
    }

    #[test]
    fn multiple_choice_to_boolean() {
        let q = question(
            QuestionType::MultipleChoice,
            &[("A", true), ("B", false), ("C", false), ("D", false)],
        );
        let converted = convert(&q, QuestionType::Boolean);
        assert_eq!(shape(&converted.answers), vec![("True", true, 0), ("False", false, 1)]);
    }

    #[test]
    fn boolean_to_boolean_keeps_correct_side() {
        let q = question(QuestionType::Boolean, &[("True", false), ("False", true)]);
        let converted = convert(&q, QuestionType::Boolean);
        assert_eq!(shape(&converted.answers), vec![("True", false, 0), ("False", true, 1)]);
    }

    #[test]
    fn true_false_choices_in_any_order_keep_correct_side() {
        let q = question(QuestionType::MultipleChoice, &[("False", true), ("True", false)]);
        let c = convert(&q, QuestionType::Boolean);
        assert_eq!(shape(&c.answers), vec![("True", false, 0), ("False", true, 1)]);
    }

    #[test]
    fn boolean_to_multiple_choice_pads_to_four() {
        let q = question(QuestionType::Boolean, &[("True", false), ("False", true)]);
        let converted = convert(&q, QuestionType::MultipleChoice);
        assert_eq!(
            shape(&converted.answers),
            vec![
                ("True", false, 0),
                ("False", true, 1),
                ("Option C", false, 2),
                ("Option D", false, 3),
            ]
        );
    }

    #[test]
    fn open_ended_to_multiple_choice_uses_defaults() {
        let q = question(QuestionType::OpenEnded, &[]);
        let converted = convert(&q, QuestionType::MultipleChoice);
        assert_eq!(converted.answers.len(), 4);
        assert!(converted.answers[0].is_correct);
        assert_eq!(converted.answers[0].answer_text, "Option A");
    }

    #[test]
    fn multiple_choice_with_no_correct_answer_gets_one() {
        let q = question(
            QuestionType::MultipleChoice,
            &[("A", false), ("B", false), ("C", false)],
        );
        let converted = convert(&q, QuestionType::MultipleChoice);
        assert_eq!(converted.answers.len(), 3);
        assert_eq!(converted.answers.iter().filter(|a| a.is_correct).count(), 1);
        assert!(converted.answers[0].is_correct);
    }

    #[test]
    fn open_ended_correct_answer_priority() {
        let mut q = question(QuestionType::MultipleChoice, &[("A", false), ("B", true)]);
        assert_eq!(convert(&q, QuestionType::OpenEnded).correct_answer.as_deref(), Some("B"));

        q.correct_answer = Some("Explicit".into());
        assert_eq!(
            convert(&q, QuestionType::OpenEnded).correct_answer.as_deref(),
            Some("Explicit")
        );

        let bare = question(QuestionType::MultipleChoice, &[("A", false)]);
        let converted = convert(&bare, QuestionType::OpenEnded);
        assert!(converted.answers.is_empty());
        assert_eq!(converted.correct_answer.as_deref(), Some("A systems language"));
    }

    #[test]
    fn conversion_is_idempotent() {
        let starts = [
            question(QuestionType::MultipleChoice, &[("A", true), ("B", false), ("C", false)]),
            question(QuestionType::Boolean, &[("True", true), ("False", false)]),
            question(QuestionType::OpenEnded, &[]),
            question(QuestionType::MultipleChoice, &[("Only", false)]),
        ];
        let targets = [
            QuestionType::MultipleChoice,
            QuestionType::Boolean,
            QuestionType::OpenEnded,
        ];
        for start in &starts {
            for target in targets {
                let once = apply_conversion(start, target);
                let twice = apply_conversion(&once, target);
                assert_eq!(once, twice, "{:?} -> {:?}", start.question_type, target);

                if target.has_choices() {
                    assert!(once.correct_count() >= 1);
                } else {
                    assert!(once.answers.is_empty());
                }
            }
        }
    }
}
