use std::fmt;

use quizsync_core::{EntityKey, EntityKind};

/// A server-side entity addressed by its confirmed id. Questions carry their
/// owning quiz, since the service nests question routes under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Quiz(i64),
    Question { quiz_id: Option<i64>, id: i64 },
    Project(i64),
    Document(i64),
}

impl Target {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Quiz(_) => EntityKind::Quiz,
            Self::Question { .. } => EntityKind::Question,
            Self::Project(_) => EntityKind::Project,
            Self::Document(_) => EntityKind::Document,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Self::Quiz(id) | Self::Project(id) | Self::Document(id) => *id,
            Self::Question { id, .. } => *id,
        }
    }

    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.kind(), self.id())
    }

    /// Resource path relative to the API base.
    pub fn path(&self) -> String {
        match self {
            Self::Quiz(id) => format!("/quizzes/{id}"),
            Self::Question {
                quiz_id: Some(quiz_id),
                id,
            } => format!("/quizzes/{quiz_id}/questions/{id}"),
            Self::Question { quiz_id: None, id } => format!("/questions/{id}"),
            Self::Project(id) => format!("/projects/{id}"),
            Self::Document(id) => format!("/documents/{id}"),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind(), self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_nest_questions_under_quiz() {
        assert_eq!(Target::Quiz(7).path(), "/quizzes/7");
        assert_eq!(
            Target::Question { quiz_id: Some(7), id: 3 }.path(),
            "/quizzes/7/questions/3"
        );
        assert_eq!(Target::Question { quiz_id: None, id: 3 }.path(), "/questions/3");
        assert_eq!(Target::Document(2).key(), EntityKey::document(2));
    }
}
