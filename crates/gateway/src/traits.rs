use std::sync::Arc;

use async_trait::async_trait;

use quizsync_core::patch::{
    DocumentDraft, DocumentPatch, GenerateRequest, ProjectDraft, ProjectPatch, QuestionDraft,
    QuestionPatch, QuizDraft, QuizPatch,
};
use quizsync_core::{
    Document, HistoryEntry, Project, ProjectQuiz, Question, QuestionType, Quiz, Snapshot,
    UserHistory,
};

use crate::error::GatewayError;
use crate::target::Target;

/// The remote service. Every call either returns the canonical server copy
/// of what it touched or a typed error; implementations never retry.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn create_quiz(&self, draft: &QuizDraft) -> Result<Quiz, GatewayError>;
    async fn update_quiz(&self, id: i64, patch: &QuizPatch) -> Result<Quiz, GatewayError>;
    async fn delete_quiz(&self, id: i64) -> Result<(), GatewayError>;
    /// `use_embeddings` lets generation draw on the quiz's source documents.
    async fn regenerate_quiz(&self, id: i64, use_embeddings: bool) -> Result<Quiz, GatewayError>;
    async fn generate_quiz(&self, request: &GenerateRequest) -> Result<Quiz, GatewayError>;

    async fn create_question(
        &self,
        quiz_id: i64,
        draft: &QuestionDraft,
    ) -> Result<Question, GatewayError>;
    async fn update_question(
        &self,
        quiz_id: Option<i64>,
        id: i64,
        patch: &QuestionPatch,
    ) -> Result<Question, GatewayError>;
    async fn delete_question(&self, quiz_id: Option<i64>, id: i64) -> Result<(), GatewayError>;
    async fn regenerate_question(
        &self,
        quiz_id: i64,
        id: i64,
        use_document_content: bool,
    ) -> Result<Question, GatewayError>;
    async fn change_question_type(
        &self,
        quiz_id: Option<i64>,
        id: i64,
        question_type: QuestionType,
        use_document_content: bool,
    ) -> Result<Question, GatewayError>;

    async fn create_project(&self, draft: &ProjectDraft) -> Result<Project, GatewayError>;
    async fn update_project(&self, id: i64, patch: &ProjectPatch) -> Result<Project, GatewayError>;
    async fn delete_project(&self, id: i64) -> Result<(), GatewayError>;
    async fn add_quiz_to_project(
        &self,
        project_id: i64,
        quiz_id: i64,
        position: i32,
    ) -> Result<Project, GatewayError>;
    async fn remove_quiz_from_project(
        &self,
        project_id: i64,
        quiz_id: i64,
    ) -> Result<Project, GatewayError>;
    async fn reorder_project_quizzes(
        &self,
        project_id: i64,
        order: &[ProjectQuiz],
    ) -> Result<Project, GatewayError>;

    async fn create_document(&self, draft: &DocumentDraft) -> Result<Document, GatewayError>;
    async fn update_document(&self, id: i64, patch: &DocumentPatch)
    -> Result<Document, GatewayError>;
    async fn delete_document(&self, id: i64) -> Result<(), GatewayError>;

    async fn fetch(&self, target: Target) -> Result<Snapshot, GatewayError>;
    /// Most recent first.
    async fn list_history(
        &self,
        target: Target,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, GatewayError>;
    async fn revert(&self, target: Target, history_id: i64) -> Result<Snapshot, GatewayError>;
    /// The signed-in user's edits across every entity kind.
    async fn list_user_history(&self, limit: usize) -> Result<UserHistory, GatewayError>;
}

#[async_trait]
impl<G: Gateway + ?Sized> Gateway for Arc<G> {
    async fn create_quiz(&self, draft: &QuizDraft) -> Result<Quiz, GatewayError> {
        (**self).create_quiz(draft).await
    }

    async fn update_quiz(&self, id: i64, patch: &QuizPatch) -> Result<Quiz, GatewayError> {
        (**self).update_quiz(id, patch).await
    }

    async fn delete_quiz(&self, id: i64) -> Result<(), GatewayError> {
        (**self).delete_quiz(id).await
    }

    async fn regenerate_quiz(&self, id: i64, use_embeddings: bool) -> Result<Quiz, GatewayError> {
        (**self).regenerate_quiz(id, use_embeddings).await
    }

    async fn generate_quiz(&self, request: &GenerateRequest) -> Result<Quiz, GatewayError> {
        (**self).generate_quiz(request).await
    }

    async fn create_question(
        &self,
        quiz_id: i64,
        draft: &QuestionDraft,
    ) -> Result<Question, GatewayError> {
        (**self).create_question(quiz_id, draft).await
    }

    async fn update_question(
        &self,
        quiz_id: Option<i64>,
        id: i64,
        patch: &QuestionPatch,
    ) -> Result<Question, GatewayError> {
        (**self).update_question(quiz_id, id, patch).await
    }

    async fn delete_question(&self, quiz_id: Option<i64>, id: i64) -> Result<(), GatewayError> {
        (**self).delete_question(quiz_id, id).await
    }

    async fn regenerate_question(
        &self,
        quiz_id: i64,
        id: i64,
        use_document_content: bool,
    ) -> Result<Question, GatewayError> {
        (**self)
            .regenerate_question(quiz_id, id, use_document_content)
            .await
    }

    async fn change_question_type(
        &self,
        quiz_id: Option<i64>,
        id: i64,
        question_type: QuestionType,
        use_document_content: bool,
    ) -> Result<Question, GatewayError> {
        (**self)
            .change_question_type(quiz_id, id, question_type, use_document_content)
            .await
    }

    async fn create_project(&self, draft: &ProjectDraft) -> Result<Project, GatewayError> {
        (**self).create_project(draft).await
    }

    async fn update_project(&self, id: i64, patch: &ProjectPatch) -> Result<Project, GatewayError> {
        (**self).update_project(id, patch).await
    }

    async fn delete_project(&self, id: i64) -> Result<(), GatewayError> {
        (**self).delete_project(id).await
    }

    async fn add_quiz_to_project(
        &self,
        project_id: i64,
        quiz_id: i64,
        position: i32,
    ) -> Result<Project, GatewayError> {
        (**self).add_quiz_to_project(project_id, quiz_id, position).await
    }

    async fn remove_quiz_from_project(
        &self,
        project_id: i64,
        quiz_id: i64,
    ) -> Result<Project, GatewayError> {
        (**self).remove_quiz_from_project(project_id, quiz_id).await
    }

    async fn reorder_project_quizzes(
        &self,
        project_id: i64,
        order: &[ProjectQuiz],
    ) -> Result<Project, GatewayError> {
        (**self).reorder_project_quizzes(project_id, order).await
    }

    async fn create_document(&self, draft: &DocumentDraft) -> Result<Document, GatewayError> {
        (**self).create_document(draft).await
    }

    async fn update_document(
        &self,
        id: i64,
        patch: &DocumentPatch,
    ) -> Result<Document, GatewayError> {
        (**self).update_document(id, patch).await
    }

    async fn delete_document(&self, id: i64) -> Result<(), GatewayError> {
        (**self).delete_document(id).await
    }

    async fn fetch(&self, target: Target) -> Result<Snapshot, GatewayError> {
        (**self).fetch(target).await
    }

    async fn list_history(
        &self,
        target: Target,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, GatewayError> {
        (**self).list_history(target, limit).await
    }

    async fn revert(&self, target: Target, history_id: i64) -> Result<Snapshot, GatewayError> {
        (**self).revert(target, history_id).await
    }

    async fn list_user_history(&self, limit: usize) -> Result<UserHistory, GatewayError> {
        (**self).list_user_history(limit).await
    }
}
