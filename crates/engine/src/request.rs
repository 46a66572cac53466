use quizsync_core::patch::{
    DocumentDraft, DocumentPatch, GenerateRequest, ProjectDraft, ProjectPatch, QuestionDraft,
    QuestionPatch, QuizDraft, QuizPatch,
};
use quizsync_core::{ProjectQuiz, QuestionType, Snapshot};
use quizsync_gateway::{Gateway, GatewayError, Target};

use crate::error::SyncError;

/// One remote call, owned so it can outlive the caller's future.
#[derive(Debug, Clone)]
pub enum Request {
    CreateQuiz(QuizDraft),
    UpdateQuiz { id: i64, patch: QuizPatch },
    DeleteQuiz(i64),
    RegenerateQuiz { id: i64, use_embeddings: bool },
    GenerateQuiz(GenerateRequest),

    CreateQuestion { quiz_id: i64, draft: QuestionDraft },
    UpdateQuestion { quiz_id: Option<i64>, id: i64, patch: QuestionPatch },
    DeleteQuestion { quiz_id: Option<i64>, id: i64 },
    RegenerateQuestion { quiz_id: i64, id: i64, use_document_content: bool },
    ChangeQuestionType {
        quiz_id: Option<i64>,
        id: i64,
        question_type: QuestionType,
        use_document_content: bool,
    },

    CreateProject(ProjectDraft),
    UpdateProject { id: i64, patch: ProjectPatch },
    DeleteProject(i64),
    AddQuizToProject { project_id: i64, quiz_id: i64, position: i32 },
    RemoveQuizFromProject { project_id: i64, quiz_id: i64 },
    ReorderProjectQuizzes { project_id: i64, order: Vec<ProjectQuiz> },

    CreateDocument(DocumentDraft),
    UpdateDocument { id: i64, patch: DocumentPatch },
    DeleteDocument(i64),

    Fetch(Target),
    Revert { target: Target, history_id: i64 },
}

/// What the server says the touched entity now is.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Stored(Snapshot),
    Deleted,
}

impl Outcome {
    pub fn into_snapshot(self) -> Result<Snapshot, SyncError> {
        match self {
            Self::Stored(snapshot) => Ok(snapshot),
            Self::Deleted => Err(SyncError::ServerRejected {
                status: None,
                detail: "expected an entity, server reported a deletion".into(),
            }),
        }
    }
}

impl Request {
    pub fn label(&self) -> &'static str {
        match self {
            Self::CreateQuiz(_) => "create_quiz",
            Self::UpdateQuiz { .. } => "update_quiz",
            Self::DeleteQuiz(_) => "delete_quiz",
            Self::RegenerateQuiz { .. } => "regenerate_quiz",
            Self::GenerateQuiz(_) => "generate_quiz",
            Self::CreateQuestion { .. } => "add_question",
            Self::UpdateQuestion { .. } => "update_question",
            Self::DeleteQuestion { .. } => "delete_question",
            Self::RegenerateQuestion { .. } => "regenerate_question",
            Self::ChangeQuestionType { .. } => "change_question_type",
            Self::CreateProject(_) => "create_project",
            Self::UpdateProject { .. } => "update_project",
            Self::DeleteProject(_) => "delete_project",
            Self::AddQuizToProject { .. } => "add_quiz_to_project",
            Self::RemoveQuizFromProject { .. } => "remove_quiz_from_project",
            Self::ReorderProjectQuizzes { .. } => "reorder_project_quizzes",
            Self::CreateDocument(_) => "create_document",
            Self::UpdateDocument { .. } => "update_document",
            Self::DeleteDocument(_) => "delete_document",
            Self::Fetch(_) => "load",
            Self::Revert { .. } => "revert",
        }
    }

    pub async fn send<G: Gateway + ?Sized>(&self, gateway: &G) -> Result<Outcome, GatewayError> {
        let stored: Snapshot = match self {
            Self::CreateQuiz(draft) => gateway.create_quiz(draft).await?.into(),
            Self::UpdateQuiz { id, patch } => gateway.update_quiz(*id, patch).await?.into(),
            Self::DeleteQuiz(id) => {
                gateway.delete_quiz(*id).await?;
                return Ok(Outcome::Deleted);
            }
            Self::RegenerateQuiz { id, use_embeddings } => {
                gateway.regenerate_quiz(*id, *use_embeddings).await?.into()
            }
            Self::GenerateQuiz(request) => gateway.generate_quiz(request).await?.into(),

            Self::CreateQuestion { quiz_id, draft } => {
                gateway.create_question(*quiz_id, draft).await?.into()
            }
            Self::UpdateQuestion { quiz_id, id, patch } => {
                gateway.update_question(*quiz_id, *id, patch).await?.into()
            }
            Self::DeleteQuestion { quiz_id, id } => {
                gateway.delete_question(*quiz_id, *id).await?;
                return Ok(Outcome::Deleted);
            }
            Self::RegenerateQuestion {
                quiz_id,
                id,
                use_document_content,
            } => gateway
                .regenerate_question(*quiz_id, *id, *use_document_content)
                .await?
                .into(),
            Self::ChangeQuestionType {
                quiz_id,
                id,
                question_type,
                use_document_content,
            } => gateway
                .change_question_type(*quiz_id, *id, *question_type, *use_document_content)
                .await?
                .into(),

            Self::CreateProject(draft) => gateway.create_project(draft).await?.into(),
            Self::UpdateProject { id, patch } => gateway.update_project(*id, patch).await?.into(),
            Self::DeleteProject(id) => {
                gateway.delete_project(*id).await?;
                return Ok(Outcome::Deleted);
            }
            Self::AddQuizToProject {
                project_id,
                quiz_id,
                position,
            } => gateway
                .add_quiz_to_project(*project_id, *quiz_id, *position)
                .await?
                .into(),
            Self::RemoveQuizFromProject {
                project_id,
                quiz_id,
            } => gateway
                .remove_quiz_from_project(*project_id, *quiz_id)
                .await?
                .into(),
            Self::ReorderProjectQuizzes { project_id, order } => gateway
                .reorder_project_quizzes(*project_id, order)
                .await?
                .into(),

            Self::CreateDocument(draft) => gateway.create_document(draft).await?.into(),
            Self::UpdateDocument { id, patch } => gateway.update_document(*id, patch).await?.into(),
            Self::DeleteDocument(id) => {
                gateway.delete_document(*id).await?;
                return Ok(Outcome::Deleted);
            }

            Self::Fetch(target) => gateway.fetch(*target).await?,
            Self::Revert { target, history_id } => gateway.revert(*target, *history_id).await?,
        };
        Ok(Outcome::Stored(stored))
    }
}
