use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;

use quizsync_core::patch::{
    DocumentDraft, DocumentPatch, GenerateRequest, ProjectDraft, ProjectPatch, QuestionDraft,
    QuestionPatch, QuizDraft, QuizPatch,
};
use quizsync_core::{
    Document, EntityKind, HistoryEntry, Project, ProjectQuiz, Question, QuestionType, Quiz,
    RecordId, Snapshot, UserHistory,
};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::target::Target;
use crate::traits::Gateway;
use crate::validate;

#[derive(Serialize)]
struct ChangeTypeBody {
    question_type: QuestionType,
}

#[derive(Serialize)]
struct ProjectQuizBody {
    quiz_id: i64,
    position: i32,
}

/// REST client for the quiz service.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    config: GatewayConfig,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self, GatewayError> {
        Self::new(GatewayConfig::from_env())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{path}", self.config.base());
        log::debug!("{method} {url}");
        let mut req = self.client.request(method, url);
        if let Some(token) = &self.config.token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, GatewayError> {
        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(GatewayError::from_status(status, &text));
        }
        Ok(resp.json().await?)
    }

    async fn send_empty(&self, req: RequestBuilder) -> Result<(), GatewayError> {
        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(GatewayError::from_status(status, &text));
        }
        Ok(())
    }

    async fn get_quiz(&self, id: i64) -> Result<Quiz, GatewayError> {
        let quiz = self
            .send(self.request(Method::GET, &Target::Quiz(id).path()))
            .await?;
        validate::quiz(quiz)
    }

    async fn get_project(&self, id: i64) -> Result<Project, GatewayError> {
        let project = self
            .send(self.request(Method::GET, &Target::Project(id).path()))
            .await?;
        validate::project(project)
    }

    async fn send_snapshot(
        &self,
        target: Target,
        req: RequestBuilder,
    ) -> Result<Snapshot, GatewayError> {
        let snapshot = match target.kind() {
            EntityKind::Quiz => Snapshot::from(self.send::<Quiz>(req).await?),
            EntityKind::Question => Snapshot::from(self.send::<Question>(req).await?),
            EntityKind::Project => Snapshot::from(self.send::<Project>(req).await?),
            EntityKind::Document => Snapshot::from(self.send::<Document>(req).await?),
        };
        validate::snapshot_for(target, snapshot)
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn create_quiz(&self, draft: &QuizDraft) -> Result<Quiz, GatewayError> {
        let quiz = self
            .send(self.request(Method::POST, "/quizzes").json(draft))
            .await?;
        validate::quiz(quiz)
    }

    async fn update_quiz(&self, id: i64, patch: &QuizPatch) -> Result<Quiz, GatewayError> {
        let req = self.request(Method::PUT, &Target::Quiz(id).path()).json(patch);
        validate::quiz(self.send(req).await?)
    }

    async fn delete_quiz(&self, id: i64) -> Result<(), GatewayError> {
        self.send_empty(self.request(Method::DELETE, &Target::Quiz(id).path()))
            .await
    }

    async fn regenerate_quiz(&self, id: i64, use_embeddings: bool) -> Result<Quiz, GatewayError> {
        let path = format!("{}/regenerate", Target::Quiz(id).path());
        let req = self
            .request(Method::POST, &path)
            .query(&[("use_embeddings", use_embeddings)]);
        validate::quiz(self.send(req).await?)
    }

    async fn generate_quiz(&self, request: &GenerateRequest) -> Result<Quiz, GatewayError> {
        let req = self.request(Method::POST, "/quizzes/generate").json(request);
        validate::quiz(self.send(req).await?)
    }

    async fn create_question(
        &self,
        quiz_id: i64,
        draft: &QuestionDraft,
    ) -> Result<Question, GatewayError> {
        let path = format!("{}/questions", Target::Quiz(quiz_id).path());
        let req = self.request(Method::POST, &path).json(draft);
        validate::question(self.send(req).await?)
    }

    async fn update_question(
        &self,
        quiz_id: Option<i64>,
        id: i64,
        patch: &QuestionPatch,
    ) -> Result<Question, GatewayError> {
        let path = Target::Question { quiz_id, id }.path();
        let req = self.request(Method::PUT, &path).json(patch);
        validate::question(self.send(req).await?)
    }

    async fn delete_question(&self, quiz_id: Option<i64>, id: i64) -> Result<(), GatewayError> {
        let path = Target::Question { quiz_id, id }.path();
        self.send_empty(self.request(Method::DELETE, &path)).await
    }

    async fn regenerate_question(
        &self,
        quiz_id: i64,
        id: i64,
        use_document_content: bool,
    ) -> Result<Question, GatewayError> {
        let path = format!(
            "{}/regenerate",
            Target::Question {
                quiz_id: Some(quiz_id),
                id
            }
            .path()
        );
        let req = self
            .request(Method::POST, &path)
            .query(&[("use_document_content", use_document_content)]);
        validate::question(self.send(req).await?)
    }

    async fn change_question_type(
        &self,
        quiz_id: Option<i64>,
        id: i64,
        question_type: QuestionType,
        use_document_content: bool,
    ) -> Result<Question, GatewayError> {
        let path = format!("{}/change-type", Target::Question { quiz_id, id }.path());
        let req = self
            .request(Method::POST, &path)
            .query(&[("use_document_content", use_document_content)])
            .json(&ChangeTypeBody { question_type });
        validate::question(self.send(req).await?)
    }

    async fn create_project(&self, draft: &ProjectDraft) -> Result<Project, GatewayError> {
        let req = self.request(Method::POST, "/projects").json(draft);
        validate::project(self.send(req).await?)
    }

    async fn update_project(&self, id: i64, patch: &ProjectPatch) -> Result<Project, GatewayError> {
        let req = self
            .request(Method::PUT, &Target::Project(id).path())
            .json(patch);
        // The update response omits quiz membership, so re-read the full project.
        self.send_empty(req).await?;
        self.get_project(id).await
    }

    async fn delete_project(&self, id: i64) -> Result<(), GatewayError> {
        self.send_empty(self.request(Method::DELETE, &Target::Project(id).path()))
            .await
    }

    async fn add_quiz_to_project(
        &self,
        project_id: i64,
        quiz_id: i64,
        position: i32,
    ) -> Result<Project, GatewayError> {
        let path = format!("{}/quizzes", Target::Project(project_id).path());
        let req = self
            .request(Method::POST, &path)
            .json(&ProjectQuizBody { quiz_id, position });
        validate::project(self.send(req).await?)
    }

    async fn remove_quiz_from_project(
        &self,
        project_id: i64,
        quiz_id: i64,
    ) -> Result<Project, GatewayError> {
        let path = format!("{}/quizzes/{quiz_id}", Target::Project(project_id).path());
        self.send_empty(self.request(Method::DELETE, &path)).await?;
        self.get_project(project_id).await
    }

    async fn reorder_project_quizzes(
        &self,
        project_id: i64,
        order: &[ProjectQuiz],
    ) -> Result<Project, GatewayError> {
        let body = order
            .iter()
            .map(|entry| {
                Ok(ProjectQuizBody {
                    quiz_id: entry.quiz_id.as_server().ok_or_else(|| {
                        GatewayError::rejected(format!("unconfirmed quiz {}", entry.quiz_id))
                    })?,
                    position: entry.position,
                })
            })
            .collect::<Result<Vec<_>, GatewayError>>()?;
        let path = format!("{}/quizzes/reorder", Target::Project(project_id).path());
        let req = self.request(Method::PUT, &path).json(&body);
        validate::project(self.send(req).await?)
    }

    /// Uploads the draft as a multipart file. The service extracts the text
    /// and picks the stored file type from the extension.
    async fn create_document(&self, draft: &DocumentDraft) -> Result<Document, GatewayError> {
        let mut part = Part::bytes(draft.content.clone().into_bytes()).file_name(draft.filename.clone());
        if !draft.file_type.is_empty() {
            part = part.mime_str(&draft.file_type)?;
        }
        let req = self
            .request(Method::POST, "/documents/upload")
            .multipart(Form::new().part("file", part));
        validate::document(self.send(req).await?)
    }

    /// The service keeps uploaded documents immutable.
    async fn update_document(
        &self,
        id: i64,
        _patch: &DocumentPatch,
    ) -> Result<Document, GatewayError> {
        Err(GatewayError::rejected(format!(
            "{} cannot be edited, upload a new document instead",
            Target::Document(id)
        )))
    }

    async fn delete_document(&self, id: i64) -> Result<(), GatewayError> {
        self.send_empty(self.request(Method::DELETE, &Target::Document(id).path()))
            .await
    }

    async fn fetch(&self, target: Target) -> Result<Snapshot, GatewayError> {
        match target {
            // Questions have no read route of their own under a quiz.
            Target::Question {
                quiz_id: Some(quiz_id),
                id,
            } => {
                let quiz = self.get_quiz(quiz_id).await?;
                quiz.question(RecordId::Server(id))
                    .cloned()
                    .map(Snapshot::from)
                    .ok_or_else(|| GatewayError::NotFound(target.to_string()))
            }
            _ => {
                self.send_snapshot(target, self.request(Method::GET, &target.path()))
                    .await
            }
        }
    }

    async fn list_history(
        &self,
        target: Target,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, GatewayError> {
        let path = format!("{}/history", target.path());
        let req = self
            .request(Method::GET, &path)
            .query(&[("limit", limit)]);
        let entries = self.send(req).await?;
        validate::history(target, entries)
    }

    async fn revert(&self, target: Target, history_id: i64) -> Result<Snapshot, GatewayError> {
        let path = format!("{}/revert", target.path());
        let req = self
            .request(Method::POST, &path)
            .query(&[("history_id", history_id)]);
        self.send_snapshot(target, req).await
    }

    async fn list_user_history(&self, limit: usize) -> Result<UserHistory, GatewayError> {
        let req = self
            .request(Method::GET, "/history/user")
            .query(&[("limit", limit)]);
        validate::user_history(self.send(req).await?)
    }
}
