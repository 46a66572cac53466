use std::collections::HashSet;

use quizsync_cache::EntityCache;
use quizsync_core::patch::{ProjectDraft, ProjectPatch};
use quizsync_core::{EntityKey, Project, ProjectQuiz, RecordId};
use quizsync_gateway::Gateway;

use crate::error::SyncError;
use crate::inflight::Lane;
use crate::request::Request;
use crate::{validate, Effect, Engine, Plan};

impl<C, G> Engine<C, G>
where
    C: EntityCache + 'static,
    G: Gateway + 'static,
{
    pub async fn create_project(&self, draft: ProjectDraft) -> Result<Project, SyncError> {
        validate::non_empty("project title", &draft.title)?;

        let predicted = draft.predict();
        let key = predicted.key();
        let locked = self.lock(&[key], Lane::Back).await?;
        let outcome = self
            .execute(
                locked,
                Plan {
                    key,
                    request: Request::CreateProject(draft),
                    effect: Effect::Store(predicted.into()),
                },
            )
            .await?;
        Ok(outcome.into_snapshot()?.into_project()?)
    }

    pub async fn update_project(
        &self,
        id: impl Into<RecordId>,
        patch: ProjectPatch,
    ) -> Result<Project, SyncError> {
        validate::optional_non_empty("project title", patch.title.as_deref())?;

        let key = EntityKey::project(id);
        let locked = self.lock(&[key], Lane::Back).await?;
        let current = self.cached_project(key.id)?;
        let server_id = self.server_id(current.key())?;
        let predicted = patch.apply(&current);
        let outcome = self
            .execute(
                locked,
                Plan {
                    key: current.key(),
                    request: Request::UpdateProject { id: server_id, patch },
                    effect: Effect::Store(predicted.into()),
                },
            )
            .await?;
        Ok(outcome.into_snapshot()?.into_project()?)
    }

    /// Deletes a project. The quizzes it listed are not touched.
    pub async fn delete_project(&self, id: impl Into<RecordId>) -> Result<(), SyncError> {
        let key = EntityKey::project(id);
        let locked = self.lock(&[key], Lane::Front).await?;
        let key = self.resolve(key);
        let server_id = self.server_id(key)?;
        self.execute(
            locked,
            Plan {
                key,
                request: Request::DeleteProject(server_id),
                effect: Effect::Remove,
            },
        )
        .await?;
        Ok(())
    }

    /// Places a quiz in the project at `position`, or after the last entry
    /// when no position is given. A quiz that is already a member moves.
    pub async fn add_quiz_to_project(
        &self,
        project_id: impl Into<RecordId>,
        quiz_id: impl Into<RecordId>,
        position: Option<i32>,
    ) -> Result<Project, SyncError> {
        if let Some(position) = position
            && position < 0
        {
            return Err(SyncError::Validation(format!(
                "position must not be negative, got {position}"
            )));
        }

        let key = EntityKey::project(project_id);
        let quiz_key = EntityKey::quiz(quiz_id);
        let locked = self.lock(&[key], Lane::Back).await?;

        let current = self.cached_project(key.id)?;
        let server_id = self.server_id(current.key())?;
        let quiz_server_id = self.server_id(quiz_key)?;
        let member = RecordId::Server(quiz_server_id);
        let position = position.unwrap_or_else(|| {
            current
                .quizzes
                .iter()
                .filter(|entry| entry.quiz_id != member)
                .map(|entry| entry.position + 1)
                .max()
                .unwrap_or(0)
        });

        let mut predicted = current.clone();
        match predicted.quizzes.iter_mut().find(|entry| entry.quiz_id == member) {
            Some(existing) => existing.position = position,
            None => predicted.quizzes.push(ProjectQuiz {
                quiz_id: member,
                position,
            }),
        }
        predicted.quizzes.sort_by_key(|entry| entry.position);

        let outcome = self
            .execute(
                locked,
                Plan {
                    key: current.key(),
                    request: Request::AddQuizToProject {
                        project_id: server_id,
                        quiz_id: quiz_server_id,
                        position,
                    },
                    effect: Effect::Store(predicted.into()),
                },
            )
            .await?;
        Ok(outcome.into_snapshot()?.into_project()?)
    }

    /// Drops a quiz reference. The remaining entries keep their positions.
    pub async fn remove_quiz_from_project(
        &self,
        project_id: impl Into<RecordId>,
        quiz_id: impl Into<RecordId>,
    ) -> Result<Project, SyncError> {
        let key = EntityKey::project(project_id);
        let quiz_key = EntityKey::quiz(quiz_id);
        let locked = self.lock(&[key], Lane::Back).await?;

        let current = self.cached_project(key.id)?;
        let server_id = self.server_id(current.key())?;
        let quiz_server_id = self.server_id(quiz_key)?;
        let member = RecordId::Server(quiz_server_id);
        if !current.quizzes.iter().any(|entry| entry.quiz_id == member) {
            return Err(SyncError::Validation(format!(
                "quiz {quiz_server_id} is not in project {server_id}"
            )));
        }

        let mut predicted = current.clone();
        predicted.quizzes.retain(|entry| entry.quiz_id != member);

        let outcome = self
            .execute(
                locked,
                Plan {
                    key: current.key(),
                    request: Request::RemoveQuizFromProject {
                        project_id: server_id,
                        quiz_id: quiz_server_id,
                    },
                    effect: Effect::Store(predicted.into()),
                },
            )
            .await?;
        Ok(outcome.into_snapshot()?.into_project()?)
    }

    /// Rewrites the project's quiz order. `order` lists every member quiz
    /// exactly once, first to last.
    pub async fn reorder_project_quizzes(
        &self,
        project_id: impl Into<RecordId>,
        order: Vec<RecordId>,
    ) -> Result<Project, SyncError> {
        let key = EntityKey::project(project_id);
        let locked = self.lock(&[key], Lane::Back).await?;

        let current = self.cached_project(key.id)?;
        let server_id = self.server_id(current.key())?;

        let mut entries = Vec::with_capacity(order.len());
        let mut seen = HashSet::new();
        for (position, quiz_id) in order.into_iter().enumerate() {
            let quiz_id = RecordId::Server(self.server_id(EntityKey::quiz(quiz_id))?);
            if !seen.insert(quiz_id) {
                return Err(SyncError::Validation(format!("quiz {quiz_id} listed twice")));
            }
            entries.push(ProjectQuiz {
                quiz_id,
                position: position as i32,
            });
        }
        let members: HashSet<RecordId> = current.quizzes.iter().map(|entry| entry.quiz_id).collect();
        if seen != members {
            return Err(SyncError::Validation(format!(
                "new order must list exactly the {} quizzes of project {server_id}",
                members.len()
            )));
        }

        let mut predicted = current.clone();
        predicted.quizzes = entries.clone();

        let outcome = self
            .execute(
                locked,
                Plan {
                    key: current.key(),
                    request: Request::ReorderProjectQuizzes {
                        project_id: server_id,
                        order: entries,
                    },
                    effect: Effect::Store(predicted.into()),
                },
            )
            .await?;
        Ok(outcome.into_snapshot()?.into_project()?)
    }
}
