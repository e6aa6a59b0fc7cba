use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::errors::{ClientError, ClientResult};
use crate::domain::ports::{HttpMethod, RemoteGateway, TaskSpawner};
use crate::models::{
    AddAssigneesRequest, CreateProjectRequest, CreateTaskRequest, DisplayStatus, EntityId, Member,
    MemberRole, MemberScope, Project, Task, TaskRole, UpdateMemberRoleRequest,
    UpdateProfileRequest, UpdateProjectRequest, UpdateTaskRequest, User,
};
use crate::services::cache_coordinator::{AffectedIds, CacheCoordinator, MutationKind};
use crate::services::permission_service::{Action, PermissionContext, PermissionResolver};
use crate::services::state_machine::{CompletionRequest, TaskLifecycle, TransitionError};

/// Who is performing a mutation, and their role in the scope it targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: EntityId,
    pub role: MemberRole,
}

/// Write side of the client.
///
/// Every mutation is checked locally (permissions, lifecycle, input) before it
/// is sent, issued exactly once, and only after it resolves successfully are the
/// affected caches invalidated. Nothing is written to local state: the next read
/// refetches. Failures are always returned to the caller; there is no retry.
pub struct MutationService {
    gateway: Arc<dyn RemoteGateway>,
    cache: Arc<CacheCoordinator>,
}

impl MutationService {
    pub fn new(gateway: Arc<dyn RemoteGateway>, cache: Arc<CacheCoordinator>) -> Self {
        Self { gateway, cache }
    }

    // ----- projects -----

    pub async fn create_project(&self, request: CreateProjectRequest) -> ClientResult<Project> {
        require_non_blank(&request.title, "Project title")?;
        let body = to_body(&request)?;
        let project: Project = self
            .commit(
                HttpMethod::Post,
                "/projects",
                Some(body),
                MutationKind::CreateProject,
                AffectedIds::none(),
            )
            .await
            .and_then(expect_entity)?;
        info!("Created project {}", project.id);
        Ok(project)
    }

    pub async fn update_project(
        &self,
        project: &Project,
        request: UpdateProjectRequest,
    ) -> ClientResult<Project> {
        ensure(Action::EditProject, &PermissionContext::for_project(project.role))?;
        if request.is_empty() {
            return Err(ClientError::Validation("No fields to update".to_string()));
        }
        if let Some(title) = &request.title {
            require_non_blank(title, "Project title")?;
        }

        let path = format!("/projects/{}", project.id);
        self.commit(
            HttpMethod::Patch,
            &path,
            Some(to_body(&request)?),
            MutationKind::UpdateProject,
            AffectedIds::project(project.id),
        )
        .await
        .and_then(expect_entity)
    }

    pub async fn delete_project(&self, project: &Project) -> ClientResult<()> {
        ensure(Action::DeleteProject, &PermissionContext::for_project(project.role))?;
        let path = format!("/projects/{}", project.id);
        self.commit(
            HttpMethod::Delete,
            &path,
            None,
            MutationKind::DeleteProject,
            AffectedIds::project(project.id),
        )
        .await?;
        info!("Deleted project {}", project.id);
        Ok(())
    }

    /// The OWNER cannot leave; ownership is never transferred.
    pub async fn leave_project(&self, project: &Project) -> ClientResult<()> {
        ensure(Action::LeaveProject, &PermissionContext::for_project(project.role))?;
        let path = format!("/projects/{}/members/me", project.id);
        self.commit(
            HttpMethod::Delete,
            &path,
            None,
            MutationKind::LeaveProject,
            AffectedIds::project(project.id),
        )
        .await?;
        info!("Left project {}", project.id);
        Ok(())
    }

    // ----- members -----

    pub async fn update_member_role(
        &self,
        scope: MemberScope,
        viewer_role: MemberRole,
        member: &Member,
        new_role: MemberRole,
    ) -> ClientResult<Option<Member>> {
        ensure(
            Action::EditMemberRole,
            &PermissionContext::for_member(viewer_role, member.role),
        )?;
        if new_role == MemberRole::Owner {
            return Err(ClientError::Validation(
                "Ownership cannot be transferred".to_string(),
            ));
        }

        let path = format!("{}/{}", scope.members_path(), member.user_id);
        let body = to_body(&UpdateMemberRoleRequest { role: new_role })?;
        let response = self
            .commit(
                HttpMethod::Patch,
                &path,
                Some(body),
                MutationKind::UpdateMemberRole,
                AffectedIds::scope(scope),
            )
            .await?;
        decode_optional(response)
    }

    pub async fn remove_member(
        &self,
        scope: MemberScope,
        viewer_role: MemberRole,
        member: &Member,
    ) -> ClientResult<()> {
        ensure(
            Action::RemoveMember,
            &PermissionContext::for_member(viewer_role, member.role),
        )?;
        let path = format!("{}/{}", scope.members_path(), member.user_id);
        self.commit(
            HttpMethod::Delete,
            &path,
            None,
            MutationKind::RemoveMember,
            AffectedIds::scope(scope),
        )
        .await?;
        info!("Removed user {} from {:?}", member.user_id, scope);
        Ok(())
    }

    // ----- tasks -----

    pub async fn create_task(
        &self,
        project_id: EntityId,
        request: CreateTaskRequest,
    ) -> ClientResult<Task> {
        require_non_blank(&request.title, "Task title")?;
        let path = format!("/projects/{}/tasks", project_id);
        let task: Task = self
            .commit(
                HttpMethod::Post,
                &path,
                Some(to_body(&request)?),
                MutationKind::CreateTask,
                AffectedIds::project(project_id),
            )
            .await
            .and_then(expect_entity)?;
        info!("Created task {} in project {}", task.id, project_id);
        Ok(task)
    }

    /// Edits title, description and/or deadline.
    pub async fn update_task(
        &self,
        project_id: EntityId,
        viewer: Viewer,
        task: &Task,
        request: UpdateTaskRequest,
    ) -> ClientResult<Task> {
        ensure(Action::EditTask, &task_context(viewer, task))?;
        if request.is_empty() {
            return Err(ClientError::Validation("No fields to update".to_string()));
        }
        if let Some(title) = &request.title {
            require_non_blank(title, "Task title")?;
        }

        let kind = if request.is_deadline_only() {
            MutationKind::UpdateTaskDeadline
        } else {
            MutationKind::UpdateTaskDetails
        };
        let path = format!("/tasks/{}", task.id);
        self.commit(
            HttpMethod::Patch,
            &path,
            Some(to_body(&request)?),
            kind,
            AffectedIds::project(project_id),
        )
        .await
        .and_then(expect_entity)
    }

    /// Moves a task between TO_DO and IN_PROGRESS. Returns `None` without a
    /// request when the status is unchanged. Completion goes through
    /// [`MutationService::complete_task`].
    pub async fn change_task_status(
        &self,
        project_id: EntityId,
        viewer: Viewer,
        task: &Task,
        to: DisplayStatus,
    ) -> ClientResult<Option<Task>> {
        ensure(Action::ChangeTaskStatus, &task_context(viewer, task))?;
        let Some(request) = TaskLifecycle::status_change(task, to)? else {
            return Ok(None);
        };

        let path = format!("/tasks/{}/status", task.id);
        let updated = self
            .commit(
                HttpMethod::Patch,
                &path,
                Some(to_body(&request)?),
                MutationKind::UpdateTaskStatus,
                AffectedIds::project(project_id),
            )
            .await
            .and_then(expect_entity)?;
        Ok(Some(updated))
    }

    /// Sends a confirmed completion. The server stamps `completedAt`.
    pub async fn complete_task(
        &self,
        project_id: EntityId,
        viewer: Viewer,
        task: &Task,
        completion: CompletionRequest,
    ) -> ClientResult<Task> {
        ensure(Action::ChangeTaskStatus, &task_context(viewer, task))?;
        if completion.task_id() != task.id {
            return Err(ClientError::Validation(format!(
                "Completion was confirmed for task {}, not task {}",
                completion.task_id(),
                task.id
            )));
        }
        if completion.from_status() != task.status {
            return Err(ClientError::Validation(
                "Task status changed since completion was confirmed".to_string(),
            ));
        }
        TaskLifecycle::validate_transition(task.status, DisplayStatus::Done)?;
        if task.is_done() {
            return Err(TransitionError::InvalidTransition {
                from: task.status,
                to: DisplayStatus::Done,
            }
            .into());
        }

        let path = format!("/tasks/{}/status", task.id);
        let updated: Task = self
            .commit(
                HttpMethod::Patch,
                &path,
                Some(to_body(&completion.to_status_change())?),
                MutationKind::UpdateTaskStatus,
                AffectedIds::project(project_id),
            )
            .await
            .and_then(expect_entity)?;
        info!("Completed task {}", task.id);
        Ok(updated)
    }

    pub async fn add_assignees(
        &self,
        project_id: EntityId,
        viewer: Viewer,
        task: &Task,
        user_ids: Vec<EntityId>,
    ) -> ClientResult<Task> {
        ensure(Action::AddTaskAssignees, &task_context(viewer, task))?;
        let user_ids: Vec<EntityId> = user_ids
            .into_iter()
            .filter(|id| !task.assignments.iter().any(|a| a.user_id == *id))
            .collect();
        if user_ids.is_empty() {
            return Err(ClientError::Validation(
                "All selected users are already assigned".to_string(),
            ));
        }

        let path = format!("/tasks/{}/assignees", task.id);
        self.commit(
            HttpMethod::Post,
            &path,
            Some(to_body(&AddAssigneesRequest { user_ids })?),
            MutationKind::UpdateTaskAssignees,
            AffectedIds::project(project_id),
        )
        .await
        .and_then(expect_entity)
    }

    /// The OWNER assignment can never be removed.
    pub async fn remove_assignee(
        &self,
        project_id: EntityId,
        viewer: Viewer,
        task: &Task,
        user_id: EntityId,
    ) -> ClientResult<Option<Task>> {
        ensure(Action::RemoveTaskAssignee, &task_context(viewer, task))?;
        let assignment = task
            .assignments
            .iter()
            .find(|a| a.user_id == user_id)
            .ok_or_else(|| {
                ClientError::Validation(format!("User {} is not assigned to this task", user_id))
            })?;
        if assignment.task_role == TaskRole::Owner || task.owner_id == user_id {
            return Err(ClientError::Validation(
                "The task owner cannot be removed".to_string(),
            ));
        }

        let path = format!("/tasks/{}/assignees/{}", task.id, user_id);
        let response = self
            .commit(
                HttpMethod::Delete,
                &path,
                None,
                MutationKind::UpdateTaskAssignees,
                AffectedIds::project(project_id),
            )
            .await?;
        decode_optional(response)
    }

    pub async fn delete_task(
        &self,
        project_id: EntityId,
        viewer: Viewer,
        task: &Task,
    ) -> ClientResult<()> {
        ensure(Action::DeleteTask, &task_context(viewer, task))?;
        let path = format!("/tasks/{}", task.id);
        self.commit(
            HttpMethod::Delete,
            &path,
            None,
            MutationKind::DeleteTask,
            AffectedIds::project(project_id),
        )
        .await?;
        info!("Deleted task {}", task.id);
        Ok(())
    }

    // ----- profile -----

    pub async fn update_profile(&self, request: UpdateProfileRequest) -> ClientResult<User> {
        if request.is_empty() {
            return Err(ClientError::Validation("No fields to update".to_string()));
        }
        if let Some(username) = &request.username {
            require_non_blank(username, "Username")?;
        }
        if let Some(email) = &request.email {
            validate_email(email)?;
        }

        self.commit(
            HttpMethod::Patch,
            "/users/me",
            Some(to_body(&request)?),
            MutationKind::UpdateProfile,
            AffectedIds::none(),
        )
        .await
        .and_then(expect_entity)
    }

    /// Issues the call and, only if it succeeds, applies the invalidation edges.
    async fn commit(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
        kind: MutationKind,
        ids: AffectedIds,
    ) -> ClientResult<Option<Value>> {
        let response = self.gateway.send(method, path, body).await?;
        self.cache.on_mutation_success(kind, ids);
        Ok(response)
    }
}

/// Runs `mutation` to completion in the background, independent of the caller's
/// lifetime. Errors are logged since nobody is left to show them.
pub fn spawn_detached<F, T>(spawner: &dyn TaskSpawner, label: &'static str, mutation: F)
where
    F: Future<Output = ClientResult<T>> + Send + 'static,
    T: Send + 'static,
{
    let task: BoxFuture<'static, ()> = Box::pin(async move {
        match mutation.await {
            Ok(_) => info!("Detached mutation {} completed", label),
            Err(e) => warn!("Detached mutation {} failed: {}", label, e),
        }
    });
    spawner.spawn(task);
}

fn ensure(action: Action, ctx: &PermissionContext) -> ClientResult<()> {
    if PermissionResolver::can(action, ctx) {
        Ok(())
    } else {
        Err(ClientError::PermissionDenied(format!(
            "{:?} is not permitted for a {}",
            action, ctx.viewer_role
        )))
    }
}

fn task_context(viewer: Viewer, task: &Task) -> PermissionContext {
    PermissionContext::for_task(viewer.role, task, viewer.user_id)
}

fn require_non_blank(value: &str, field: &str) -> ClientResult<()> {
    if value.trim().is_empty() {
        Err(ClientError::Validation(format!("{} must not be empty", field)))
    } else {
        Ok(())
    }
}

pub(crate) fn validate_email(email: &str) -> ClientResult<()> {
    if email_address::EmailAddress::is_valid(email.trim()) {
        Ok(())
    } else {
        Err(ClientError::Validation(format!("Invalid email address: {}", email)))
    }
}

fn to_body<B: Serialize>(body: &B) -> ClientResult<Value> {
    serde_json::to_value(body).map_err(|e| ClientError::Validation(e.to_string()))
}

fn expect_entity<T: DeserializeOwned>(response: Option<Value>) -> ClientResult<T> {
    let value = response.ok_or_else(|| ClientError::server_fault("Expected a response body"))?;
    Ok(serde_json::from_value(value)?)
}

fn decode_optional<T: DeserializeOwned>(response: Option<Value>) -> ClientResult<Option<T>> {
    response
        .map(|value| serde_json::from_value(value).map_err(ClientError::from))
        .transpose()
}
