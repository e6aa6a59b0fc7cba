use crate::models::{EntityId, MemberRole, Task};

/// Mutations the UI may offer to the current viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    EditMemberRole,
    RemoveMember,
    EditTask,
    DeleteTask,
    RemoveTaskAssignee,
    ChangeTaskStatus,
    AddTaskAssignees,
    EditProject,
    DeleteProject,
    LeaveProject,
    InviteMember,
}

impl Action {
    pub const ALL: [Action; 11] = [
        Action::EditMemberRole,
        Action::RemoveMember,
        Action::EditTask,
        Action::DeleteTask,
        Action::RemoveTaskAssignee,
        Action::ChangeTaskStatus,
        Action::AddTaskAssignees,
        Action::EditProject,
        Action::DeleteProject,
        Action::LeaveProject,
        Action::InviteMember,
    ];
}

/// Role facts about the viewer and the target of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionContext {
    pub viewer_role: MemberRole,
    /// Role of the member being acted on. `None` for task and project actions.
    pub target_role: Option<MemberRole>,
    pub is_task_owner: bool,
    pub is_assignee: bool,
}

impl PermissionContext {
    pub fn for_member(viewer_role: MemberRole, target_role: MemberRole) -> Self {
        Self {
            viewer_role,
            target_role: Some(target_role),
            is_task_owner: false,
            is_assignee: false,
        }
    }

    /// Context for acting on `task` as `viewer_id`, who holds `viewer_role` in the
    /// task's project.
    pub fn for_task(viewer_role: MemberRole, task: &Task, viewer_id: EntityId) -> Self {
        Self {
            viewer_role,
            target_role: None,
            is_task_owner: task.is_owner(viewer_id),
            is_assignee: task.is_assignee(viewer_id),
        }
    }

    pub fn for_project(viewer_role: MemberRole) -> Self {
        Self {
            viewer_role,
            target_role: None,
            is_task_owner: false,
            is_assignee: false,
        }
    }
}

/// Pure role arithmetic. No network access and no hidden state.
pub struct PermissionResolver;

impl PermissionResolver {
    pub fn can(action: Action, ctx: &PermissionContext) -> bool {
        match action {
            Action::EditMemberRole => ctx
                .target_role
                .is_some_and(|target| Self::can_edit_member_role(ctx.viewer_role, target)),
            Action::RemoveMember => ctx
                .target_role
                .is_some_and(|target| Self::can_remove_member(ctx.viewer_role, target)),
            Action::EditTask
            | Action::DeleteTask
            | Action::RemoveTaskAssignee
            | Action::AddTaskAssignees => Self::can_edit_task(ctx.viewer_role, ctx.is_task_owner),
            Action::ChangeTaskStatus => {
                Self::can_change_task_status(ctx.viewer_role, ctx.is_task_owner, ctx.is_assignee)
            }
            Action::EditProject | Action::InviteMember => ctx.viewer_role.is_manager(),
            Action::DeleteProject => ctx.viewer_role == MemberRole::Owner,
            Action::LeaveProject => ctx.viewer_role != MemberRole::Owner,
        }
    }

    /// Nobody edits the OWNER, and an ADMIN cannot edit another ADMIN.
    pub fn can_edit_member_role(viewer: MemberRole, target: MemberRole) -> bool {
        target != MemberRole::Owner && !(viewer == MemberRole::Admin && target == MemberRole::Admin)
    }

    pub fn can_remove_member(viewer: MemberRole, target: MemberRole) -> bool {
        target != MemberRole::Owner
            && (viewer == MemberRole::Owner
                || (viewer == MemberRole::Admin && target == MemberRole::Member))
    }

    pub fn can_edit_task(viewer: MemberRole, is_task_owner: bool) -> bool {
        is_task_owner || viewer.is_manager()
    }

    pub fn can_change_task_status(viewer: MemberRole, is_task_owner: bool, is_assignee: bool) -> bool {
        Self::can_edit_task(viewer, is_task_owner) || is_assignee
    }

    /// Every action permitted in `ctx`, in declaration order.
    pub fn permitted_actions(ctx: &PermissionContext) -> Vec<Action> {
        Action::ALL
            .iter()
            .copied()
            .filter(|action| Self::can(*action, ctx))
            .collect()
    }
}
