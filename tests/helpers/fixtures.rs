#![allow(dead_code)]
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use teamflow::infrastructure::runtime::clock::ManualClock;
use teamflow::models::{EntityId, Member, MemberRole, Project, Task, TaskAssignment, TaskRole, TaskStatus};
use teamflow::services::{CacheCoordinator, CachePolicy};

pub const TASK_OWNER_ID: EntityId = 100;
pub const ASSIGNEE_ID: EntityId = 200;
pub const OUTSIDER_ID: EntityId = 300;

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(fixed_now()))
}

/// Coordinator with the default five minute TTL on a manual clock.
pub fn cache_with_clock() -> (Arc<CacheCoordinator>, Arc<ManualClock>) {
    let clock = manual_clock();
    let cache = Arc::new(CacheCoordinator::new(CachePolicy::default(), clock.clone()));
    (cache, clock)
}

pub fn member(id: EntityId) -> Member {
    member_with_role(id, MemberRole::Member)
}

pub fn member_with_role(id: EntityId, role: MemberRole) -> Member {
    Member {
        user_id: id,
        username: format!("user{}", id),
        email: format!("user{}@example.com", id),
        role,
    }
}

pub fn members(ids: impl IntoIterator<Item = EntityId>) -> Vec<Member> {
    ids.into_iter().map(member).collect()
}

pub fn project(id: EntityId, role: MemberRole) -> Project {
    Project {
        id,
        title: format!("Project {}", id),
        description: None,
        role,
    }
}

/// Task owned by [`TASK_OWNER_ID`] and assigned to [`ASSIGNEE_ID`], due a day
/// after [`fixed_now`].
pub fn task(id: EntityId, status: TaskStatus) -> Task {
    Task {
        id,
        title: format!("Task {}", id),
        description: None,
        due_date: fixed_now() + Duration::days(1),
        owner_id: TASK_OWNER_ID,
        status,
        completed_at: None,
        completion_comment: None,
        assignments: vec![
            TaskAssignment {
                user_id: TASK_OWNER_ID,
                username: format!("user{}", TASK_OWNER_ID),
                task_role: TaskRole::Owner,
            },
            TaskAssignment {
                user_id: ASSIGNEE_ID,
                username: format!("user{}", ASSIGNEE_ID),
                task_role: TaskRole::Assignee,
            },
        ],
    }
}

pub fn task_due(id: EntityId, status: TaskStatus, due_date: DateTime<Utc>) -> Task {
    Task {
        due_date,
        ..task(id, status)
    }
}

pub fn task_json(task: &Task) -> serde_json::Value {
    serde_json::to_value(task).unwrap()
}
