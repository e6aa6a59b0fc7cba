mod helpers;

use chrono::Duration;
use helpers::*;
use serde_json::json;
use std::sync::Arc;
use tokio_test::assert_err;
use teamflow::domain::errors::ClientError;
use teamflow::domain::ports::HttpMethod;
use teamflow::models::{DisplayStatus, MemberRole, TaskStatus};
use teamflow::services::{
    CollectionKey, MutationService, TaskLifecycle, TransitionError, Viewer,
    COMPLETION_COMMENT_MAX_CHARS,
};

const ALL_TARGETS: [DisplayStatus; 4] = [
    DisplayStatus::ToDo,
    DisplayStatus::InProgress,
    DisplayStatus::Done,
    DisplayStatus::Overdue,
];

#[test]
fn test_open_statuses_reach_everything_but_overdue() {
    for from in [TaskStatus::ToDo, TaskStatus::InProgress] {
        assert_eq!(
            TaskLifecycle::transitions_from(from),
            &[TaskStatus::ToDo, TaskStatus::InProgress, TaskStatus::Done]
        );
        for to in [DisplayStatus::ToDo, DisplayStatus::InProgress, DisplayStatus::Done] {
            assert!(TaskLifecycle::validate_transition(from, to).is_ok());
        }
        assert!(TaskLifecycle::validate_transition(from, DisplayStatus::Overdue).is_err());
    }
}

#[test]
fn test_done_is_terminal() {
    let task = task(1, TaskStatus::Done);
    assert_eq!(TaskLifecycle::available_transitions(&task), vec![TaskStatus::Done]);

    for to in ALL_TARGETS {
        let result = TaskLifecycle::status_change(&task, to);
        match to {
            DisplayStatus::Done => assert_eq!(result, Ok(None)),
            _ => assert!(
                matches!(result, Err(TransitionError::InvalidTransition { .. })),
                "DONE -> {} must be rejected",
                to
            ),
        }
    }
    assert!(TaskLifecycle::begin_completion(&task).is_err());
}

#[test]
fn test_overdue_is_derived_from_open_status_and_past_due_date() {
    let now = fixed_now();
    let late = task_due(1, TaskStatus::InProgress, now - Duration::hours(1));

    assert_eq!(TaskLifecycle::display_status(&late, now), DisplayStatus::Overdue);
    assert_eq!(late.status, TaskStatus::InProgress);
    assert_eq!(
        TaskLifecycle::available_transitions(&late),
        TaskLifecycle::transitions_from(TaskStatus::InProgress).to_vec()
    );
}

#[test]
fn test_done_and_on_time_tasks_are_not_overdue() {
    let now = fixed_now();
    let finished = task_due(1, TaskStatus::Done, now - Duration::days(3));
    let on_time = task_due(2, TaskStatus::ToDo, now + Duration::minutes(1));
    let due_now = task_due(3, TaskStatus::ToDo, now);

    assert_eq!(TaskLifecycle::display_status(&finished, now), DisplayStatus::Done);
    assert_eq!(TaskLifecycle::display_status(&on_time, now), DisplayStatus::ToDo);
    assert_eq!(TaskLifecycle::display_status(&due_now, now), DisplayStatus::ToDo);
}

#[test]
fn test_overdue_is_never_a_target() {
    let task = task(1, TaskStatus::ToDo);
    assert!(matches!(
        TaskLifecycle::status_change(&task, DisplayStatus::Overdue),
        Err(TransitionError::InvalidTransition {
            to: DisplayStatus::Overdue,
            ..
        })
    ));
}

#[test]
fn test_done_requires_confirmation() {
    let task = task(1, TaskStatus::InProgress);
    assert_eq!(
        TaskLifecycle::status_change(&task, DisplayStatus::Done),
        Err(TransitionError::ConfirmationRequired)
    );
}

#[test]
fn test_completion_comment_limit() {
    let task = task(1, TaskStatus::ToDo);

    let at_limit = "x".repeat(COMPLETION_COMMENT_MAX_CHARS);
    let request = TaskLifecycle::begin_completion(&task)
        .unwrap()
        .confirm()
        .with_comment(at_limit.clone())
        .unwrap();
    assert_eq!(request.comment(), at_limit);

    // Counted in characters, not bytes.
    let multibyte = "é".repeat(COMPLETION_COMMENT_MAX_CHARS);
    assert!(TaskLifecycle::begin_completion(&task)
        .unwrap()
        .confirm()
        .with_comment(multibyte)
        .is_ok());

    let too_long = "x".repeat(COMPLETION_COMMENT_MAX_CHARS + 1);
    assert_eq!(
        TaskLifecycle::begin_completion(&task)
            .unwrap()
            .confirm()
            .with_comment(too_long)
            .unwrap_err(),
        TransitionError::CommentTooLong {
            len: COMPLETION_COMMENT_MAX_CHARS + 1,
            max: COMPLETION_COMMENT_MAX_CHARS,
        }
    );
}

#[test]
fn test_skipped_comment_is_recorded_as_empty() {
    let task = task(7, TaskStatus::ToDo);
    let request = TaskLifecycle::begin_completion(&task).unwrap().confirm().skip();

    assert_eq!(request.task_id(), 7);
    assert_eq!(request.from_status(), TaskStatus::ToDo);
    let change = request.to_status_change();
    assert_eq!(change.status, TaskStatus::Done);
    assert_eq!(change.completion_comment.as_deref(), Some(""));
}

fn service() -> (MutationService, Arc<MockGateway>, Arc<teamflow::services::CacheCoordinator>) {
    let (cache, _clock) = cache_with_clock();
    let gateway = Arc::new(MockGateway::new());
    (MutationService::new(gateway.clone(), cache.clone()), gateway, cache)
}

const ASSIGNEE: Viewer = Viewer {
    user_id: ASSIGNEE_ID,
    role: MemberRole::Member,
};

#[tokio::test]
async fn test_status_change_sends_one_request() {
    let (service, gateway, cache) = service();
    let current = task(5, TaskStatus::ToDo);
    let mut updated = current.clone();
    updated.status = TaskStatus::InProgress;
    gateway.respond(task_json(&updated));

    let result = service
        .change_task_status(42, ASSIGNEE, &current, DisplayStatus::InProgress)
        .await
        .unwrap();

    assert_eq!(result.unwrap().status, TaskStatus::InProgress);
    let calls = gateway.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, HttpMethod::Patch);
    assert_eq!(calls[0].path, "/tasks/5/status");
    assert_eq!(calls[0].body, Some(json!({"status": "IN_PROGRESS"})));
    assert!(cache.is_stale(CollectionKey::ProjectTasks(42)));
}

#[tokio::test]
async fn test_unchanged_status_sends_nothing() {
    let (service, gateway, _cache) = service();
    let current = task(5, TaskStatus::InProgress);

    let result = service
        .change_task_status(42, ASSIGNEE, &current, DisplayStatus::InProgress)
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn test_rejected_transitions_never_reach_the_network() {
    let (service, gateway, _cache) = service();
    let done = task(5, TaskStatus::Done);
    let open = task(6, TaskStatus::ToDo);

    let err = service
        .change_task_status(42, ASSIGNEE, &done, DisplayStatus::ToDo)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::InvalidTransition { .. }));

    let err = service
        .change_task_status(42, ASSIGNEE, &open, DisplayStatus::Overdue)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::InvalidTransition { .. }));

    let outsider = Viewer {
        user_id: OUTSIDER_ID,
        role: MemberRole::Member,
    };
    let err = service
        .change_task_status(42, outsider, &open, DisplayStatus::InProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::PermissionDenied(_)));

    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn test_complete_task_sends_comment() {
    let (service, gateway, _cache) = service();
    let current = task(5, TaskStatus::InProgress);
    let mut done = current.clone();
    done.status = TaskStatus::Done;
    done.completed_at = Some(fixed_now());
    done.completion_comment = Some("shipped".into());
    gateway.respond(task_json(&done));

    let request = TaskLifecycle::begin_completion(&current)
        .unwrap()
        .confirm()
        .with_comment("shipped")
        .unwrap();
    let result = service
        .complete_task(42, ASSIGNEE, &current, request)
        .await
        .unwrap();

    assert_eq!(result.status, TaskStatus::Done);
    assert_eq!(result.completed_at, Some(fixed_now()));
    assert_eq!(
        gateway.calls()[0].body,
        Some(json!({"status": "DONE", "completionComment": "shipped"}))
    );
}

#[tokio::test]
async fn test_completion_confirmed_for_another_task_is_rejected() {
    let (service, gateway, _cache) = service();
    let confirmed_for = task(5, TaskStatus::ToDo);
    let other = task(6, TaskStatus::ToDo);
    let request = TaskLifecycle::begin_completion(&confirmed_for)
        .unwrap()
        .confirm()
        .skip();

    let err = assert_err!(service.complete_task(42, ASSIGNEE, &other, request).await);
    assert!(matches!(err, ClientError::Validation(_)));
    assert_eq!(gateway.call_count(), 0);
}
