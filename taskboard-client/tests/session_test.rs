/// Session tests against the in-process board
///
/// These cover the reconciliation protocol end to end:
/// - Stale edits conflict and show the authoritative record
/// - Overwrite and discard resolutions
/// - Conflicts whose current record cannot be fetched
/// - Conflicts stay confined to their task
/// - A running session follows other users' changes

mod common;

use common::TestBoard;
use std::sync::Arc;
use std::time::Duration;
use taskboard_client::error::ClientError;
use taskboard_client::reconcile::{EditKind, Resolution};
use taskboard_client::session::{EditOutcome, Session, SessionUpdate};
use taskboard_shared::board::NewTask;
use taskboard_shared::models::{TaskChanges, TaskPriority, TaskStatus};
use tokio_util::sync::CancellationToken;

fn priority(p: TaskPriority) -> TaskChanges {
    TaskChanges {
        priority: Some(p),
        ..Default::default()
    }
}

fn confirmed(outcome: EditOutcome) -> taskboard_shared::models::Task {
    match outcome {
        EditOutcome::Confirmed(task) => task,
        other => panic!("expected confirmation, got {:?}", other),
    }
}

/// Alice and Bob both look at T at version 2; Alice writes first
async fn stale_bob() -> (
    TestBoard,
    Session<common::InProcessApi>,
    Session<common::InProcessApi>,
    uuid::Uuid,
) {
    let board = TestBoard::new();
    let alice_api = board.user("alice").await;
    let bob_api = board.user("bob").await;

    let alice = Session::new(alice_api.clone());
    let bob = Session::new(bob_api.clone());

    let mut new_task = NewTask::titled("T");
    new_task.assignee_id = Some(bob_api.user_id());
    let task = alice.create_task(new_task).await.unwrap();

    for status in [TaskStatus::InProgress, TaskStatus::Todo] {
        confirmed(alice.edit(task.id, TaskChanges::move_to(status)).await.unwrap());
    }

    bob.refresh().await.unwrap();
    assert_eq!(bob.task(task.id).await.unwrap().version, 2);

    let winner = confirmed(alice.edit(task.id, priority(TaskPriority::High)).await.unwrap());
    assert_eq!(winner.version, 3);

    (board, alice, bob, task.id)
}

#[tokio::test]
async fn test_stale_edit_conflicts_with_authoritative_record() {
    let (_board, _alice, bob, task_id) = stale_bob().await;

    let outcome = bob
        .edit(task_id, TaskChanges::move_to(TaskStatus::Done))
        .await
        .unwrap();

    let conflict = match outcome {
        EditOutcome::Conflicted(conflict) => conflict,
        other => panic!("expected conflict, got {:?}", other),
    };
    assert_eq!(conflict.task_id, task_id);
    assert_eq!(
        conflict.attempted,
        EditKind::Update(TaskChanges::move_to(TaskStatus::Done))
    );
    let authoritative = conflict.authoritative.unwrap();
    assert_eq!(authoritative.version, 3);
    assert_eq!(authoritative.priority, TaskPriority::High);

    // The optimistic move is reverted
    let view = bob.task(task_id).await.unwrap();
    assert_eq!(view.status, TaskStatus::Todo);
    assert_eq!(view.priority, TaskPriority::High);
    assert_eq!(bob.conflicts().await.len(), 1);
}

#[tokio::test]
async fn test_conflict_without_current_record_shows_none() {
    let (_board, _alice, bob, task_id) = stale_bob().await;
    bob.api().fail_task_reads(true);

    let outcome = bob
        .edit(task_id, TaskChanges::move_to(TaskStatus::Done))
        .await
        .unwrap();
    let conflict = match outcome {
        EditOutcome::Conflicted(conflict) => conflict,
        other => panic!("expected conflict, got {:?}", other),
    };
    assert_eq!(conflict.authoritative, None);
    assert_eq!(bob.conflicts().await[0].authoritative, None);

    // Last known state stays on the board, just not as server truth
    let view = bob.task(task_id).await.unwrap();
    assert_eq!(view.version, 2);
    assert_eq!(view.status, TaskStatus::Todo);

    // Overwriting from the stale version conflicts again, this time with the record
    bob.api().fail_task_reads(false);
    let outcome = bob.resolve(task_id, Resolution::Overwrite).await.unwrap();
    match outcome {
        EditOutcome::Conflicted(conflict) => {
            assert_eq!(conflict.authoritative.unwrap().version, 3);
        }
        other => panic!("expected conflict, got {:?}", other),
    }
}

#[tokio::test]
async fn test_overwrite_resubmits_on_new_version() {
    let (_board, alice, bob, task_id) = stale_bob().await;
    bob.edit(task_id, TaskChanges::move_to(TaskStatus::Done))
        .await
        .unwrap();

    let task = confirmed(bob.resolve(task_id, Resolution::Overwrite).await.unwrap());
    assert_eq!(task.version, 4);
    assert_eq!(task.status, TaskStatus::Done);
    assert_eq!(task.priority, TaskPriority::High);
    assert!(bob.conflicts().await.is_empty());

    alice.refresh().await.unwrap();
    assert_eq!(alice.task(task_id).await.unwrap(), task);
}

#[tokio::test]
async fn test_discard_accepts_server_state() {
    let (board, _alice, bob, task_id) = stale_bob().await;
    bob.edit(task_id, TaskChanges::move_to(TaskStatus::Done))
        .await
        .unwrap();

    let outcome = bob.resolve(task_id, Resolution::Discard).await.unwrap();
    assert_eq!(outcome, EditOutcome::Discarded);

    let view = bob.task(task_id).await.unwrap();
    assert_eq!(view.version, 3);
    assert_eq!(view.status, TaskStatus::Todo);

    let stored = board.board.stores().tasks.find_task(task_id).await.unwrap().unwrap();
    assert_eq!(stored.version, 3);

    assert!(matches!(
        bob.resolve(task_id, Resolution::Discard).await,
        Err(ClientError::NoConflict(_))
    ));
}

#[tokio::test]
async fn test_conflict_does_not_touch_other_tasks() {
    let (_board, _alice, bob, task_id) = stale_bob().await;
    let other = bob.create_task(NewTask::titled("Mine")).await.unwrap();

    bob.edit(task_id, TaskChanges::move_to(TaskStatus::Done))
        .await
        .unwrap();

    let updated = confirmed(
        bob.edit(other.id, TaskChanges::move_to(TaskStatus::InProgress))
            .await
            .unwrap(),
    );
    assert_eq!(updated.version, 1);
    assert_eq!(bob.task(other.id).await.unwrap(), updated);

    let conflicts = bob.conflicts().await;
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].task_id, task_id);

    // A second edit to the conflicted task waits for resolution
    assert!(matches!(
        bob.edit(task_id, priority(TaskPriority::Low)).await,
        Err(ClientError::EditPending(_))
    ));
}

#[tokio::test]
async fn test_smart_assign_through_session() {
    let board = TestBoard::new();
    let alice_api = board.user("alice").await;
    let bob_api = board.user("bob").await;
    let alice = Session::new(alice_api);

    alice.create_task(NewTask::titled("one")).await.unwrap();
    let task = alice.create_task(NewTask::titled("two")).await.unwrap();

    let assigned = confirmed(alice.smart_assign(task.id).await.unwrap());
    assert_eq!(assigned.assignee_id, Some(bob_api.user_id()));
    assert_eq!(alice.task(task.id).await.unwrap().version, 1);
}

#[tokio::test]
async fn test_edit_of_deleted_task_fails_and_reverts() {
    let board = TestBoard::new();
    let alice_api = board.user("alice").await;
    let alice = Session::new(alice_api.clone());
    let task = alice.create_task(NewTask::titled("gone soon")).await.unwrap();

    // Deleted behind the session's back
    board
        .board
        .delete_task(&alice_api.actor, task.id)
        .await
        .unwrap();

    let result = alice
        .edit(task.id, TaskChanges::move_to(TaskStatus::Done))
        .await;
    assert!(matches!(result, Err(ClientError::NotFound(_))));
    assert_eq!(alice.task(task.id).await.unwrap().status, TaskStatus::Todo);
    assert!(alice.conflicts().await.is_empty());
}

#[tokio::test]
async fn test_running_session_follows_remote_changes() {
    let board = TestBoard::new();
    let alice_api = board.user("alice").await;
    let bob_api = board.user("bob").await;

    let bob = Arc::new(Session::new(bob_api.clone()).with_reconnect_delay(Duration::from_millis(10)));
    let mut updates = bob.updates();
    let shutdown = CancellationToken::new();

    let runner = {
        let bob = bob.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { bob.run(shutdown).await })
    };

    let wait = Duration::from_secs(5);
    let first = tokio::time::timeout(wait, updates.recv()).await.unwrap().unwrap();
    assert_eq!(first, SessionUpdate::Refreshed);

    let mut new_task = NewTask::titled("Remote");
    new_task.assignee_id = Some(bob_api.user_id());
    let task = board
        .board
        .create_task(&alice_api.actor, new_task)
        .await
        .unwrap();

    let mut saw_task = false;
    let mut saw_activity = false;
    while !(saw_task && saw_activity) {
        match tokio::time::timeout(wait, updates.recv()).await.unwrap().unwrap() {
            SessionUpdate::TaskChanged(id) if id == task.id => saw_task = true,
            SessionUpdate::ActivityLogged(entry) => {
                assert_eq!(entry.entry.task_id, Some(task.id));
                saw_activity = true;
            }
            _ => {}
        }
    }

    assert_eq!(bob.task(task.id).await.unwrap(), task);
    assert_eq!(bob.activity().await.len(), 1);

    board
        .board
        .delete_task(&alice_api.actor, task.id)
        .await
        .unwrap();
    loop {
        let update = tokio::time::timeout(wait, updates.recv()).await.unwrap().unwrap();
        if update == SessionUpdate::TaskRemoved(task.id) {
            break;
        }
    }
    assert!(bob.task(task.id).await.is_none());

    shutdown.cancel();
    tokio::time::timeout(wait, runner).await.unwrap().unwrap();
}
