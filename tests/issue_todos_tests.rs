//! Integration tests for to-dos raised by issue events
//!
//! Covers classification of new issues, edits, reassignment, closing and
//! reopening, and the visibility rules applied to every recipient.

mod common;

use common::TestEngine;
use todo_engine::targets::Target;
use todo_engine::todos::{ResolvedByAction, TodoAction, TodoError, TodoState};
use todo_engine::TodoSettings;

#[test]
fn test_new_issue_classifies_each_recipient_once() {
    let engine = TestEngine::spawn();
    let mut issue = engine.issue(1, "@member please review\nPing @guest for context.");
    issue.assignees = vec![engine.assignee];

    let outcome = engine.service.new_issue(&issue, engine.author).unwrap();
    assert_eq!(outcome.created.len(), 3);
    assert!(outcome.resolved.is_empty());

    let member = engine.pending(engine.member);
    assert_eq!(member.len(), 1);
    assert_eq!(member[0].action, TodoAction::DirectlyAddressed);
    assert_eq!(member[0].author_id, engine.author);
    assert_eq!(member[0].target, Target::Issue(issue.clone()).reference());

    let guest = engine.pending(engine.guest);
    assert_eq!(guest.len(), 1);
    assert_eq!(guest[0].action, TodoAction::Mentioned);

    let assignee = engine.pending(engine.assignee);
    assert_eq!(assignee.len(), 1);
    assert_eq!(assignee[0].action, TodoAction::Assigned);

    assert!(engine.todos(engine.author).is_empty());
    engine.assert_counters_consistent();
}

#[test]
fn test_mentioned_assignee_only_gets_assigned() {
    let engine = TestEngine::spawn();
    let mut issue = engine.issue(1, "@assignee can you fix this?");
    issue.assignees = vec![engine.assignee];

    engine.service.new_issue(&issue, engine.author).unwrap();

    let todos = engine.todos(engine.assignee);
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0].action, TodoAction::Assigned);
}

#[test]
fn test_mentions_respect_project_visibility() {
    let engine = TestEngine::spawn();
    let issue = engine.issue(1, "cc @non_member @admin @nobody");

    let outcome = engine.service.new_issue(&issue, engine.author).unwrap();
    assert_eq!(outcome.created.len(), 1);
    assert!(engine.todos(engine.non_member).is_empty());

    let admin = engine.pending(engine.admin);
    assert_eq!(admin.len(), 1);
    assert_eq!(admin[0].action, TodoAction::Mentioned);
}

#[test]
fn test_confidential_issue_skips_guests() {
    let engine = TestEngine::spawn();
    let mut issue = engine.issue(1, "@guest @member heads up");
    issue.confidential = true;

    engine.service.new_issue(&issue, engine.author).unwrap();

    assert!(engine.todos(engine.guest).is_empty());
    assert_eq!(engine.pending(engine.member).len(), 1);
}

#[test]
fn test_confidential_issue_reaches_guest_assignee() {
    let engine = TestEngine::spawn();
    let mut issue = engine.issue(1, "");
    issue.confidential = true;
    issue.assignees = vec![engine.guest];

    engine.service.new_issue(&issue, engine.author).unwrap();

    let todos = engine.pending(engine.guest);
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0].action, TodoAction::Assigned);
}

#[test]
fn test_author_may_mention_themselves() {
    let engine = TestEngine::spawn();
    let issue = engine.issue(1, "note to self, ask @author");

    engine.service.new_issue(&issue, engine.author).unwrap();

    let todos = engine.pending(engine.author);
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0].action, TodoAction::Mentioned);
}

#[test]
fn test_author_is_not_assigned_on_create_by_default() {
    let engine = TestEngine::spawn();
    let mut issue = engine.issue(1, "");
    issue.assignees = vec![engine.author, engine.assignee];

    engine.service.new_issue(&issue, engine.author).unwrap();

    assert!(engine.todos(engine.author).is_empty());
    assert_eq!(engine.pending(engine.assignee).len(), 1);
}

#[test]
fn test_self_assigned_author_can_still_mention_themselves() {
    let engine = TestEngine::spawn();
    let mut issue = engine.issue(1, "note to self, ask @author");
    issue.assignees = vec![engine.author];

    engine.service.new_issue(&issue, engine.author).unwrap();

    let todos = engine.pending(engine.author);
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0].action, TodoAction::Mentioned);
}

#[test]
fn test_author_assignment_can_be_enabled() {
    let engine = TestEngine::spawn_with(TodoSettings {
        assign_author_on_create: true,
        ..Default::default()
    });
    let mut issue = engine.issue(1, "");
    issue.assignees = vec![engine.author];

    engine.service.new_issue(&issue, engine.author).unwrap();

    let todos = engine.pending(engine.author);
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0].action, TodoAction::Assigned);
}

#[test]
fn test_close_resolves_every_pending_todo_and_reopen_creates_none() {
    let engine = TestEngine::spawn();
    let mut issue = engine.issue(1, "@member please review\nPing @guest for context.");
    issue.assignees = vec![engine.assignee];
    engine.service.new_issue(&issue, engine.author).unwrap();

    let outcome = engine.service.close_issue(&issue, engine.member).unwrap();
    assert_eq!(outcome.resolved.len(), 3);
    assert!(outcome.created.is_empty());

    for user in [engine.member, engine.guest, engine.assignee] {
        assert!(engine.pending(user).is_empty());
        let done = engine.done(user);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].resolved_by_action, Some(ResolvedByAction::SystemDone));
    }

    let outcome = engine.service.reopen_issue(&issue, engine.author).unwrap();
    assert!(outcome.is_empty());
    for user in [engine.member, engine.guest, engine.assignee] {
        assert!(engine.pending(user).is_empty());
    }
    engine.assert_counters_consistent();
}

#[test]
fn test_close_leaves_other_issues_alone() {
    let engine = TestEngine::spawn();
    let first = engine.issue(1, "@member first");
    let second = engine.issue(2, "@member second");
    engine.service.new_issue(&first, engine.author).unwrap();
    engine.service.new_issue(&second, engine.author).unwrap();

    engine.service.close_issue(&first, engine.author).unwrap();

    let pending = engine.pending(engine.member);
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].target, Target::Issue(second).reference());
}

#[test]
fn test_edit_only_notifies_newly_mentioned_users() {
    let engine = TestEngine::spawn();
    let mut issue = engine.issue(1, "@member hi");
    engine.service.new_issue(&issue, engine.author).unwrap();

    let previous = issue.description.clone();
    issue.description = "@member hi\n@guest you too".to_string();
    let outcome = engine
        .service
        .update_issue(&issue, engine.author, Some(&previous), &[])
        .unwrap();

    assert_eq!(outcome.created.len(), 1);
    assert_eq!(engine.todos(engine.member).len(), 1);
    let guest = engine.pending(engine.guest);
    assert_eq!(guest.len(), 1);
    assert_eq!(guest[0].action, TodoAction::DirectlyAddressed);
}

#[test]
fn test_edit_of_previously_mentioned_user_does_not_renotify() {
    let engine = TestEngine::spawn();
    let mut issue = engine.issue(1, "cc @member");
    engine.service.new_issue(&issue, engine.author).unwrap();
    let todo = engine.pending(engine.member)[0].id;
    engine
        .service
        .resolve_todo(todo, engine.member, ResolvedByAction::ApiDone)
        .unwrap();

    let previous = issue.description.clone();
    issue.description = "cc @member, updated".to_string();
    let outcome = engine
        .service
        .update_issue(&issue, engine.author, Some(&previous), &[])
        .unwrap();

    assert!(outcome.is_empty());
    assert!(engine.pending(engine.member).is_empty());
}

#[test]
fn test_edit_skips_users_handled_by_the_caller() {
    let engine = TestEngine::spawn();
    let issue = engine.issue(1, "FYI @member @john_doe");

    let outcome = engine
        .service
        .update_issue(&issue, engine.author, None, &[engine.john_doe])
        .unwrap();

    assert_eq!(outcome.created.len(), 1);
    assert!(engine.todos(engine.john_doe).is_empty());
    assert_eq!(engine.pending(engine.member)[0].action, TodoAction::Mentioned);
}

#[test]
fn test_task_list_toggle_creates_nothing() {
    let engine = TestEngine::spawn();
    let mut issue = engine.issue(1, "- [x] ask @guest for review  \n- [ ] ship it");

    let outcome = engine
        .service
        .update_issue(
            &issue,
            engine.author,
            Some("- [ ] ask @guest for review\n- [ ] ship it"),
            &[],
        )
        .unwrap();
    assert!(outcome.is_empty());
    assert!(engine.todos(engine.guest).is_empty());

    // Without the previous body the edit is classified in full.
    issue.description = "- [x] ask @guest for review".to_string();
    let outcome = engine
        .service
        .update_issue(&issue, engine.author, None, &[])
        .unwrap();
    assert_eq!(outcome.created.len(), 1);
}

#[test]
fn test_reclassification_does_not_duplicate_pending_mentions() {
    let engine = TestEngine::spawn();
    let mut issue = engine.issue(1, "cc @member");
    engine.service.new_issue(&issue, engine.author).unwrap();

    issue.description = "@member please take over".to_string();
    let outcome = engine
        .service
        .update_issue(&issue, engine.author, None, &[])
        .unwrap();

    assert!(outcome.created.is_empty());
    let todos = engine.todos(engine.member);
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0].action, TodoAction::Mentioned);
}

#[test]
fn test_resolved_mention_can_be_raised_again() {
    let engine = TestEngine::spawn();
    let issue = engine.issue(1, "@member look");
    engine.service.new_issue(&issue, engine.author).unwrap();
    let todo = engine.pending(engine.member)[0].id;
    assert!(engine
        .service
        .resolve_todo(todo, engine.member, ResolvedByAction::ApiDone)
        .unwrap());

    engine
        .service
        .update_issue(&issue, engine.author, None, &[])
        .unwrap();

    assert_eq!(engine.pending(engine.member).len(), 1);
    assert_eq!(engine.done(engine.member).len(), 1);
    engine.assert_counters_consistent();
}

#[test]
fn test_reassignment_notifies_added_assignees_only() {
    let engine = TestEngine::spawn();
    let mut issue = engine.issue(1, "");
    issue.assignees = vec![engine.assignee];
    engine.service.new_issue(&issue, engine.author).unwrap();

    issue.assignees = vec![engine.assignee, engine.member];
    let outcome = engine
        .service
        .reassigned_assignable(&Target::Issue(issue), engine.author, &[engine.assignee])
        .unwrap();

    assert_eq!(outcome.created.len(), 1);
    assert_eq!(engine.todos(engine.assignee).len(), 1);
    let member = engine.pending(engine.member);
    assert_eq!(member.len(), 1);
    assert_eq!(member[0].action, TodoAction::Assigned);
}

#[test]
fn test_self_assignment_creates_todo() {
    let engine = TestEngine::spawn();
    let mut issue = engine.issue(1, "");
    issue.assignees = vec![engine.john_doe];

    engine
        .service
        .reassigned_assignable(&Target::Issue(issue), engine.john_doe, &[])
        .unwrap();

    let todos = engine.pending(engine.john_doe);
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0].author_id, engine.john_doe);
}

#[test]
fn test_assigned_and_mentioned_coexist() {
    let engine = TestEngine::spawn();
    let mut issue = engine.issue(1, "cc @member");
    engine.service.new_issue(&issue, engine.author).unwrap();

    issue.assignees = vec![engine.member];
    engine
        .service
        .reassigned_assignable(&Target::Issue(issue), engine.author, &[])
        .unwrap();

    let mut actions: Vec<TodoAction> = engine
        .pending(engine.member)
        .into_iter()
        .map(|t| t.action)
        .collect();
    actions.sort_by_key(|a| a.as_int());
    assert_eq!(actions, vec![TodoAction::Assigned, TodoAction::Mentioned]);
}

#[test]
fn test_mentions_in_code_are_ignored() {
    let engine = TestEngine::spawn();
    let issue = engine.issue(1, "```\n@member\n```\nrun `@guest` first");

    let outcome = engine.service.new_issue(&issue, engine.author).unwrap();
    assert!(outcome.is_empty());
}

#[test]
fn test_mentions_in_code_count_when_configured() {
    let engine = TestEngine::spawn_with(TodoSettings {
        ignore_code_blocks: false,
        ..Default::default()
    });
    let issue = engine.issue(1, "```\n@member\n```\nrun `@guest` first");

    let outcome = engine.service.new_issue(&issue, engine.author).unwrap();
    assert_eq!(outcome.created.len(), 2);
    assert_eq!(
        engine.pending(engine.member)[0].action,
        TodoAction::DirectlyAddressed
    );
    assert_eq!(engine.pending(engine.guest)[0].action, TodoAction::Mentioned);
}

#[test]
fn test_issue_without_identity_is_rejected() {
    let engine = TestEngine::spawn();
    let issue = engine.issue(0, "@member");

    let err = engine.service.new_issue(&issue, engine.author).unwrap_err();
    assert!(matches!(err, TodoError::InvalidTarget(_)));
    assert!(engine.todos(engine.member).is_empty());
}

#[test]
fn test_unknown_project_fails_without_writes() {
    let engine = TestEngine::spawn();
    let mut issue = engine.issue(1, "@member hello");
    issue.project_id = 999;
    issue.assignees = vec![engine.assignee];

    let err = engine.service.new_issue(&issue, engine.author).unwrap_err();
    assert!(matches!(err, TodoError::Visibility(_)));
    assert!(engine.todos(engine.member).is_empty());
    assert!(engine.todos(engine.assignee).is_empty());
}

#[test]
fn test_public_project_reaches_non_members() {
    let engine = TestEngine::spawn();
    let mut issue = engine.issue(1, "thanks @non_member");
    issue.project_id = engine.public_project;

    engine.service.new_issue(&issue, engine.author).unwrap();

    let todos = engine.todos(engine.non_member);
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0].state, TodoState::Pending);
    assert_eq!(todos[0].project_id, engine.public_project);
}
