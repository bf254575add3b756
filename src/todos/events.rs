use serde::{Deserialize, Serialize};

use super::models::{ResolvedByAction, TodoId};
use crate::targets::{Issue, MergeRequest, Note, Target};
use crate::user::UserId;

fn default_resolved_by() -> ResolvedByAction {
    ResolvedByAction::ApiDone
}

/// A domain event in serialized form, as fed to [`super::TodoService::handle`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TodoEvent {
    NewIssue {
        issue: Issue,
        current_user: UserId,
    },
    UpdateIssue {
        issue: Issue,
        current_user: UserId,
        #[serde(default)]
        previous_description: Option<String>,
        #[serde(default)]
        skip_users: Vec<UserId>,
    },
    CloseIssue {
        issue: Issue,
        current_user: UserId,
    },
    ReopenIssue {
        issue: Issue,
        current_user: UserId,
    },
    NewMergeRequest {
        merge_request: MergeRequest,
        current_user: UserId,
    },
    UpdateMergeRequest {
        merge_request: MergeRequest,
        current_user: UserId,
        #[serde(default)]
        previous_description: Option<String>,
        #[serde(default)]
        skip_users: Vec<UserId>,
    },
    CloseMergeRequest {
        merge_request: MergeRequest,
        current_user: UserId,
    },
    ReopenMergeRequest {
        merge_request: MergeRequest,
        current_user: UserId,
    },
    MergeMergeRequest {
        merge_request: MergeRequest,
        current_user: UserId,
    },
    Reassigned {
        target: Target,
        current_user: UserId,
        #[serde(default)]
        old_assignees: Vec<UserId>,
    },
    BuildFailed {
        merge_request: MergeRequest,
    },
    Push {
        merge_request: MergeRequest,
        current_user: UserId,
    },
    Unmergeable {
        merge_request: MergeRequest,
    },
    AwardEmoji {
        target: Target,
        current_user: UserId,
    },
    NewNote {
        note: Note,
        current_user: UserId,
    },
    UpdateNote {
        note: Note,
        current_user: UserId,
        #[serde(default)]
        previous_body: Option<String>,
        #[serde(default)]
        skip_users: Vec<UserId>,
    },
    MarkTodo {
        target: Target,
        current_user: UserId,
    },
    ResolveTodosForTarget {
        target: Target,
        current_user: UserId,
    },
    TargetDestroyed {
        target: Target,
    },
    ResolveTodos {
        ids: Vec<TodoId>,
        current_user: UserId,
        #[serde(default = "default_resolved_by")]
        resolved_by: ResolvedByAction,
    },
    RestoreTodos {
        ids: Vec<TodoId>,
        current_user: UserId,
    },
    MarkAllDone {
        current_user: UserId,
    },
}

impl TodoEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            TodoEvent::NewIssue { .. } => "new_issue",
            TodoEvent::UpdateIssue { .. } => "update_issue",
            TodoEvent::CloseIssue { .. } => "close_issue",
            TodoEvent::ReopenIssue { .. } => "reopen_issue",
            TodoEvent::NewMergeRequest { .. } => "new_merge_request",
            TodoEvent::UpdateMergeRequest { .. } => "update_merge_request",
            TodoEvent::CloseMergeRequest { .. } => "close_merge_request",
            TodoEvent::ReopenMergeRequest { .. } => "reopen_merge_request",
            TodoEvent::MergeMergeRequest { .. } => "merge_merge_request",
            TodoEvent::Reassigned { .. } => "reassigned_assignable",
            TodoEvent::BuildFailed { .. } => "merge_request_build_failed",
            TodoEvent::Push { .. } => "merge_request_push",
            TodoEvent::Unmergeable { .. } => "merge_request_became_unmergeable",
            TodoEvent::AwardEmoji { .. } => "new_award_emoji",
            TodoEvent::NewNote { .. } => "new_note",
            TodoEvent::UpdateNote { .. } => "update_note",
            TodoEvent::MarkTodo { .. } => "mark_todo",
            TodoEvent::ResolveTodosForTarget { .. } => "resolve_todos_for_target",
            TodoEvent::TargetDestroyed { .. } => "destroy_target",
            TodoEvent::ResolveTodos { .. } => "resolve_todos",
            TodoEvent::RestoreTodos { .. } => "restore_todos",
            TodoEvent::MarkAllDone { .. } => "mark_all_done",
        }
    }
}
