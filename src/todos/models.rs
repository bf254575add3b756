use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::TodoError;
use crate::project::ProjectId;
use crate::targets::{TargetRef, TargetType};
use crate::user::UserId;

pub type TodoId = usize;

/// Why a to-do exists. The integer codes are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoAction {
    Assigned,
    Mentioned,
    BuildFailed,
    Marked,
    Unmergeable,
    DirectlyAddressed,
}

impl TodoAction {
    pub fn as_int(&self) -> i64 {
        match self {
            TodoAction::Assigned => 1,
            TodoAction::Mentioned => 2,
            TodoAction::BuildFailed => 3,
            TodoAction::Marked => 4,
            TodoAction::Unmergeable => 6,
            TodoAction::DirectlyAddressed => 7,
        }
    }

    pub fn from_int(value: i64) -> Result<Self, TodoError> {
        match value {
            1 => Ok(TodoAction::Assigned),
            2 => Ok(TodoAction::Mentioned),
            3 => Ok(TodoAction::BuildFailed),
            4 => Ok(TodoAction::Marked),
            6 => Ok(TodoAction::Unmergeable),
            7 => Ok(TodoAction::DirectlyAddressed),
            _ => Err(TodoError::UnknownAction(value)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TodoAction::Assigned => "assigned",
            TodoAction::Mentioned => "mentioned",
            TodoAction::BuildFailed => "build_failed",
            TodoAction::Marked => "marked",
            TodoAction::Unmergeable => "unmergeable",
            TodoAction::DirectlyAddressed => "directly_addressed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "assigned" => Some(TodoAction::Assigned),
            "mentioned" => Some(TodoAction::Mentioned),
            "build_failed" => Some(TodoAction::BuildFailed),
            "marked" => Some(TodoAction::Marked),
            "unmergeable" => Some(TodoAction::Unmergeable),
            "directly_addressed" => Some(TodoAction::DirectlyAddressed),
            _ => None,
        }
    }

    /// Actions that get a fresh record on every trigger, pending duplicates or not.
    pub fn always_inserts(&self) -> bool {
        matches!(
            self,
            TodoAction::Marked | TodoAction::BuildFailed | TodoAction::Unmergeable
        )
    }

    /// Actions whose pending records block a new record of this action on the same target.
    pub fn conflicting_actions(&self) -> &'static [TodoAction] {
        match self {
            TodoAction::Mentioned | TodoAction::DirectlyAddressed => {
                &[TodoAction::Mentioned, TodoAction::DirectlyAddressed]
            }
            TodoAction::Assigned => &[TodoAction::Assigned],
            TodoAction::BuildFailed | TodoAction::Marked | TodoAction::Unmergeable => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoState {
    Pending,
    Done,
}

impl TodoState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TodoState::Pending => "pending",
            TodoState::Done => "done",
        }
    }

    pub fn parse(s: &str) -> Result<Self, TodoError> {
        match s {
            "pending" => Ok(TodoState::Pending),
            "done" => Ok(TodoState::Done),
            other => Err(TodoError::UnknownState(other.to_string())),
        }
    }
}

/// How a to-do became done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedByAction {
    SystemDone,
    ApiAllDone,
    ApiDone,
    MarkAllDone,
    MarkDone,
}

impl ResolvedByAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolvedByAction::SystemDone => "system_done",
            ResolvedByAction::ApiAllDone => "api_all_done",
            ResolvedByAction::ApiDone => "api_done",
            ResolvedByAction::MarkAllDone => "mark_all_done",
            ResolvedByAction::MarkDone => "mark_done",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "system_done" => Some(ResolvedByAction::SystemDone),
            "api_all_done" => Some(ResolvedByAction::ApiAllDone),
            "api_done" => Some(ResolvedByAction::ApiDone),
            "mark_all_done" => Some(ResolvedByAction::MarkAllDone),
            "mark_done" => Some(ResolvedByAction::MarkDone),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: TodoId,
    pub user_id: UserId,
    pub author_id: UserId,
    pub project_id: ProjectId,
    pub target: TargetRef,
    pub note_id: Option<usize>,
    pub action: TodoAction,
    pub state: TodoState,
    pub resolved_by_action: Option<ResolvedByAction>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Todo {
    pub fn is_pending(&self) -> bool {
        self.state == TodoState::Pending
    }
}

/// A to-do the dispatcher wants to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTodo {
    pub user_id: UserId,
    pub author_id: UserId,
    pub project_id: ProjectId,
    pub target: TargetRef,
    pub note_id: Option<usize>,
    pub action: TodoAction,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoCounts {
    pub pending: usize,
    pub done: usize,
}

/// Narrows a user's to-do listing. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoFilter {
    pub state: Option<TodoState>,
    pub action: Option<TodoAction>,
    pub project_id: Option<ProjectId>,
    pub target_type: Option<TargetType>,
}
