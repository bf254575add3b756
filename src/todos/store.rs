use anyhow::{bail, Result};

use super::models::{NewTodo, ResolvedByAction, Todo, TodoAction, TodoCounts, TodoFilter, TodoId};
use crate::targets::TargetRef;
use crate::user::UserId;

/// One mutation of the to-do ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerOp {
    /// Inserts a pending to-do unless a live duplicate exists. Actions that
    /// `always_inserts()` skip the duplicate check.
    Upsert(NewTodo),

    /// Marks pending to-dos of a target done with `system_done`, optionally only
    /// those of one recipient and/or one action.
    ResolveForTarget {
        target: TargetRef,
        user_id: Option<UserId>,
        action: Option<TodoAction>,
    },

    /// Marks the given to-dos of `user_id` done. Fails as a whole if any id is
    /// unknown or owned by someone else.
    ResolveCollection {
        ids: Vec<TodoId>,
        user_id: UserId,
        resolved_by: ResolvedByAction,
    },

    /// Puts the given done to-dos of `user_id` back to pending. Same ownership rules.
    RestoreCollection { ids: Vec<TodoId>, user_id: UserId },

    /// Marks every pending to-do of the user done.
    ResolveAllForUser {
        user_id: UserId,
        resolved_by: ResolvedByAction,
    },

    /// Deletes every to-do of a target.
    PurgeTarget(TargetRef),
}

/// Result of one [`LedgerOp`], in the same position as the op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerOutcome {
    /// Id of the new record, None when a pending duplicate already existed.
    Created(Option<TodoId>),
    /// Ids that went from pending to done.
    Resolved(Vec<TodoId>),
    /// Ids that went from done to pending.
    Restored(Vec<TodoId>),
    /// Users that had pending to-dos on the purged target.
    Purged(Vec<UserId>),
}

#[cfg_attr(test, mockall::automock)]
pub trait TodoStore: Send + Sync {
    /// Applies every op in a single transaction and refreshes the cached counters
    /// of all users whose to-dos changed. Either everything is committed or nothing is.
    fn apply(&self, ops: Vec<LedgerOp>) -> Result<Vec<LedgerOutcome>>;

    /// Returns Ok(None) if the to-do does not exist.
    fn get_todo(&self, todo_id: TodoId) -> Result<Option<Todo>>;

    /// Newest first.
    fn get_user_todos(&self, user_id: UserId, filter: &TodoFilter) -> Result<Vec<Todo>>;

    fn get_target_todos(&self, target: &TargetRef) -> Result<Vec<Todo>>;

    fn pending_todo_exists(&self, user_id: UserId, target: &TargetRef) -> Result<bool>;

    /// Counters cached on the user row.
    fn get_cached_counts(&self, user_id: UserId) -> Result<TodoCounts>;

    /// Counters computed from the to-do rows.
    fn count_todos(&self, user_id: UserId) -> Result<TodoCounts>;

    /// Returns the new id, or None if the to-do was deduplicated.
    fn upsert_pending(&self, todo: NewTodo) -> Result<Option<TodoId>> {
        match single(self.apply(vec![LedgerOp::Upsert(todo)])?)? {
            LedgerOutcome::Created(id) => Ok(id),
            other => bail!("Unexpected ledger outcome {:?}", other),
        }
    }

    fn resolve_for_target(
        &self,
        target: &TargetRef,
        user_id: Option<UserId>,
        action: Option<TodoAction>,
    ) -> Result<Vec<TodoId>> {
        let op = LedgerOp::ResolveForTarget {
            target: target.clone(),
            user_id,
            action,
        };
        match single(self.apply(vec![op])?)? {
            LedgerOutcome::Resolved(ids) => Ok(ids),
            other => bail!("Unexpected ledger outcome {:?}", other),
        }
    }

    fn resolve_collection(
        &self,
        ids: &[TodoId],
        user_id: UserId,
        resolved_by: ResolvedByAction,
    ) -> Result<Vec<TodoId>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let op = LedgerOp::ResolveCollection {
            ids: ids.to_vec(),
            user_id,
            resolved_by,
        };
        match single(self.apply(vec![op])?)? {
            LedgerOutcome::Resolved(ids) => Ok(ids),
            other => bail!("Unexpected ledger outcome {:?}", other),
        }
    }

    fn restore_collection(&self, ids: &[TodoId], user_id: UserId) -> Result<Vec<TodoId>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let op = LedgerOp::RestoreCollection {
            ids: ids.to_vec(),
            user_id,
        };
        match single(self.apply(vec![op])?)? {
            LedgerOutcome::Restored(ids) => Ok(ids),
            other => bail!("Unexpected ledger outcome {:?}", other),
        }
    }

    fn purge_target(&self, target: &TargetRef) -> Result<Vec<UserId>> {
        match single(self.apply(vec![LedgerOp::PurgeTarget(target.clone())])?)? {
            LedgerOutcome::Purged(users) => Ok(users),
            other => bail!("Unexpected ledger outcome {:?}", other),
        }
    }
}

fn single(mut outcomes: Vec<LedgerOutcome>) -> Result<LedgerOutcome> {
    if outcomes.len() != 1 {
        bail!("Expected one ledger outcome, got {}", outcomes.len());
    }
    Ok(outcomes.remove(0))
}
