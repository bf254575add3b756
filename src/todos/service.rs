//! Entry points for every event that can create or resolve to-dos.
//!
//! Each event is handled in two phases: recipients are classified first, which only
//! reads, and then every ledger mutation of the event goes to the store as one batch.
//! A failure during classification leaves the ledger untouched.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::error::TodoError;
use super::events::TodoEvent;
use super::models::{NewTodo, ResolvedByAction, TodoAction, TodoId};
use super::recipients::{Recipient, RecipientResolver, TextChange};
use super::store::{LedgerOp, LedgerOutcome, TodoStore};
use crate::config::TodoSettings;
use crate::metrics;
use crate::references::ReferenceResolver;
use crate::targets::{Issue, MergeRequest, Note, Target};
use crate::user::UserId;
use crate::visibility::VisibilityOracle;

/// Ids touched by one event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventOutcome {
    pub created: Vec<TodoId>,
    pub resolved: Vec<TodoId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restored: Vec<TodoId>,
}

impl EventOutcome {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.resolved.is_empty() && self.restored.is_empty()
    }
}

pub struct TodoService {
    store: Arc<dyn TodoStore>,
    recipients: RecipientResolver,
    settings: TodoSettings,
}

impl TodoService {
    pub fn new(
        store: Arc<dyn TodoStore>,
        references: Arc<dyn ReferenceResolver>,
        visibility: Arc<dyn VisibilityOracle>,
        settings: TodoSettings,
    ) -> Self {
        Self {
            store,
            recipients: RecipientResolver::new(references, visibility),
            settings,
        }
    }

    // Issues

    /// Assignees get ASSIGNED, then the description is scanned with assignees skipped.
    pub fn new_issue(&self, issue: &Issue, current_user: UserId) -> Result<EventOutcome, TodoError> {
        self.timed("new_issue", || {
            self.new_issuable(&Target::Issue(issue.clone()), current_user)
        })
    }

    /// Users in `skip_users` get nothing from this edit.
    pub fn update_issue(
        &self,
        issue: &Issue,
        current_user: UserId,
        previous_description: Option<&str>,
        skip_users: &[UserId],
    ) -> Result<EventOutcome, TodoError> {
        self.timed("update_issue", || {
            self.update_issuable(
                &Target::Issue(issue.clone()),
                current_user,
                previous_description,
                skip_users,
            )
        })
    }

    pub fn close_issue(&self, issue: &Issue, current_user: UserId) -> Result<EventOutcome, TodoError> {
        self.timed("close_issue", || {
            self.resolve_all_on_target(&Target::Issue(issue.clone()), current_user)
        })
    }

    /// Reopening never creates to-dos.
    pub fn reopen_issue(&self, issue: &Issue, _current_user: UserId) -> Result<EventOutcome, TodoError> {
        self.timed("reopen_issue", || {
            Target::Issue(issue.clone()).validate()?;
            Ok(EventOutcome::default())
        })
    }

    // Merge requests

    pub fn new_merge_request(
        &self,
        merge_request: &MergeRequest,
        current_user: UserId,
    ) -> Result<EventOutcome, TodoError> {
        self.timed("new_merge_request", || {
            self.new_issuable(&Target::MergeRequest(merge_request.clone()), current_user)
        })
    }

    pub fn update_merge_request(
        &self,
        merge_request: &MergeRequest,
        current_user: UserId,
        previous_description: Option<&str>,
        skip_users: &[UserId],
    ) -> Result<EventOutcome, TodoError> {
        self.timed("update_merge_request", || {
            self.update_issuable(
                &Target::MergeRequest(merge_request.clone()),
                current_user,
                previous_description,
                skip_users,
            )
        })
    }

    pub fn close_merge_request(
        &self,
        merge_request: &MergeRequest,
        current_user: UserId,
    ) -> Result<EventOutcome, TodoError> {
        self.timed("close_merge_request", || {
            self.resolve_all_on_target(&Target::MergeRequest(merge_request.clone()), current_user)
        })
    }

    pub fn reopen_merge_request(
        &self,
        merge_request: &MergeRequest,
        _current_user: UserId,
    ) -> Result<EventOutcome, TodoError> {
        self.timed("reopen_merge_request", || {
            Target::MergeRequest(merge_request.clone()).validate()?;
            Ok(EventOutcome::default())
        })
    }

    pub fn merge_merge_request(
        &self,
        merge_request: &MergeRequest,
        current_user: UserId,
    ) -> Result<EventOutcome, TodoError> {
        self.timed("merge_merge_request", || {
            self.resolve_all_on_target(&Target::MergeRequest(merge_request.clone()), current_user)
        })
    }

    /// Users added to the assignees since `old_assignees` get ASSIGNED, the acting
    /// user included.
    pub fn reassigned_assignable(
        &self,
        target: &Target,
        current_user: UserId,
        old_assignees: &[UserId],
    ) -> Result<EventOutcome, TodoError> {
        self.timed("reassigned_assignable", || {
            target.validate()?;
            let recipients =
                self.recipients
                    .assignment_recipients(target, target.assignees(), old_assignees)?;
            let ops = recipients
                .into_iter()
                .map(|r| LedgerOp::Upsert(new_todo(target, r, current_user, None)))
                .collect();
            self.commit(ops)
        })
    }

    /// Every merge participant gets a fresh BUILD_FAILED to-do authored by themselves.
    pub fn merge_request_build_failed(
        &self,
        merge_request: &MergeRequest,
    ) -> Result<EventOutcome, TodoError> {
        self.timed("merge_request_build_failed", || {
            self.notify_participants(
                &Target::MergeRequest(merge_request.clone()),
                TodoAction::BuildFailed,
            )
        })
    }

    /// A push by `current_user` resolves their own BUILD_FAILED to-dos on the merge request.
    pub fn merge_request_push(
        &self,
        merge_request: &MergeRequest,
        current_user: UserId,
    ) -> Result<EventOutcome, TodoError> {
        self.timed("merge_request_push", || {
            let target = Target::MergeRequest(merge_request.clone());
            target.validate()?;
            self.commit(vec![LedgerOp::ResolveForTarget {
                target: target.reference(),
                user_id: Some(current_user),
                action: Some(TodoAction::BuildFailed),
            }])
        })
    }

    pub fn merge_request_became_unmergeable(
        &self,
        merge_request: &MergeRequest,
    ) -> Result<EventOutcome, TodoError> {
        self.timed("merge_request_became_unmergeable", || {
            self.notify_participants(
                &Target::MergeRequest(merge_request.clone()),
                TodoAction::Unmergeable,
            )
        })
    }

    // Reactions and comments

    pub fn new_award_emoji(
        &self,
        target: &Target,
        current_user: UserId,
    ) -> Result<EventOutcome, TodoError> {
        self.timed("new_award_emoji", || {
            self.resolve_own_on_target(target, current_user)
        })
    }

    /// Resolves the commenter's pending to-dos on the noteable, then classifies the body.
    pub fn new_note(&self, note: &Note, current_user: UserId) -> Result<EventOutcome, TodoError> {
        self.timed("new_note", || {
            if !note.can_create_todo() {
                debug!("Note {} cannot create to-dos", note.id);
                return Ok(EventOutcome::default());
            }
            let target = &note.noteable;
            target.validate()?;

            let mut ops = vec![LedgerOp::ResolveForTarget {
                target: target.reference(),
                user_id: Some(current_user),
                action: None,
            }];
            let recipients = self.recipients.mention_recipients(
                &TextChange::created(&note.body),
                &BTreeSet::new(),
                target,
            )?;
            ops.extend(
                recipients
                    .into_iter()
                    .map(|r| LedgerOp::Upsert(new_todo(target, r, current_user, Some(note.id)))),
            );
            self.commit(ops)
        })
    }

    pub fn update_note(
        &self,
        note: &Note,
        current_user: UserId,
        previous_body: Option<&str>,
        skip_users: &[UserId],
    ) -> Result<EventOutcome, TodoError> {
        self.timed("update_note", || {
            if !note.can_create_todo() {
                debug!("Note {} cannot create to-dos", note.id);
                return Ok(EventOutcome::default());
            }
            let target = &note.noteable;
            target.validate()?;

            let recipients = self.recipients.mention_recipients(
                &TextChange::edited(previous_body, &note.body),
                &skip_users.iter().copied().collect(),
                target,
            )?;
            let ops = recipients
                .into_iter()
                .map(|r| LedgerOp::Upsert(new_todo(target, r, current_user, Some(note.id))))
                .collect();
            self.commit(ops)
        })
    }

    // Manual actions

    /// Adds a MARKED to-do for the acting user. Repeated calls add repeated to-dos.
    pub fn mark_todo(&self, target: &Target, current_user: UserId) -> Result<EventOutcome, TodoError> {
        self.timed("mark_todo", || {
            target.validate()?;
            if !target.accepts_todos() || !self.recipients.can_see(current_user, target)? {
                debug!(
                    "User {} cannot mark {} as to-do",
                    current_user,
                    target.reference()
                );
                return Ok(EventOutcome::default());
            }
            let recipient = Recipient {
                user_id: current_user,
                action: TodoAction::Marked,
            };
            self.commit(vec![LedgerOp::Upsert(new_todo(
                target,
                recipient,
                current_user,
                None,
            ))])
        })
    }

    /// True if the user has any pending to-do on the target.
    pub fn todo_exists(&self, target: &Target, current_user: UserId) -> Result<bool, TodoError> {
        Ok(self
            .store
            .pending_todo_exists(current_user, &target.reference())?)
    }

    pub fn resolve_todos_for_target(
        &self,
        target: &Target,
        current_user: UserId,
    ) -> Result<EventOutcome, TodoError> {
        self.timed("resolve_todos_for_target", || {
            self.resolve_own_on_target(target, current_user)
        })
    }

    /// Runs `destroy` and, only if it succeeds, deletes the target's to-dos.
    ///
    /// Returns what `destroy` returned and the users whose pending counters changed.
    /// The purge runs in its own transaction after `destroy` has committed. If it fails
    /// the rows stay behind until a `target_destroyed` event for the same target is
    /// replayed.
    pub fn destroy_target<T, F>(&self, target: &Target, destroy: F) -> Result<(T, Vec<UserId>), TodoError>
    where
        F: FnOnce() -> anyhow::Result<T>,
    {
        let start = Instant::now();
        let reference = target.reference();
        let result = destroy()
            .with_context(|| format!("Failed to destroy {}", reference))
            .map_err(TodoError::Store)
            .and_then(|value| {
                let users = self.store.purge_target(&reference).map_err(|err| {
                    warn!(
                        "{} was destroyed but its to-dos were not purged: {:#}",
                        reference, err
                    );
                    TodoError::from(err)
                })?;
                info!(
                    "Purged to-dos of {}, {} user(s) had pending to-dos",
                    reference,
                    users.len()
                );
                Ok((value, users))
            });
        metrics::record_event("destroy_target", result.is_ok(), start.elapsed());
        result
    }

    pub fn resolve_todo(
        &self,
        todo_id: TodoId,
        current_user: UserId,
        resolved_by: ResolvedByAction,
    ) -> Result<bool, TodoError> {
        Ok(!self
            .resolve_todos(&[todo_id], current_user, resolved_by)?
            .is_empty())
    }

    pub fn restore_todo(&self, todo_id: TodoId, current_user: UserId) -> Result<bool, TodoError> {
        Ok(!self.restore_todos(&[todo_id], current_user)?.is_empty())
    }

    /// Marks the user's to-dos done. Returns the ids that were pending.
    pub fn resolve_todos(
        &self,
        ids: &[TodoId],
        current_user: UserId,
        resolved_by: ResolvedByAction,
    ) -> Result<Vec<TodoId>, TodoError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let resolved = self
            .store
            .resolve_collection(ids, current_user, resolved_by)
            .map_err(|err| {
                warn!(
                    "Rejected resolving {} to-do(s) for user {}: {:#}",
                    ids.len(),
                    current_user,
                    err
                );
                TodoError::from(err)
            })?;
        metrics::record_todos_resolved(resolved_by, resolved.len());
        Ok(resolved)
    }

    /// Puts the user's done to-dos back to pending. Returns the ids that were done.
    pub fn restore_todos(&self, ids: &[TodoId], current_user: UserId) -> Result<Vec<TodoId>, TodoError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let restored = self
            .store
            .restore_collection(ids, current_user)
            .map_err(|err| {
                warn!(
                    "Rejected restoring {} to-do(s) for user {}: {:#}",
                    ids.len(),
                    current_user,
                    err
                );
                TodoError::from(err)
            })?;
        metrics::record_todos_restored("api", restored.len());
        Ok(restored)
    }

    pub fn mark_all_done(&self, current_user: UserId) -> Result<Vec<TodoId>, TodoError> {
        let outcome = self.timed("mark_all_done", || {
            self.commit(vec![LedgerOp::ResolveAllForUser {
                user_id: current_user,
                resolved_by: ResolvedByAction::MarkAllDone,
            }])
        })?;
        Ok(outcome.resolved)
    }

    /// Dispatches a serialized event to its entry point.
    pub fn handle(&self, event: &TodoEvent) -> Result<EventOutcome, TodoError> {
        match event {
            TodoEvent::NewIssue {
                issue,
                current_user,
            } => self.new_issue(issue, *current_user),
            TodoEvent::UpdateIssue {
                issue,
                current_user,
                previous_description,
                skip_users,
            } => self.update_issue(
                issue,
                *current_user,
                previous_description.as_deref(),
                skip_users,
            ),
            TodoEvent::CloseIssue {
                issue,
                current_user,
            } => self.close_issue(issue, *current_user),
            TodoEvent::ReopenIssue {
                issue,
                current_user,
            } => self.reopen_issue(issue, *current_user),
            TodoEvent::NewMergeRequest {
                merge_request,
                current_user,
            } => self.new_merge_request(merge_request, *current_user),
            TodoEvent::UpdateMergeRequest {
                merge_request,
                current_user,
                previous_description,
                skip_users,
            } => self.update_merge_request(
                merge_request,
                *current_user,
                previous_description.as_deref(),
                skip_users,
            ),
            TodoEvent::CloseMergeRequest {
                merge_request,
                current_user,
            } => self.close_merge_request(merge_request, *current_user),
            TodoEvent::ReopenMergeRequest {
                merge_request,
                current_user,
            } => self.reopen_merge_request(merge_request, *current_user),
            TodoEvent::MergeMergeRequest {
                merge_request,
                current_user,
            } => self.merge_merge_request(merge_request, *current_user),
            TodoEvent::Reassigned {
                target,
                current_user,
                old_assignees,
            } => self.reassigned_assignable(target, *current_user, old_assignees),
            TodoEvent::BuildFailed { merge_request } => {
                self.merge_request_build_failed(merge_request)
            }
            TodoEvent::Push {
                merge_request,
                current_user,
            } => self.merge_request_push(merge_request, *current_user),
            TodoEvent::Unmergeable { merge_request } => {
                self.merge_request_became_unmergeable(merge_request)
            }
            TodoEvent::AwardEmoji {
                target,
                current_user,
            } => self.new_award_emoji(target, *current_user),
            TodoEvent::NewNote { note, current_user } => self.new_note(note, *current_user),
            TodoEvent::UpdateNote {
                note,
                current_user,
                previous_body,
                skip_users,
            } => self.update_note(note, *current_user, previous_body.as_deref(), skip_users),
            TodoEvent::MarkTodo {
                target,
                current_user,
            } => self.mark_todo(target, *current_user),
            TodoEvent::ResolveTodosForTarget {
                target,
                current_user,
            } => self.resolve_todos_for_target(target, *current_user),
            TodoEvent::TargetDestroyed { target } => {
                self.destroy_target(target, || Ok(()))?;
                Ok(EventOutcome::default())
            }
            TodoEvent::ResolveTodos {
                ids,
                current_user,
                resolved_by,
            } => Ok(EventOutcome {
                resolved: self.resolve_todos(ids, *current_user, *resolved_by)?,
                ..Default::default()
            }),
            TodoEvent::RestoreTodos { ids, current_user } => Ok(EventOutcome {
                restored: self.restore_todos(ids, *current_user)?,
                ..Default::default()
            }),
            TodoEvent::MarkAllDone { current_user } => Ok(EventOutcome {
                resolved: self.mark_all_done(*current_user)?,
                ..Default::default()
            }),
        }
    }

    fn new_issuable(&self, target: &Target, current_user: UserId) -> Result<EventOutcome, TodoError> {
        target.validate()?;

        let assignees: Vec<UserId> = target
            .assignees()
            .iter()
            .copied()
            .filter(|id| self.settings.assign_author_on_create || *id != current_user)
            .collect();
        let mut recipients = self
            .recipients
            .assignment_recipients(target, &assignees, &[])?;

        // Only users given ASSIGNED are skipped, a self-assigned author can still be mentioned.
        let skip: BTreeSet<UserId> = recipients.iter().map(|r| r.user_id).collect();
        recipients.extend(self.recipients.mention_recipients(
            &TextChange::created(target.text()),
            &skip,
            target,
        )?);

        let ops = recipients
            .into_iter()
            .map(|r| LedgerOp::Upsert(new_todo(target, r, current_user, None)))
            .collect();
        self.commit(ops)
    }

    fn update_issuable(
        &self,
        target: &Target,
        current_user: UserId,
        previous_text: Option<&str>,
        skip_users: &[UserId],
    ) -> Result<EventOutcome, TodoError> {
        target.validate()?;
        let recipients = self.recipients.mention_recipients(
            &TextChange::edited(previous_text, target.text()),
            &skip_users.iter().copied().collect(),
            target,
        )?;
        let ops = recipients
            .into_iter()
            .map(|r| LedgerOp::Upsert(new_todo(target, r, current_user, None)))
            .collect();
        self.commit(ops)
    }

    fn resolve_all_on_target(
        &self,
        target: &Target,
        _current_user: UserId,
    ) -> Result<EventOutcome, TodoError> {
        target.validate()?;
        self.commit(vec![LedgerOp::ResolveForTarget {
            target: target.reference(),
            user_id: None,
            action: None,
        }])
    }

    fn resolve_own_on_target(
        &self,
        target: &Target,
        current_user: UserId,
    ) -> Result<EventOutcome, TodoError> {
        target.validate()?;
        self.commit(vec![LedgerOp::ResolveForTarget {
            target: target.reference(),
            user_id: Some(current_user),
            action: None,
        }])
    }

    fn notify_participants(
        &self,
        target: &Target,
        action: TodoAction,
    ) -> Result<EventOutcome, TodoError> {
        target.validate()?;
        let ops = self
            .recipients
            .participant_recipients(target, action)?
            .into_iter()
            .map(|r| LedgerOp::Upsert(new_todo(target, r, r.user_id, None)))
            .collect();
        self.commit(ops)
    }

    /// Sends the event's ops to the store as one batch and collects the outcome.
    fn commit(&self, ops: Vec<LedgerOp>) -> Result<EventOutcome, TodoError> {
        if ops.is_empty() {
            return Ok(EventOutcome::default());
        }

        let tallies: Vec<Tally> = ops.iter().map(Tally::of).collect();
        let outcomes = self.store.apply(ops)?;

        let mut event_outcome = EventOutcome::default();
        for (tally, outcome) in tallies.into_iter().zip(outcomes) {
            match (tally, outcome) {
                (Tally::Created(action), LedgerOutcome::Created(Some(id))) => {
                    metrics::record_todo_created(action);
                    event_outcome.created.push(id);
                }
                (Tally::Resolved(resolved_by), LedgerOutcome::Resolved(ids)) => {
                    metrics::record_todos_resolved(resolved_by, ids.len());
                    event_outcome.resolved.extend(ids);
                }
                (_, LedgerOutcome::Restored(ids)) => {
                    metrics::record_todos_restored("event", ids.len());
                    event_outcome.restored.extend(ids);
                }
                _ => {}
            }
        }
        Ok(event_outcome)
    }

    fn timed<F>(&self, event: &'static str, handler: F) -> Result<EventOutcome, TodoError>
    where
        F: FnOnce() -> Result<EventOutcome, TodoError>,
    {
        let start = Instant::now();
        let result = handler();
        metrics::record_event(event, result.is_ok(), start.elapsed());
        match &result {
            Ok(outcome) => debug!(
                "{}: {} created, {} resolved",
                event,
                outcome.created.len(),
                outcome.resolved.len()
            ),
            Err(err) => warn!("{} failed: {}", event, err),
        }
        result
    }
}

/// What a ledger op counts towards in the metrics.
enum Tally {
    Created(TodoAction),
    Resolved(ResolvedByAction),
    Other,
}

impl Tally {
    fn of(op: &LedgerOp) -> Self {
        match op {
            LedgerOp::Upsert(todo) => Tally::Created(todo.action),
            LedgerOp::ResolveForTarget { .. } => Tally::Resolved(ResolvedByAction::SystemDone),
            LedgerOp::ResolveCollection { resolved_by, .. }
            | LedgerOp::ResolveAllForUser { resolved_by, .. } => Tally::Resolved(*resolved_by),
            LedgerOp::RestoreCollection { .. } | LedgerOp::PurgeTarget(_) => Tally::Other,
        }
    }
}

fn new_todo(target: &Target, recipient: Recipient, author_id: UserId, note_id: Option<usize>) -> NewTodo {
    NewTodo {
        user_id: recipient.user_id,
        author_id,
        project_id: target.project_id(),
        target: target.reference(),
        note_id,
        action: recipient.action,
    }
}
