//! Decides who receives a to-do for an event, and with which action.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use super::error::TodoError;
use super::models::TodoAction;
use super::task_list::only_task_states_changed;
use crate::references::{ReferenceResolver, References};
use crate::targets::Target;
use crate::user::UserId;
use crate::visibility::VisibilityOracle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Recipient {
    pub user_id: UserId,
    pub action: TodoAction,
}

/// A text body to classify. `previous` is the body before an edit, when known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChange<'a> {
    pub current: &'a str,
    pub previous: Option<&'a str>,
}

impl<'a> TextChange<'a> {
    pub fn created(current: &'a str) -> Self {
        Self {
            current,
            previous: None,
        }
    }

    pub fn edited(previous: Option<&'a str>, current: &'a str) -> Self {
        Self { current, previous }
    }
}

pub struct RecipientResolver {
    references: Arc<dyn ReferenceResolver>,
    visibility: Arc<dyn VisibilityOracle>,
}

impl RecipientResolver {
    pub fn new(
        references: Arc<dyn ReferenceResolver>,
        visibility: Arc<dyn VisibilityOracle>,
    ) -> Self {
        Self {
            references,
            visibility,
        }
    }

    pub fn can_see(&self, user_id: UserId, target: &Target) -> Result<bool, TodoError> {
        self.visibility
            .can_see(user_id, target)
            .map_err(TodoError::Visibility)
    }

    fn scan(&self, text: &str) -> Result<References, TodoError> {
        self.references.scan(text).map_err(TodoError::References)
    }

    /// MENTIONED / DIRECTLY_ADDRESSED recipients of a text body.
    ///
    /// On an edit with a known previous body, a change limited to task-list
    /// checkboxes yields nothing and only users not referenced by the previous
    /// body are considered.
    pub fn mention_recipients(
        &self,
        change: &TextChange<'_>,
        skip: &BTreeSet<UserId>,
        target: &Target,
    ) -> Result<Vec<Recipient>, TodoError> {
        let mut skip = skip.clone();
        if let Some(previous) = change.previous {
            if only_task_states_changed(previous, change.current) {
                debug!("Only task states changed on {}, no mentions", target.reference());
                return Ok(vec![]);
            }
            skip.extend(self.scan(previous)?.all());
        }

        let references = self.scan(change.current)?;
        let mut recipients = Vec::new();
        for user_id in references.all() {
            if skip.contains(&user_id) {
                continue;
            }
            if !self.can_see(user_id, target)? {
                debug!(
                    "User {} cannot see {}, mention dropped",
                    user_id,
                    target.reference()
                );
                continue;
            }
            let action = if references.addressed.contains(&user_id) {
                TodoAction::DirectlyAddressed
            } else {
                TodoAction::Mentioned
            };
            recipients.push(Recipient { user_id, action });
        }
        Ok(recipients)
    }

    /// ASSIGNED recipients: users in `assignees` that were not in `previous_assignees`.
    pub fn assignment_recipients(
        &self,
        target: &Target,
        assignees: &[UserId],
        previous_assignees: &[UserId],
    ) -> Result<Vec<Recipient>, TodoError> {
        let added: BTreeSet<UserId> = assignees
            .iter()
            .filter(|id| !previous_assignees.contains(id))
            .copied()
            .collect();
        self.visible_recipients(target, added, TodoAction::Assigned)
    }

    /// One recipient per merge participant, for build and mergeability failures.
    pub fn participant_recipients(
        &self,
        target: &Target,
        action: TodoAction,
    ) -> Result<Vec<Recipient>, TodoError> {
        let participants: BTreeSet<UserId> = target.merge_participants().iter().copied().collect();
        self.visible_recipients(target, participants, action)
    }

    fn visible_recipients(
        &self,
        target: &Target,
        candidates: BTreeSet<UserId>,
        action: TodoAction,
    ) -> Result<Vec<Recipient>, TodoError> {
        let mut recipients = Vec::new();
        for user_id in candidates {
            if self.can_see(user_id, target)? {
                recipients.push(Recipient { user_id, action });
            } else {
                debug!(
                    "User {} cannot see {}, {} dropped",
                    user_id,
                    target.reference(),
                    action.as_str()
                );
            }
        }
        Ok(recipients)
    }
}
