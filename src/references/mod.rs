//! Mention extraction: turns a text body into the users it refers to.

mod parser;
mod resolver;

use anyhow::Result;
use std::collections::BTreeSet;

use crate::user::UserId;

pub use parser::{scan_handles, HandleMentions};
pub use resolver::HandleReferenceResolver;

/// Users referenced by a text body.
///
/// `addressed` holds users named in the mention run that opens a line, `mentioned`
/// every other reference. A user can appear in both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct References {
    pub addressed: BTreeSet<UserId>,
    pub mentioned: BTreeSet<UserId>,
}

impl References {
    pub fn is_empty(&self) -> bool {
        self.addressed.is_empty() && self.mentioned.is_empty()
    }

    pub fn all(&self) -> BTreeSet<UserId> {
        self.addressed.union(&self.mentioned).copied().collect()
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait ReferenceResolver: Send + Sync {
    fn scan(&self, text: &str) -> Result<References>;
}
