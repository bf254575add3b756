//! Who may read a target. Every recipient is checked here before a to-do is created.

mod oracle;
mod policy;

use anyhow::Result;

use crate::targets::Target;
use crate::user::UserId;

pub use oracle::ProjectAccessOracle;
pub use policy::{can_read, Viewer};

#[cfg_attr(test, mockall::automock)]
pub trait VisibilityOracle: Send + Sync {
    fn can_see(&self, user_id: UserId, target: &Target) -> Result<bool>;
}
