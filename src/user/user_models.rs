//! User data models

use serde::{Deserialize, Serialize};

pub type UserId = usize;

/// A user as seen by the to-do engine, with its denormalized to-do counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub handle: String,
    pub admin: bool,
    pub todos_pending_count: usize,
    pub todos_done_count: usize,
}

impl User {
    /// The `@handle` form used to reference this user in text.
    pub fn to_reference(&self) -> String {
        format!("@{}", self.handle)
    }
}
