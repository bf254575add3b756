use super::user_models::{User, UserId};
use anyhow::Result;
use std::collections::HashMap;

pub trait UserStore: Send + Sync {
    /// Creates a new user and returns the user id.
    /// Returns Err if the handle is already taken.
    fn create_user(&self, user_handle: &str, admin: bool) -> Result<UserId>;

    /// Returns the user with the given id.
    /// Returns Ok(None) if the user does not exist.
    fn get_user(&self, user_id: UserId) -> Result<Option<User>>;

    /// Returns a user's id given the handle.
    /// Returns Ok(None) if the user does not exist.
    fn get_user_id(&self, user_handle: &str) -> Result<Option<UserId>>;

    /// Resolves many handles at once, unknown handles are left out of the map.
    fn get_user_ids(&self, user_handles: &[String]) -> Result<HashMap<String, UserId>>;

    /// Returns all users' handles.
    fn get_all_user_handles(&self) -> Result<Vec<String>>;
}
