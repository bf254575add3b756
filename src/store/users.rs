use anyhow::{Context, Result};
use rusqlite::{params, params_from_iter, OptionalExtension};
use std::collections::HashMap;
use tracing::info;

use super::{placeholders, SqliteStore};
use crate::user::{User, UserId, UserStore};

impl UserStore for SqliteStore {
    fn create_user(&self, user_handle: &str, admin: bool) -> Result<UserId> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO user (handle, admin) VALUES (?1, ?2)",
            params![user_handle, admin],
        )
        .with_context(|| format!("Failed to create user {}", user_handle))?;
        let user_id = conn.last_insert_rowid() as UserId;
        info!("Created user {} with id {}", user_handle, user_id);
        Ok(user_id)
    }

    fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, handle, admin, todos_pending_count, todos_done_count FROM user WHERE id = ?1",
            params![user_id as i64],
            |row| {
                Ok(User {
                    id: row.get::<_, i64>(0)? as UserId,
                    handle: row.get(1)?,
                    admin: row.get(2)?,
                    todos_pending_count: row.get::<_, i64>(3)? as usize,
                    todos_done_count: row.get::<_, i64>(4)? as usize,
                })
            },
        )
        .optional()
        .with_context(|| format!("Failed to load user {}", user_id))
    }

    fn get_user_id(&self, user_handle: &str) -> Result<Option<UserId>> {
        let conn = self.lock()?;
        let id: Option<i64> = conn
            .query_row(
                "SELECT id FROM user WHERE handle = ?1",
                params![user_handle],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.map(|id| id as UserId))
    }

    fn get_user_ids(&self, user_handles: &[String]) -> Result<HashMap<String, UserId>> {
        if user_handles.is_empty() {
            return Ok(HashMap::new());
        }
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT handle, id FROM user WHERE handle IN ({})",
            placeholders(user_handles.len())
        ))?;
        let ids = stmt
            .query_map(params_from_iter(user_handles.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as UserId))
            })?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(ids)
    }

    fn get_all_user_handles(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT handle FROM user ORDER BY handle")?;
        let handles = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(handles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (SqliteStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::new(temp_dir.path().join("todos.db")).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_create_and_get_user() {
        let (store, _temp_dir) = create_test_store();
        let id = store.create_user("john_doe", false).unwrap();

        let user = store.get_user(id).unwrap().unwrap();
        assert_eq!(user.handle, "john_doe");
        assert!(!user.admin);
        assert_eq!(user.todos_pending_count, 0);
        assert!(store.get_user(id + 100).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_handle_is_rejected() {
        let (store, _temp_dir) = create_test_store();
        store.create_user("john_doe", false).unwrap();
        assert!(store.create_user("john_doe", true).is_err());
    }

    #[test]
    fn test_get_user_ids_skips_unknown_handles() {
        let (store, _temp_dir) = create_test_store();
        let alice = store.create_user("alice", false).unwrap();
        let bob = store.create_user("bob", false).unwrap();

        let ids = store
            .get_user_ids(&["alice".to_string(), "bob".to_string(), "carol".to_string()])
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids["alice"], alice);
        assert_eq!(ids["bob"], bob);
        assert_eq!(store.get_user_id("carol").unwrap(), None);
        assert_eq!(store.get_all_user_handles().unwrap(), vec!["alice", "bob"]);
    }
}
