use thiserror::Error;

use super::models::TodoId;
use crate::user::UserId;

#[derive(Debug, Error)]
pub enum TodoError {
    #[error("Unknown to-do action {0}")]
    UnknownAction(i64),

    #[error("Unknown to-do state '{0}'")]
    UnknownState(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("To-do {0} not found")]
    TodoNotFound(TodoId),

    #[error("To-do {todo_id} does not belong to user {user_id}")]
    NotOwned { todo_id: TodoId, user_id: UserId },

    #[error("Visibility check failed: {0:#}")]
    Visibility(anyhow::Error),

    #[error("Reference scan failed: {0:#}")]
    References(anyhow::Error),

    #[error(transparent)]
    Store(anyhow::Error),
}

/// Store errors that carry a domain error keep their variant.
impl From<anyhow::Error> for TodoError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<TodoError>() {
            Ok(todo_error) => todo_error,
            Err(err) => TodoError::Store(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_survive_anyhow_round_trip() {
        let err = anyhow::Error::from(TodoError::NotOwned {
            todo_id: 4,
            user_id: 2,
        });
        assert!(matches!(
            TodoError::from(err),
            TodoError::NotOwned {
                todo_id: 4,
                user_id: 2
            }
        ));
    }

    #[test]
    fn other_errors_become_store_errors() {
        let err = TodoError::from(anyhow::anyhow!("disk I/O error"));
        assert!(matches!(err, TodoError::Store(_)));
        assert_eq!(err.to_string(), "disk I/O error");
    }
}
