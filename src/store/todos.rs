use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, OptionalExtension, Transaction};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

use super::{placeholders, SqliteStore};
use crate::targets::{TargetRef, TargetType};
use crate::todos::{
    LedgerOp, LedgerOutcome, NewTodo, ResolvedByAction, Todo, TodoAction, TodoCounts, TodoError,
    TodoFilter, TodoId, TodoState, TodoStore,
};
use crate::user::UserId;

const TODO_COLUMNS: &str = "id, user_id, author_id, project_id, target_type, target_id, commit_id, \
     note_id, action, state, resolved_by_action, created_at, updated_at";

const TARGET_CLAUSE: &str = "target_type = ? AND target_id IS ? AND commit_id IS ?";

fn target_values(target: &TargetRef) -> Vec<Value> {
    vec![
        Value::Text(target.target_type.as_str().to_string()),
        target
            .target_id
            .map(|id| Value::Integer(id as i64))
            .unwrap_or(Value::Null),
        target
            .commit_id
            .clone()
            .map(Value::Text)
            .unwrap_or(Value::Null),
    ]
}

/// Binds a whole id set as one JSON array parameter, read back with `json_each`,
/// so large sets stay under SQLite's bound variable limit.
const IDS_CLAUSE: &str = "id IN (SELECT value FROM json_each(?))";

fn ids_value(ids: &BTreeSet<usize>) -> Result<Value> {
    Ok(Value::Text(serde_json::to_string(ids)?))
}

fn conversion_error(column: usize, sql_type: Type, err: TodoError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, sql_type, Box::new(err))
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn row_to_todo(row: &rusqlite::Row) -> rusqlite::Result<Todo> {
    let target_type: String = row.get(4)?;
    let target_type = TargetType::parse(&target_type).ok_or_else(|| {
        conversion_error(
            4,
            Type::Text,
            TodoError::InvalidTarget(format!("unknown target type '{}'", target_type)),
        )
    })?;
    let action = TodoAction::from_int(row.get(8)?).map_err(|e| conversion_error(8, Type::Integer, e))?;
    let state = TodoState::parse(&row.get::<_, String>(9)?)
        .map_err(|e| conversion_error(9, Type::Text, e))?;
    let resolved_by_action = match row.get::<_, Option<String>>(10)? {
        Some(value) => Some(ResolvedByAction::parse(&value).ok_or_else(|| {
            conversion_error(10, Type::Text, TodoError::UnknownState(value.clone()))
        })?),
        None => None,
    };

    Ok(Todo {
        id: row.get::<_, i64>(0)? as TodoId,
        user_id: row.get::<_, i64>(1)? as UserId,
        author_id: row.get::<_, i64>(2)? as UserId,
        project_id: row.get::<_, i64>(3)? as usize,
        target: TargetRef {
            target_type,
            target_id: row.get::<_, Option<i64>>(5)?.map(|id| id as usize),
            commit_id: row.get(6)?,
        },
        note_id: row.get::<_, Option<i64>>(7)?.map(|id| id as usize),
        action,
        state,
        resolved_by_action,
        created_at: timestamp(row.get(11)?),
        updated_at: timestamp(row.get(12)?),
    })
}

impl SqliteStore {
    fn apply_op(
        tx: &Transaction,
        op: LedgerOp,
        now: i64,
        touched: &mut BTreeSet<UserId>,
    ) -> Result<LedgerOutcome> {
        match op {
            LedgerOp::Upsert(todo) => {
                let created = Self::upsert_todo(tx, &todo, now)?;
                if created.is_some() {
                    touched.insert(todo.user_id);
                }
                Ok(LedgerOutcome::Created(created))
            }
            LedgerOp::ResolveForTarget {
                target,
                user_id,
                action,
            } => {
                let mut sql = format!(
                    "UPDATE todo SET state = 'done', resolved_by_action = ?, updated_at = ?
                     WHERE state = 'pending' AND {}",
                    TARGET_CLAUSE
                );
                let mut values = vec![
                    Value::Text(ResolvedByAction::SystemDone.as_str().to_string()),
                    Value::Integer(now),
                ];
                values.extend(target_values(&target));
                if let Some(user_id) = user_id {
                    sql.push_str(" AND user_id = ?");
                    values.push(Value::Integer(user_id as i64));
                }
                if let Some(action) = action {
                    sql.push_str(" AND action = ?");
                    values.push(Value::Integer(action.as_int()));
                }
                sql.push_str(" RETURNING id, user_id");
                let resolved = Self::returning_ids(tx, &sql, values, touched)?;
                debug!("Resolved {} to-do(s) on {}", resolved.len(), target);
                Ok(LedgerOutcome::Resolved(resolved))
            }
            LedgerOp::ResolveCollection {
                ids,
                user_id,
                resolved_by,
            } => {
                let ids = Self::check_ownership(tx, &ids, user_id)?;
                if ids.is_empty() {
                    return Ok(LedgerOutcome::Resolved(vec![]));
                }
                let sql = format!(
                    "UPDATE todo SET state = 'done', resolved_by_action = ?, updated_at = ?
                     WHERE state = 'pending' AND {} RETURNING id, user_id",
                    IDS_CLAUSE
                );
                let values = vec![
                    Value::Text(resolved_by.as_str().to_string()),
                    Value::Integer(now),
                    ids_value(&ids)?,
                ];
                Ok(LedgerOutcome::Resolved(Self::returning_ids(
                    tx, &sql, values, touched,
                )?))
            }
            LedgerOp::RestoreCollection { ids, user_id } => {
                let ids = Self::check_ownership(tx, &ids, user_id)?;
                if ids.is_empty() {
                    return Ok(LedgerOutcome::Restored(vec![]));
                }
                let sql = format!(
                    "UPDATE todo SET state = 'pending', resolved_by_action = NULL, updated_at = ?
                     WHERE state = 'done' AND {} RETURNING id, user_id",
                    IDS_CLAUSE
                );
                let values = vec![Value::Integer(now), ids_value(&ids)?];
                Ok(LedgerOutcome::Restored(Self::returning_ids(
                    tx, &sql, values, touched,
                )?))
            }
            LedgerOp::ResolveAllForUser {
                user_id,
                resolved_by,
            } => {
                let values = vec![
                    Value::Text(resolved_by.as_str().to_string()),
                    Value::Integer(now),
                    Value::Integer(user_id as i64),
                ];
                Ok(LedgerOutcome::Resolved(Self::returning_ids(
                    tx,
                    "UPDATE todo SET state = 'done', resolved_by_action = ?, updated_at = ?
                     WHERE state = 'pending' AND user_id = ? RETURNING id, user_id",
                    values,
                    touched,
                )?))
            }
            LedgerOp::PurgeTarget(target) => {
                let mut stmt = tx.prepare(&format!(
                    "SELECT user_id, MAX(state = 'pending') FROM todo WHERE {}
                     GROUP BY user_id ORDER BY user_id",
                    TARGET_CLAUSE
                ))?;
                let owners = stmt
                    .query_map(params_from_iter(target_values(&target)), |row| {
                        Ok((row.get::<_, i64>(0)? as UserId, row.get::<_, bool>(1)?))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                let deleted = tx.execute(
                    &format!("DELETE FROM todo WHERE {}", TARGET_CLAUSE),
                    params_from_iter(target_values(&target)),
                )?;
                info!("Deleted {} to-do(s) of {}", deleted, target);

                // Done counters change too, only pending holders are reported.
                touched.extend(owners.iter().map(|(user_id, _)| *user_id));
                let users = owners
                    .into_iter()
                    .filter(|(_, had_pending)| *had_pending)
                    .map(|(user_id, _)| user_id)
                    .collect();
                Ok(LedgerOutcome::Purged(users))
            }
        }
    }

    /// Inserts the to-do unless a conflicting pending one exists. Returns the new id.
    fn upsert_todo(tx: &Transaction, todo: &NewTodo, now: i64) -> Result<Option<TodoId>> {
        let conflicting = todo.action.conflicting_actions();
        if !todo.action.always_inserts() && !conflicting.is_empty() {
            let sql = format!(
                "SELECT id FROM todo WHERE user_id = ? AND state = 'pending' AND {} AND action IN ({}) LIMIT 1",
                TARGET_CLAUSE,
                placeholders(conflicting.len())
            );
            let mut values = vec![Value::Integer(todo.user_id as i64)];
            values.extend(target_values(&todo.target));
            values.extend(conflicting.iter().map(|a| Value::Integer(a.as_int())));
            let existing: Option<i64> = tx
                .query_row(&sql, params_from_iter(values), |row| row.get(0))
                .optional()?;
            if let Some(existing) = existing {
                debug!(
                    "User {} already has pending to-do {} on {}, skipping {}",
                    todo.user_id,
                    existing,
                    todo.target,
                    todo.action.as_str()
                );
                return Ok(None);
            }
        }

        tx.execute(
            "INSERT INTO todo (user_id, author_id, project_id, target_type, target_id, commit_id,
                               note_id, action, state, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'pending', ?9, ?9)",
            params![
                todo.user_id as i64,
                todo.author_id as i64,
                todo.project_id as i64,
                todo.target.target_type.as_str(),
                todo.target.target_id.map(|id| id as i64),
                todo.target.commit_id,
                todo.note_id.map(|id| id as i64),
                todo.action.as_int(),
                now,
            ],
        )
        .with_context(|| format!("Failed to insert to-do for user {}", todo.user_id))?;
        let id = tx.last_insert_rowid() as TodoId;
        debug!(
            "Created {} to-do {} for user {} on {}",
            todo.action.as_str(),
            id,
            todo.user_id,
            todo.target
        );
        Ok(Some(id))
    }

    /// Fails unless every id exists and belongs to `user_id`. Returns the distinct ids.
    fn check_ownership(
        tx: &Transaction,
        ids: &[TodoId],
        user_id: UserId,
    ) -> Result<BTreeSet<TodoId>> {
        let ids: BTreeSet<TodoId> = ids.iter().copied().collect();
        if ids.is_empty() {
            return Ok(ids);
        }
        let mut stmt = tx.prepare(&format!("SELECT id, user_id FROM todo WHERE {}", IDS_CLAUSE))?;
        let owners = stmt
            .query_map(params![ids_value(&ids)?], |row| {
                Ok((row.get::<_, i64>(0)? as TodoId, row.get::<_, i64>(1)? as UserId))
            })?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;

        for id in &ids {
            match owners.get(id) {
                None => bail!(TodoError::TodoNotFound(*id)),
                Some(owner) if *owner != user_id => bail!(TodoError::NotOwned {
                    todo_id: *id,
                    user_id,
                }),
                Some(_) => {}
            }
        }
        Ok(ids)
    }

    /// Runs an `UPDATE ... RETURNING id, user_id` and returns the sorted ids.
    fn returning_ids(
        tx: &Transaction,
        sql: &str,
        values: Vec<Value>,
        touched: &mut BTreeSet<UserId>,
    ) -> Result<Vec<TodoId>> {
        let mut stmt = tx.prepare(sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                Ok((row.get::<_, i64>(0)? as TodoId, row.get::<_, i64>(1)? as UserId))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let mut ids: Vec<TodoId> = rows
            .into_iter()
            .map(|(id, user_id)| {
                touched.insert(user_id);
                id
            })
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn refresh_counters(tx: &Transaction, users: &BTreeSet<UserId>) -> Result<()> {
        if users.is_empty() {
            return Ok(());
        }
        tx.execute(
            &format!(
                "UPDATE user SET
                    todos_pending_count = (SELECT COUNT(*) FROM todo WHERE todo.user_id = user.id AND todo.state = 'pending'),
                    todos_done_count = (SELECT COUNT(*) FROM todo WHERE todo.user_id = user.id AND todo.state = 'done')
                 WHERE {}",
                IDS_CLAUSE
            ),
            params![ids_value(users)?],
        )
        .context("Failed to refresh to-do counters")?;
        Ok(())
    }
}

impl TodoStore for SqliteStore {
    fn apply(&self, ops: Vec<LedgerOp>) -> Result<Vec<LedgerOutcome>> {
        if ops.is_empty() {
            return Ok(vec![]);
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = Utc::now().timestamp();
        let mut touched = BTreeSet::new();

        let mut outcomes = Vec::with_capacity(ops.len());
        for op in ops {
            outcomes.push(Self::apply_op(&tx, op, now, &mut touched)?);
        }
        Self::refresh_counters(&tx, &touched)?;
        tx.commit().context("Failed to commit to-do changes")?;
        Ok(outcomes)
    }

    fn get_todo(&self, todo_id: TodoId) -> Result<Option<Todo>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {} FROM todo WHERE id = ?1", TODO_COLUMNS),
            params![todo_id as i64],
            row_to_todo,
        )
        .optional()
        .with_context(|| format!("Failed to load to-do {}", todo_id))
    }

    fn get_user_todos(&self, user_id: UserId, filter: &TodoFilter) -> Result<Vec<Todo>> {
        let mut sql = format!("SELECT {} FROM todo WHERE user_id = ?", TODO_COLUMNS);
        let mut values = vec![Value::Integer(user_id as i64)];
        if let Some(state) = filter.state {
            sql.push_str(" AND state = ?");
            values.push(Value::Text(state.as_str().to_string()));
        }
        if let Some(action) = filter.action {
            sql.push_str(" AND action = ?");
            values.push(Value::Integer(action.as_int()));
        }
        if let Some(project_id) = filter.project_id {
            sql.push_str(" AND project_id = ?");
            values.push(Value::Integer(project_id as i64));
        }
        if let Some(target_type) = filter.target_type {
            sql.push_str(" AND target_type = ?");
            values.push(Value::Text(target_type.as_str().to_string()));
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC");

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let todos = stmt
            .query_map(params_from_iter(values), row_to_todo)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("Failed to load to-dos of user {}", user_id))?;
        Ok(todos)
    }

    fn get_target_todos(&self, target: &TargetRef) -> Result<Vec<Todo>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM todo WHERE {} ORDER BY id",
            TODO_COLUMNS, TARGET_CLAUSE
        ))?;
        let todos = stmt
            .query_map(params_from_iter(target_values(target)), row_to_todo)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("Failed to load to-dos of {}", target))?;
        Ok(todos)
    }

    fn pending_todo_exists(&self, user_id: UserId, target: &TargetRef) -> Result<bool> {
        let conn = self.lock()?;
        let mut values = vec![Value::Integer(user_id as i64)];
        values.extend(target_values(target));
        let exists: bool = conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM todo WHERE user_id = ? AND state = 'pending' AND {})",
                TARGET_CLAUSE
            ),
            params_from_iter(values),
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn get_cached_counts(&self, user_id: UserId) -> Result<TodoCounts> {
        let conn = self.lock()?;
        let counts = conn
            .query_row(
                "SELECT todos_pending_count, todos_done_count FROM user WHERE id = ?1",
                params![user_id as i64],
                |row| {
                    Ok(TodoCounts {
                        pending: row.get::<_, i64>(0)? as usize,
                        done: row.get::<_, i64>(1)? as usize,
                    })
                },
            )
            .optional()?;
        counts.with_context(|| format!("User {} not found", user_id))
    }

    fn count_todos(&self, user_id: UserId) -> Result<TodoCounts> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT state, COUNT(*) FROM todo WHERE user_id = ?1 GROUP BY state")?;
        let mut counts = TodoCounts::default();
        let rows = stmt.query_map(params![user_id as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
        })?;
        for row in rows {
            let (state, count) = row?;
            match TodoState::parse(&state)? {
                TodoState::Pending => counts.pending = count,
                TodoState::Done => counts.done = count,
            }
        }
        Ok(counts)
    }
}
