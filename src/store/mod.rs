//! SQLite persistence for users, projects and the to-do ledger.

mod projects;
mod schema;
mod todos;
mod users;

pub use schema::TODO_VERSIONED_SCHEMAS;

use anyhow::{anyhow, bail, Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

use crate::sqlite_persistence::{read_schema_version, BASE_DB_VERSION};

/// One database holding every table. Implements `UserStore`, `ProjectStore` and
/// `TodoStore`; clones share the connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        let is_new_db = !path.exists();

        let mut conn = Connection::open(path).context("Failed to open to-do database")?;
        conn.execute("PRAGMA foreign_keys = ON;", [])?;

        let latest = TODO_VERSIONED_SCHEMAS
            .last()
            .ok_or_else(|| anyhow!("No schema versions defined"))?;

        if is_new_db {
            info!("Creating new to-do database at {:?}", path);
            latest.create(&conn)?;
        } else {
            let db_version = read_schema_version(&conn)?;

            let schema = TODO_VERSIONED_SCHEMAS
                .iter()
                .find(|s| s.version == db_version)
                .with_context(|| format!("Unknown to-do database version {}", db_version))?;
            schema.validate(&conn).with_context(|| {
                format!(
                    "To-do database schema validation failed for version {}",
                    db_version
                )
            })?;

            if db_version < latest.version {
                info!(
                    "Migrating to-do database from version {} to {}",
                    db_version, latest.version
                );
                Self::migrate_if_needed(&mut conn, db_version)?;
                latest.validate(&conn)?;
            } else if db_version > latest.version {
                bail!(
                    "To-do database version {} is newer than supported version {}",
                    db_version,
                    latest.version
                );
            }
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn migrate_if_needed(conn: &mut Connection, from_version: usize) -> Result<()> {
        let tx = conn.transaction()?;
        let mut latest_from = from_version;
        for schema in TODO_VERSIONED_SCHEMAS
            .iter()
            .filter(|s| s.version > from_version)
        {
            info!(
                "Running to-do database migration from version {} to {}",
                latest_from, schema.version
            );
            if let Some(migration_fn) = schema.migration {
                migration_fn(&tx).with_context(|| {
                    format!("Failed to run migration to version {}", schema.version)
                })?;
            }
            latest_from = schema.version;
        }
        tx.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + latest_from),
            [],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("To-do database connection mutex is poisoned"))
    }
}

/// "?, ?, ?" for an IN clause with `n` values.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
