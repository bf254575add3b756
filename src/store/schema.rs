//! SQLite schema definitions for the to-do database.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

const USER_FOREIGN_KEY: ForeignKey = ForeignKey {
    foreign_table: "user",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const PROJECT_FOREIGN_KEY: ForeignKey = ForeignKey {
    foreign_table: "project",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

// =============================================================================
// Version 0 - Users, projects, memberships and to-dos
// =============================================================================

const USER_TABLE_V0: Table = Table {
    name: "user",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("handle", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!(
            "admin",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};

const PROJECT_TABLE_V0: Table = Table {
    name: "project",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("visibility", &SqlType::Text, non_null = true),
        sqlite_column!(
            "repository_private",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};

const PROJECT_MEMBER_TABLE_V0: Table = Table {
    name: "project_member",
    columns: &[
        sqlite_column!(
            "project_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&PROJECT_FOREIGN_KEY)
        ),
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FOREIGN_KEY)
        ),
        sqlite_column!("access_level", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_project_member_user", "user_id")],
    unique_constraints: &[&["project_id", "user_id"]],
};

/// A commit target has no target_id and carries its sha in commit_id.
const TODO_TABLE_V0: Table = Table {
    name: "todo",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FOREIGN_KEY)
        ),
        sqlite_column!(
            "author_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FOREIGN_KEY)
        ),
        sqlite_column!(
            "project_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&PROJECT_FOREIGN_KEY)
        ),
        sqlite_column!("target_type", &SqlType::Text, non_null = true),
        sqlite_column!("target_id", &SqlType::Integer),
        sqlite_column!("commit_id", &SqlType::Text),
        sqlite_column!("note_id", &SqlType::Integer),
        sqlite_column!("action", &SqlType::Integer, non_null = true),
        sqlite_column!("state", &SqlType::Text, non_null = true),
        sqlite_column!("resolved_by_action", &SqlType::Text),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "updated_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[
        ("idx_todo_user_state", "user_id, state"),
        ("idx_todo_target", "target_type, target_id, commit_id"),
    ],
    unique_constraints: &[],
};

// =============================================================================
// Version 1 - Cached to-do counters on users
// =============================================================================

const USER_TABLE_V1: Table = Table {
    name: "user",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("handle", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!(
            "admin",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "todos_pending_count",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "todos_done_count",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};

/// Migration from version 0 to version 1: add the counter columns and backfill them
fn migrate_v0_to_v1(conn: &rusqlite::Connection) -> anyhow::Result<()> {
    conn.execute(
        "ALTER TABLE user ADD COLUMN todos_pending_count INTEGER NOT NULL DEFAULT 0",
        [],
    )?;
    conn.execute(
        "ALTER TABLE user ADD COLUMN todos_done_count INTEGER NOT NULL DEFAULT 0",
        [],
    )?;
    conn.execute(
        "UPDATE user SET
            todos_pending_count = (SELECT COUNT(*) FROM todo WHERE todo.user_id = user.id AND todo.state = 'pending'),
            todos_done_count = (SELECT COUNT(*) FROM todo WHERE todo.user_id = user.id AND todo.state = 'done')",
        [],
    )?;
    Ok(())
}

pub const TODO_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 0,
        tables: &[
            USER_TABLE_V0,
            PROJECT_TABLE_V0,
            PROJECT_MEMBER_TABLE_V0,
            TODO_TABLE_V0,
        ],
        migration: None,
    },
    VersionedSchema {
        version: 1,
        tables: &[
            USER_TABLE_V1,
            PROJECT_TABLE_V0,
            PROJECT_MEMBER_TABLE_V0,
            TODO_TABLE_V0,
        ],
        migration: Some(migrate_v0_to_v1),
    },
];
