use anyhow::{anyhow, Context, Result};
use rusqlite::{params, OptionalExtension};

use super::SqliteStore;
use crate::project::{AccessLevel, Project, ProjectId, ProjectMember, ProjectStore, ProjectVisibility};
use crate::user::UserId;

fn parse_access_level(value: i32) -> rusqlite::Result<AccessLevel> {
    AccessLevel::from_int(value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Integer,
            anyhow!("Unknown access level {}", value).into(),
        )
    })
}

impl ProjectStore for SqliteStore {
    fn create_project(
        &self,
        name: &str,
        visibility: ProjectVisibility,
        repository_private: bool,
    ) -> Result<ProjectId> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO project (name, visibility, repository_private) VALUES (?1, ?2, ?3)",
            params![name, visibility.as_str(), repository_private],
        )
        .with_context(|| format!("Failed to create project {}", name))?;
        Ok(conn.last_insert_rowid() as ProjectId)
    }

    fn get_project(&self, project_id: ProjectId) -> Result<Option<Project>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, name, visibility, repository_private FROM project WHERE id = ?1",
            params![project_id as i64],
            |row| {
                let visibility: String = row.get(2)?;
                Ok(Project {
                    id: row.get::<_, i64>(0)? as ProjectId,
                    name: row.get(1)?,
                    visibility: ProjectVisibility::from_str(&visibility).ok_or_else(|| {
                        rusqlite::Error::FromSqlConversionFailure(
                            2,
                            rusqlite::types::Type::Text,
                            anyhow!("Unknown project visibility '{}'", visibility).into(),
                        )
                    })?,
                    repository_private: row.get(3)?,
                })
            },
        )
        .optional()
        .with_context(|| format!("Failed to load project {}", project_id))
    }

    fn set_project_member(
        &self,
        project_id: ProjectId,
        user_id: UserId,
        access_level: AccessLevel,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO project_member (project_id, user_id, access_level) VALUES (?1, ?2, ?3)
             ON CONFLICT(project_id, user_id) DO UPDATE SET access_level = excluded.access_level",
            params![project_id as i64, user_id as i64, access_level.as_int()],
        )
        .with_context(|| {
            format!(
                "Failed to add user {} to project {}",
                user_id, project_id
            )
        })?;
        Ok(())
    }

    fn get_member_access_level(
        &self,
        project_id: ProjectId,
        user_id: UserId,
    ) -> Result<Option<AccessLevel>> {
        let conn = self.lock()?;
        let level = conn
            .query_row(
                "SELECT access_level FROM project_member WHERE project_id = ?1 AND user_id = ?2",
                params![project_id as i64, user_id as i64],
                |row| parse_access_level(row.get(0)?),
            )
            .optional()?;
        Ok(level)
    }

    fn get_project_members(&self, project_id: ProjectId) -> Result<Vec<ProjectMember>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT project_id, user_id, access_level FROM project_member
             WHERE project_id = ?1 ORDER BY user_id",
        )?;
        let members = stmt
            .query_map(params![project_id as i64], |row| {
                Ok(ProjectMember {
                    project_id: row.get::<_, i64>(0)? as ProjectId,
                    user_id: row.get::<_, i64>(1)? as UserId,
                    access_level: parse_access_level(row.get(2)?)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(members)
    }
}
