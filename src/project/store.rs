use super::models::{AccessLevel, Project, ProjectId, ProjectMember, ProjectVisibility};
use crate::user::UserId;
use anyhow::Result;

pub trait ProjectStore: Send + Sync {
    /// Creates a project and returns its id.
    fn create_project(
        &self,
        name: &str,
        visibility: ProjectVisibility,
        repository_private: bool,
    ) -> Result<ProjectId>;

    /// Returns Ok(None) if the project does not exist.
    fn get_project(&self, project_id: ProjectId) -> Result<Option<Project>>;

    /// Adds a member, or changes the access level of an existing one.
    fn set_project_member(
        &self,
        project_id: ProjectId,
        user_id: UserId,
        access_level: AccessLevel,
    ) -> Result<()>;

    /// Returns the user's access level in the project, Ok(None) for non-members.
    fn get_member_access_level(
        &self,
        project_id: ProjectId,
        user_id: UserId,
    ) -> Result<Option<AccessLevel>>;

    fn get_project_members(&self, project_id: ProjectId) -> Result<Vec<ProjectMember>>;
}
