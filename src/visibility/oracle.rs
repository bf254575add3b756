use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tracing::debug;

use super::policy::{can_read, Viewer};
use super::VisibilityOracle;
use crate::project::ProjectStore;
use crate::targets::Target;
use crate::user::{UserId, UserStore};

/// Answers visibility questions from project membership stored alongside the to-dos.
pub struct ProjectAccessOracle {
    user_store: Arc<dyn UserStore>,
    project_store: Arc<dyn ProjectStore>,
}

impl ProjectAccessOracle {
    pub fn new(user_store: Arc<dyn UserStore>, project_store: Arc<dyn ProjectStore>) -> Self {
        Self {
            user_store,
            project_store,
        }
    }
}

impl VisibilityOracle for ProjectAccessOracle {
    fn can_see(&self, user_id: UserId, target: &Target) -> Result<bool> {
        let Some(user) = self.user_store.get_user(user_id)? else {
            debug!("User {} does not exist, cannot see {}", user_id, target.reference());
            return Ok(false);
        };

        let project_id = target.project_id();
        let project = self
            .project_store
            .get_project(project_id)
            .with_context(|| format!("Failed to load project {}", project_id))?
            .ok_or_else(|| anyhow!("Project {} not found", project_id))?;
        let access_level = self
            .project_store
            .get_member_access_level(project_id, user_id)?;

        let viewer = Viewer {
            user_id,
            admin: user.admin,
            access_level,
        };
        let visible = can_read(&viewer, &project, target);
        debug!(
            "User {} {} see {}",
            user_id,
            if visible { "can" } else { "cannot" },
            target.reference()
        );
        Ok(visible)
    }
}
