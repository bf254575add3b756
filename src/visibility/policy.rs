use crate::project::{AccessLevel, Project, ProjectVisibility};
use crate::targets::{Design, Issue, Target};
use crate::user::UserId;

/// The reading user as seen by one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: UserId,
    pub admin: bool,
    /// None when the user is not a member of the project.
    pub access_level: Option<AccessLevel>,
}

impl Viewer {
    fn has_level(&self, min: AccessLevel) -> bool {
        self.access_level.map(|level| level >= min).unwrap_or(false)
    }
}

pub fn can_read(viewer: &Viewer, project: &Project, target: &Target) -> bool {
    if !target.accepts_todos() {
        return false;
    }
    if viewer.admin {
        return true;
    }
    match target {
        Target::Issue(issue) | Target::Design(Design { issue, .. }) => {
            can_read_project(viewer, project)
                && (!target.is_confidential() || can_read_confidential(viewer, issue))
        }
        Target::MergeRequest(_) | Target::Commit(_) => can_read_code(viewer, project),
        Target::Alert(_) => viewer.has_level(AccessLevel::Reporter),
        Target::ProjectSnippet(_) => false,
    }
}

fn can_read_project(viewer: &Viewer, project: &Project) -> bool {
    match project.visibility {
        ProjectVisibility::Public | ProjectVisibility::Internal => true,
        ProjectVisibility::Private => viewer.access_level.is_some(),
    }
}

fn can_read_confidential(viewer: &Viewer, issue: &Issue) -> bool {
    viewer.has_level(AccessLevel::Reporter)
        || issue.author_id == viewer.user_id
        || issue.assignees.contains(&viewer.user_id)
}

/// Merge requests and commits follow repository access.
fn can_read_code(viewer: &Viewer, project: &Project) -> bool {
    match viewer.access_level {
        Some(level) => {
            level >= AccessLevel::Reporter || project.visibility != ProjectVisibility::Private
        }
        None => project.visibility != ProjectVisibility::Private && !project.repository_private,
    }
}
