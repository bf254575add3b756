mod models;
mod store;

pub use models::{AccessLevel, Project, ProjectId, ProjectMember, ProjectVisibility};
pub use store::ProjectStore;
