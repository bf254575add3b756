//! Seed data shared by the integration tests.

#![allow(dead_code)]

pub const AUTHOR_HANDLE: &str = "author";
pub const ASSIGNEE_HANDLE: &str = "assignee";
pub const MEMBER_HANDLE: &str = "member";
pub const GUEST_HANDLE: &str = "guest";
pub const NON_MEMBER_HANDLE: &str = "non_member";
pub const ADMIN_HANDLE: &str = "admin";
pub const JOHN_DOE_HANDLE: &str = "john_doe";

pub const PRIVATE_PROJECT_NAME: &str = "gitlab-org/gitlab";
pub const PUBLIC_PROJECT_NAME: &str = "gitlab-org/gitlab-foss";

pub const COMMIT_SHA: &str = "570e7b2abdd848b95f2f578043fc23bd6f6fd24d";
