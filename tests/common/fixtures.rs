//! Test engine with a seeded database.

#![allow(dead_code)]

use std::sync::Arc;
use tempfile::TempDir;

use super::constants::*;
use todo_engine::project::{AccessLevel, ProjectId, ProjectStore, ProjectVisibility};
use todo_engine::targets::{Commit, Issue, MergeRequest, Note, Target, TargetState};
use todo_engine::todos::{Todo, TodoFilter, TodoService, TodoState, TodoStore};
use todo_engine::user::{UserId, UserStore};
use todo_engine::{sqlite_service, SqliteStore, TodoSettings};

pub struct TestEngine {
    pub store: Arc<SqliteStore>,
    pub service: TodoService,
    pub author: UserId,
    pub assignee: UserId,
    pub member: UserId,
    pub guest: UserId,
    pub non_member: UserId,
    pub admin: UserId,
    pub john_doe: UserId,
    /// Private project everyone but `non_member` and `admin` belongs to.
    pub project: ProjectId,
    /// Public project where only `author` is a member.
    pub public_project: ProjectId,
    _temp_dir: TempDir,
}

impl TestEngine {
    pub fn spawn() -> Self {
        Self::spawn_with(TodoSettings::default())
    }

    pub fn spawn_with(settings: TodoSettings) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(
            SqliteStore::new(temp_dir.path().join("todos.db")).expect("Failed to create store"),
        );

        let author = store.create_user(AUTHOR_HANDLE, false).unwrap();
        let assignee = store.create_user(ASSIGNEE_HANDLE, false).unwrap();
        let member = store.create_user(MEMBER_HANDLE, false).unwrap();
        let guest = store.create_user(GUEST_HANDLE, false).unwrap();
        let non_member = store.create_user(NON_MEMBER_HANDLE, false).unwrap();
        let admin = store.create_user(ADMIN_HANDLE, true).unwrap();
        let john_doe = store.create_user(JOHN_DOE_HANDLE, false).unwrap();

        let project = store
            .create_project(PRIVATE_PROJECT_NAME, ProjectVisibility::Private, false)
            .unwrap();
        for user in [author, assignee, member, john_doe] {
            store
                .set_project_member(project, user, AccessLevel::Developer)
                .unwrap();
        }
        store
            .set_project_member(project, guest, AccessLevel::Guest)
            .unwrap();

        let public_project = store
            .create_project(PUBLIC_PROJECT_NAME, ProjectVisibility::Public, false)
            .unwrap();
        store
            .set_project_member(public_project, author, AccessLevel::Maintainer)
            .unwrap();

        let service = sqlite_service(store.clone(), settings);

        Self {
            store,
            service,
            author,
            assignee,
            member,
            guest,
            non_member,
            admin,
            john_doe,
            project,
            public_project,
            _temp_dir: temp_dir,
        }
    }

    pub fn issue(&self, id: usize, description: &str) -> Issue {
        Issue {
            id,
            project_id: self.project,
            author_id: self.author,
            title: format!("Issue {}", id),
            description: description.to_string(),
            state: TargetState::Opened,
            assignees: vec![],
            confidential: false,
        }
    }

    pub fn merge_request(&self, id: usize, description: &str) -> MergeRequest {
        MergeRequest {
            id,
            project_id: self.project,
            author_id: self.author,
            title: format!("Merge request {}", id),
            description: description.to_string(),
            state: TargetState::Opened,
            assignees: vec![],
            merge_participants: vec![self.author],
        }
    }

    pub fn commit(&self) -> Commit {
        Commit {
            sha: COMMIT_SHA.to_string(),
            project_id: self.project,
            author_id: Some(self.author),
            message: "Fix the pipeline".to_string(),
        }
    }

    pub fn note(&self, id: usize, body: &str, noteable: Target) -> Note {
        Note {
            id,
            author_id: self.john_doe,
            body: body.to_string(),
            system: false,
            noteable,
        }
    }

    pub fn todos(&self, user_id: UserId) -> Vec<Todo> {
        self.store
            .get_user_todos(user_id, &TodoFilter::default())
            .unwrap()
    }

    pub fn pending(&self, user_id: UserId) -> Vec<Todo> {
        self.with_state(user_id, TodoState::Pending)
    }

    pub fn done(&self, user_id: UserId) -> Vec<Todo> {
        self.with_state(user_id, TodoState::Done)
    }

    fn with_state(&self, user_id: UserId, state: TodoState) -> Vec<Todo> {
        let filter = TodoFilter {
            state: Some(state),
            ..Default::default()
        };
        self.store.get_user_todos(user_id, &filter).unwrap()
    }

    /// Cached counters must always equal what the rows say.
    pub fn assert_counters_consistent(&self) {
        for user in [
            self.author,
            self.assignee,
            self.member,
            self.guest,
            self.non_member,
            self.admin,
            self.john_doe,
        ] {
            assert_eq!(
                self.store.get_cached_counts(user).unwrap(),
                self.store.count_todos(user).unwrap(),
                "counters of user {} are stale",
                user
            );
        }
    }
}
