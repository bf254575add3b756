//! Domain objects a to-do can point at.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::project::ProjectId;
use crate::todos::TodoError;
use crate::user::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Issue,
    MergeRequest,
    Commit,
    Alert,
    Design,
    ProjectSnippet,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Issue => "issue",
            TargetType::MergeRequest => "merge_request",
            TargetType::Commit => "commit",
            TargetType::Alert => "alert",
            TargetType::Design => "design",
            TargetType::ProjectSnippet => "project_snippet",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "issue" => Some(TargetType::Issue),
            "merge_request" => Some(TargetType::MergeRequest),
            "commit" => Some(TargetType::Commit),
            "alert" => Some(TargetType::Alert),
            "design" => Some(TargetType::Design),
            "project_snippet" => Some(TargetType::ProjectSnippet),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
    #[default]
    Opened,
    Closed,
    Merged,
}

/// Identity of a target as stored on a to-do record.
///
/// Commits have no row identity: they are referenced by sha through `commit_id`
/// and leave `target_id` empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetRef {
    pub target_type: TargetType,
    pub target_id: Option<usize>,
    pub commit_id: Option<String>,
}

impl TargetRef {
    pub fn row(target_type: TargetType, target_id: usize) -> Self {
        Self {
            target_type,
            target_id: Some(target_id),
            commit_id: None,
        }
    }

    pub fn commit(sha: impl Into<String>) -> Self {
        Self {
            target_type: TargetType::Commit,
            target_id: None,
            commit_id: Some(sha.into()),
        }
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.target_id, &self.commit_id) {
            (Some(id), _) => write!(f, "{}#{}", self.target_type.as_str(), id),
            (None, Some(sha)) => write!(f, "{}@{}", self.target_type.as_str(), sha),
            (None, None) => write!(f, "{}#?", self.target_type.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: usize,
    pub project_id: ProjectId,
    pub author_id: UserId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub state: TargetState,
    #[serde(default)]
    pub assignees: Vec<UserId>,
    #[serde(default)]
    pub confidential: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequest {
    pub id: usize,
    pub project_id: ProjectId,
    pub author_id: UserId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub state: TargetState,
    #[serde(default)]
    pub assignees: Vec<UserId>,
    /// Users involved in getting the merge request merged, supplied by the host.
    #[serde(default)]
    pub merge_participants: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub project_id: ProjectId,
    #[serde(default)]
    pub author_id: Option<UserId>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: usize,
    pub project_id: ProjectId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub state: TargetState,
    #[serde(default)]
    pub assignees: Vec<UserId>,
}

/// A design attached to an issue. Visibility follows the issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Design {
    pub id: usize,
    pub filename: String,
    pub issue: Issue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSnippet {
    pub id: usize,
    pub project_id: ProjectId,
    pub author_id: UserId,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Target {
    Issue(Issue),
    MergeRequest(MergeRequest),
    Commit(Commit),
    Alert(Alert),
    Design(Design),
    ProjectSnippet(ProjectSnippet),
}

impl Target {
    pub fn target_type(&self) -> TargetType {
        match self {
            Target::Issue(_) => TargetType::Issue,
            Target::MergeRequest(_) => TargetType::MergeRequest,
            Target::Commit(_) => TargetType::Commit,
            Target::Alert(_) => TargetType::Alert,
            Target::Design(_) => TargetType::Design,
            Target::ProjectSnippet(_) => TargetType::ProjectSnippet,
        }
    }

    pub fn reference(&self) -> TargetRef {
        match self {
            Target::Issue(issue) => TargetRef::row(TargetType::Issue, issue.id),
            Target::MergeRequest(mr) => TargetRef::row(TargetType::MergeRequest, mr.id),
            Target::Commit(commit) => TargetRef::commit(commit.sha.clone()),
            Target::Alert(alert) => TargetRef::row(TargetType::Alert, alert.id),
            Target::Design(design) => TargetRef::row(TargetType::Design, design.id),
            Target::ProjectSnippet(snippet) => {
                TargetRef::row(TargetType::ProjectSnippet, snippet.id)
            }
        }
    }

    pub fn project_id(&self) -> ProjectId {
        match self {
            Target::Issue(issue) => issue.project_id,
            Target::MergeRequest(mr) => mr.project_id,
            Target::Commit(commit) => commit.project_id,
            Target::Alert(alert) => alert.project_id,
            Target::Design(design) => design.issue.project_id,
            Target::ProjectSnippet(snippet) => snippet.project_id,
        }
    }

    /// The body scanned for mentions when the target itself is created or edited.
    pub fn text(&self) -> &str {
        match self {
            Target::Issue(issue) => &issue.description,
            Target::MergeRequest(mr) => &mr.description,
            Target::Commit(commit) => &commit.message,
            Target::Alert(alert) => &alert.description,
            Target::Design(_) => "",
            Target::ProjectSnippet(snippet) => &snippet.content,
        }
    }

    pub fn assignees(&self) -> &[UserId] {
        match self {
            Target::Issue(issue) => &issue.assignees,
            Target::MergeRequest(mr) => &mr.assignees,
            Target::Alert(alert) => &alert.assignees,
            Target::Commit(_) | Target::Design(_) | Target::ProjectSnippet(_) => &[],
        }
    }

    /// Designs take the confidentiality of their issue.
    pub fn is_confidential(&self) -> bool {
        match self {
            Target::Issue(issue) => issue.confidential,
            Target::Design(design) => design.issue.confidential,
            _ => false,
        }
    }

    pub fn merge_participants(&self) -> &[UserId] {
        match self {
            Target::MergeRequest(mr) => &mr.merge_participants,
            _ => &[],
        }
    }

    /// Snippets never produce to-dos.
    pub fn accepts_todos(&self) -> bool {
        !matches!(self, Target::ProjectSnippet(_))
    }

    /// Rejects targets missing the reference a to-do record needs.
    pub fn validate(&self) -> Result<(), TodoError> {
        let reference = self.reference();
        if let Target::Commit(commit) = self {
            let sha = commit.sha.as_str();
            if sha.len() < 7 || sha.len() > 64 || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(TodoError::InvalidTarget(format!(
                    "commit sha '{}' is not a valid object id",
                    sha
                )));
            }
        } else if reference.target_id == Some(0) {
            return Err(TodoError::InvalidTarget(format!(
                "{} has no row identity",
                reference
            )));
        }
        if self.project_id() == 0 {
            return Err(TodoError::InvalidTarget(format!(
                "{} has no owning project",
                reference
            )));
        }
        Ok(())
    }
}

/// A comment left on a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: usize,
    pub author_id: UserId,
    pub body: String,
    #[serde(default)]
    pub system: bool,
    pub noteable: Target,
}

impl Note {
    /// System notes and notes on snippets are ignored by the to-do engine.
    pub fn can_create_todo(&self) -> bool {
        !self.system && self.noteable.accepts_todos()
    }
}
