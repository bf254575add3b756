mod models;

pub use models::{
    Alert, Commit, Design, Issue, MergeRequest, Note, ProjectSnippet, Target, TargetRef,
    TargetState, TargetType,
};
