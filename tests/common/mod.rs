//! Common test infrastructure
//!
//! Every test gets its own SQLite database in a temporary directory, seeded with
//! the users and projects in `constants`. Tests should only import from this module.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::TestEngine;
//!
//! #[test]
//! fn test_new_issue() {
//!     let engine = TestEngine::spawn();
//!     let issue = engine.issue(1, "@member please look");
//!     engine.service.new_issue(&issue, engine.author).unwrap();
//!     assert_eq!(engine.pending(engine.member).len(), 1);
//! }
//! ```

mod constants;
mod fixtures;

#[allow(unused_imports)]
pub use constants::*;
pub use fixtures::TestEngine;
