//! To-do records, the ledger that stores them and the dispatcher that feeds it.

mod error;
mod events;
mod models;
mod recipients;
mod service;
mod store;
mod task_list;

pub use error::TodoError;
pub use events::TodoEvent;
pub use models::{
    NewTodo, ResolvedByAction, Todo, TodoAction, TodoCounts, TodoFilter, TodoId, TodoState,
};
pub use recipients::{Recipient, RecipientResolver, TextChange};
pub use service::{EventOutcome, TodoService};
pub use store::{LedgerOp, LedgerOutcome, TodoStore};
pub use task_list::only_task_states_changed;
