pub mod user_models;
mod user_store;

pub use user_models::{User, UserId};
pub use user_store::UserStore;
