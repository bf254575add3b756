use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::debug;

use super::parser::scan_handles;
use super::{ReferenceResolver, References};
use crate::user::UserStore;

/// Resolves `@handle` mentions against the user directory. Unknown handles are dropped.
pub struct HandleReferenceResolver {
    user_store: Arc<dyn UserStore>,
    ignore_code_blocks: bool,
}

impl HandleReferenceResolver {
    pub fn new(user_store: Arc<dyn UserStore>, ignore_code_blocks: bool) -> Self {
        Self {
            user_store,
            ignore_code_blocks,
        }
    }
}

impl ReferenceResolver for HandleReferenceResolver {
    fn scan(&self, text: &str) -> Result<References> {
        let handles = scan_handles(text, self.ignore_code_blocks);
        if handles.is_empty() {
            return Ok(References::default());
        }

        let wanted: Vec<String> = handles.all().into_iter().collect();
        let ids = self
            .user_store
            .get_user_ids(&wanted)
            .context("Failed to resolve mentioned handles")?;

        let unknown = wanted.iter().filter(|h| !ids.contains_key(*h)).count();
        if unknown > 0 {
            debug!("Ignoring {} unknown handle(s) in text", unknown);
        }

        Ok(References {
            addressed: handles
                .addressed
                .iter()
                .filter_map(|h| ids.get(h).copied())
                .collect(),
            mentioned: handles
                .mentioned
                .iter()
                .filter_map(|h| ids.get(h).copied())
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::{User, UserId};
    use std::collections::HashMap;

    struct FixedUsers(HashMap<String, UserId>);

    impl UserStore for FixedUsers {
        fn create_user(&self, _user_handle: &str, _admin: bool) -> Result<UserId> {
            anyhow::bail!("read only")
        }

        fn get_user(&self, _user_id: UserId) -> Result<Option<User>> {
            Ok(None)
        }

        fn get_user_id(&self, user_handle: &str) -> Result<Option<UserId>> {
            Ok(self.0.get(user_handle).copied())
        }

        fn get_user_ids(&self, user_handles: &[String]) -> Result<HashMap<String, UserId>> {
            Ok(user_handles
                .iter()
                .filter_map(|h| self.0.get(h).map(|id| (h.clone(), *id)))
                .collect())
        }

        fn get_all_user_handles(&self) -> Result<Vec<String>> {
            Ok(self.0.keys().cloned().collect())
        }
    }

    fn resolver() -> HandleReferenceResolver {
        let users = FixedUsers(
            [("member", 1), ("guest", 2), ("admin", 3)]
                .into_iter()
                .map(|(h, id)| (h.to_string(), id))
                .collect(),
        );
        HandleReferenceResolver::new(Arc::new(users), true)
    }

    #[test]
    fn resolves_known_handles_only() {
        let refs = resolver()
            .scan("@member, what do you think? cc: @guest @nobody")
            .unwrap();
        assert_eq!(refs.addressed.into_iter().collect::<Vec<_>>(), vec![1]);
        assert_eq!(refs.mentioned.into_iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn text_without_mentions_resolves_to_nothing() {
        assert!(resolver().scan("no mentions here").unwrap().is_empty());
    }
}
