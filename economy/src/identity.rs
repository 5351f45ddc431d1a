//! Caller identity
//!
//! Credentials are resolved to opaque account ids by an external provider.
//! `StaticTokenIdentity` serves a fixed token table for development and tests.

use crate::error::{EconomyError, Result};
use points_core::AccountId;
use std::collections::HashMap;

pub trait IdentityProvider: Send + Sync {
    fn resolve_caller(&self, credential: &str) -> Result<AccountId>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticTokenIdentity {
    tokens: HashMap<String, AccountId>,
}

impl StaticTokenIdentity {
    pub fn new(tokens: HashMap<String, AccountId>) -> Self {
        Self { tokens }
    }

    pub fn with_token(mut self, token: impl Into<String>, account: impl Into<AccountId>) -> Self {
        self.tokens.insert(token.into(), account.into());
        self
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl IdentityProvider for StaticTokenIdentity {
    fn resolve_caller(&self, credential: &str) -> Result<AccountId> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(EconomyError::Unauthenticated);
        }
        self.tokens
            .get(credential)
            .cloned()
            .ok_or(EconomyError::Unauthenticated)
    }
}
