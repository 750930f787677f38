//! Identity resolvers
//!
//! The service only needs a best-effort user id to [`UserInfo`] lookup.
//! A deployment plugs in its own [`IdentityResolver`]; these cover
//! standalone use and tests.

use async_trait::async_trait;
use dashmap::DashMap;
use errorlog_core::{IdentityError, IdentityResolver, UserInfo};

/// Resolves users from an in-memory table
#[derive(Debug, Default)]
pub struct StaticIdentityResolver {
    users: DashMap<String, UserInfo>,
}

impl StaticIdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user, builder style
    pub fn with_user(self, user: UserInfo) -> Self {
        self.insert(user);
        self
    }

    /// Add or replace a user
    pub fn insert(&self, user: UserInfo) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn user_by_id(&self, user_id: &str) -> Result<UserInfo, IdentityError> {
        self.users
            .get(user_id)
            .map(|u| u.value().clone())
            .ok_or_else(|| IdentityError::NotFound(user_id.to_string()))
    }
}

/// Resolver for deployments without an identity service
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIdentityResolver;

#[async_trait]
impl IdentityResolver for NoIdentityResolver {
    async fn user_by_id(&self, _user_id: &str) -> Result<UserInfo, IdentityError> {
        Err(IdentityError::Unavailable(
            "no identity service configured".to_string(),
        ))
    }
}
