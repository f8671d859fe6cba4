//! Local sign-in state.
//!
//! The backend authenticates with a cookie held by the HTTP client. The token
//! returned at login is kept in the cache only to decide which calls are worth
//! attempting: reads without it return empty values, mutations fail early.

use std::sync::{Arc, PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::cache::VersionedCache;
use crate::cache::keys;
use crate::error::{AppError, Result};
use crate::models::User;

#[derive(Serialize, Deserialize)]
struct StoredToken(String);

/// Shared sign-in state. Cheap to clone.
#[derive(Clone)]
pub struct AuthState {
    cache: VersionedCache,
    token: Arc<RwLock<Option<SecretString>>>,
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

impl AuthState {
    /// Load the persisted token, if any.
    #[must_use]
    pub fn load(cache: VersionedCache) -> Self {
        let token = cache
            .get::<StoredToken>(keys::TOKEN)
            .map(|t| SecretString::from(t.0));
        Self {
            cache,
            token: Arc::new(RwLock::new(token)),
        }
    }

    /// Whether a session token is present and unexpired.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        let present = self
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        if present && !self.cache.contains(keys::TOKEN) {
            // Persisted copy expired underneath us.
            self.forget();
            return false;
        }
        present
    }

    /// Fail with [`AppError::Unauthenticated`] unless signed in.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unauthenticated`] when no session is present.
    pub fn require(&self) -> Result<()> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(AppError::Unauthenticated)
        }
    }

    /// The token, for callers that must forward it explicitly.
    #[must_use]
    pub fn token(&self) -> Option<SecretString> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Record a successful sign-in.
    pub fn store(&self, token: &str, user: &User) {
        let policy = keys::SESSION_POLICY;
        self.cache
            .set(keys::TOKEN, &StoredToken(token.to_string()), Some(policy.ttl));
        self.cache.set(keys::USER_INFO, user, Some(policy.ttl));
        *self.token.write().unwrap_or_else(PoisonError::into_inner) =
            Some(SecretString::from(token.to_string()));
    }

    /// Replace the cached profile.
    pub fn store_user(&self, user: &User) {
        self.cache
            .set(keys::USER_INFO, user, Some(keys::SESSION_POLICY.ttl));
    }

    /// Cached profile of the signed-in user.
    #[must_use]
    pub fn user(&self) -> Option<User> {
        if !self.is_authenticated() {
            return None;
        }
        self.cache.get(keys::USER_INFO)
    }

    /// Drop the token and every user-scoped cache entry.
    pub fn clear(&self) {
        self.forget();
        for key in keys::USER_SCOPED {
            self.cache.remove(key);
        }
        for prefix in keys::USER_SCOPED_PREFIXES {
            self.cache.remove_prefix(prefix);
        }
    }

    fn forget(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Compare a token with the stored one without exposing either.
    #[must_use]
    pub fn is_token(&self, candidate: &str) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| t.expose_secret() == candidate)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use delguur_core::UserId;

    use super::*;
    use crate::cache::ManualClock;
    use crate::storage::MemoryStore;

    pub(crate) fn user() -> User {
        User {
            id: UserId::new(7),
            email: None,
            name: "Bat".to_string(),
            phone: None,
            avatar: None,
        }
    }

    fn cache(clock: Arc<ManualClock>) -> VersionedCache {
        VersionedCache::new(Arc::new(MemoryStore::new()), clock, "delguur_", "1.0.0")
    }

    #[test]
    fn test_store_and_clear() {
        let cache = cache(Arc::new(ManualClock::new(0)));
        let auth = AuthState::load(cache.clone());
        assert!(!auth.is_authenticated());
        assert!(auth.require().is_err());

        auth.store("tok", &user());
        cache.set(keys::CART_DATA, &1, None);
        cache.set(&keys::order_detail(3), &1, None);
        cache.set(keys::CATEGORIES, &1, None);
        assert!(auth.is_authenticated());
        assert!(auth.is_token("tok"));
        assert_eq!(auth.user().unwrap().id, UserId::new(7));

        auth.clear();
        assert!(!auth.is_authenticated());
        assert!(!cache.contains(keys::CART_DATA));
        assert!(!cache.contains(&keys::order_detail(3)));
        assert!(cache.contains(keys::CATEGORIES));
    }

    #[test]
    fn test_token_survives_reload() {
        let cache = cache(Arc::new(ManualClock::new(0)));
        AuthState::load(cache.clone()).store("tok", &user());
        assert!(AuthState::load(cache).is_authenticated());
    }

    #[test]
    fn test_expired_token_signs_out() {
        let clock = Arc::new(ManualClock::new(0));
        let auth = AuthState::load(cache(clock.clone()));
        auth.store("tok", &user());
        clock.advance(keys::SESSION_POLICY.ttl + Duration::from_secs(1));
        assert!(!auth.is_authenticated());
        assert!(auth.user().is_none());
    }
}
