//! Read-through, write-through cached resources.
//!
//! A [`CachedResource`] owns one in-memory value mirrored to one cache key and
//! loaded from one endpoint. Reads go memory, then cache, then network;
//! mutations go to the network, drop the cache entry and re-fetch the whole
//! value. Every service in this crate is a thin layer over one or more of
//! these.
//!
//! [`KeyedResource`] is the same pattern for families of values stored under
//! a common key prefix (order pages, order details, previews).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::instrument;

use crate::api::{Api, ApiError, ApiRequest};
use crate::cache::keys::CachePolicy;
use crate::cache::{VersionedCache, duration_millis};
use crate::error::{AppError, Result};
use crate::events::{DomainEvent, EventBus};
use crate::models::ResourceValue;
use crate::session::AuthState;

/// Handles every resource shares.
#[derive(Clone)]
pub struct ResourceContext {
    pub api: Api,
    pub cache: VersionedCache,
    pub auth: AuthState,
    pub events: EventBus,
}

/// Static description of a resource.
#[derive(Debug, Clone)]
pub struct ResourceSpec {
    /// Name used in logs.
    pub name: &'static str,
    pub cache_key: &'static str,
    /// Endpoint answering `GET` with the whole value.
    pub path: &'static str,
    pub policy: CachePolicy,
    /// Signed-out reads return the default value without a request.
    pub requires_auth: bool,
    /// Published after every successful mutation.
    pub event: Option<DomainEvent>,
}

// =============================================================================
// CachedResource
// =============================================================================

/// A single cached value. Cheap to clone; clones share state.
pub struct CachedResource<T> {
    inner: Arc<ResourceInner<T>>,
}

impl<T> Clone for CachedResource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ResourceInner<T> {
    spec: ResourceSpec,
    ctx: ResourceContext,
    state: watch::Sender<T>,
    loaded: AtomicBool,
    /// Epoch ms of the last load from the network or the cache, 0 if never.
    last_fetch: AtomicI64,
    last_error: Mutex<Option<String>>,
}

impl<T: ResourceValue> CachedResource<T> {
    #[must_use]
    pub fn new(spec: ResourceSpec, ctx: ResourceContext) -> Self {
        let (state, _) = watch::channel(T::default());
        Self {
            inner: Arc::new(ResourceInner {
                spec,
                ctx,
                state,
                loaded: AtomicBool::new(false),
                last_fetch: AtomicI64::new(0),
                last_error: Mutex::new(None),
            }),
        }
    }

    /// Load the value.
    ///
    /// Without `force`, a fresh in-memory copy or a valid cache entry is
    /// served. Otherwise the endpoint is called and the result written
    /// through. Subscribers are notified whenever the value is (re)loaded.
    ///
    /// # Errors
    ///
    /// Returns the remote error; nothing is retried.
    #[instrument(skip(self), fields(resource = self.inner.spec.name))]
    pub async fn fetch(&self, force: bool) -> Result<T> {
        let spec = &self.inner.spec;
        if spec.requires_auth && !self.inner.ctx.auth.is_authenticated() {
            return Ok(T::default());
        }

        if !force {
            if self.is_loaded() && !self.should_refresh(false) {
                return Ok(self.current());
            }
            if let Some(mut value) = self.inner.ctx.cache.get::<T>(spec.cache_key) {
                tracing::debug!("Cache hit");
                value.normalize();
                self.mark_loaded();
                self.publish(value.clone());
                return Ok(value);
            }
        }

        self.fetch_remote().await
    }

    async fn fetch_remote(&self) -> Result<T> {
        let spec = &self.inner.spec;
        let mut value: T = self
            .inner
            .ctx
            .api
            .call(ApiRequest::get(spec.path))
            .await
            .map_err(|e| self.record_error(e))?;
        value.normalize();

        self.inner
            .ctx
            .cache
            .set(spec.cache_key, &value, Some(spec.policy.ttl));
        self.mark_loaded();
        self.clear_error();
        self.publish(value.clone());
        Ok(value)
    }

    /// Send a mutation whose reply carries no data, then re-fetch.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unauthenticated`] when signed out, the remote
    /// error of the mutation, or the error of the follow-up fetch.
    #[instrument(skip(self, request), fields(resource = self.inner.spec.name, path = %request.path))]
    pub async fn mutate(&self, request: ApiRequest) -> Result<()> {
        self.inner.ctx.auth.require()?;
        self.inner
            .ctx
            .api
            .execute(request)
            .await
            .map_err(|e| self.record_error(e))?;
        self.after_mutation().await
    }

    /// Send a mutation and decode its reply, then re-fetch.
    ///
    /// # Errors
    ///
    /// See [`CachedResource::mutate`].
    #[instrument(skip(self, request), fields(resource = self.inner.spec.name, path = %request.path))]
    pub async fn mutate_with<R: DeserializeOwned>(&self, request: ApiRequest) -> Result<R> {
        self.inner.ctx.auth.require()?;
        let reply = self
            .inner
            .ctx
            .api
            .call(request)
            .await
            .map_err(|e| self.record_error(e))?;
        self.after_mutation().await?;
        Ok(reply)
    }

    async fn after_mutation(&self) -> Result<()> {
        self.inner.ctx.cache.remove(self.inner.spec.cache_key);
        let refreshed = self.fetch(true).await;
        if let Some(event) = &self.inner.spec.event {
            self.inner.ctx.events.publish(event.clone());
        }
        refreshed.map(drop)
    }

    /// Whether the in-memory copy is due for a reload, counting loads from
    /// either the network or the cache.
    #[must_use]
    pub fn should_refresh(&self, force: bool) -> bool {
        if force {
            return true;
        }
        let last = self.inner.last_fetch.load(Ordering::SeqCst);
        let interval = duration_millis(self.inner.spec.policy.refresh_interval);
        last == 0 || self.inner.ctx.cache.now_millis().saturating_sub(last) > interval
    }

    /// Watch the value; the receiver sees every reload and local edit.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.inner.state.subscribe()
    }

    /// The in-memory value.
    #[must_use]
    pub fn current(&self) -> T {
        self.inner.state.borrow().clone()
    }

    /// Whether a value has been loaded since construction or reset.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.inner.loaded.load(Ordering::SeqCst)
    }

    /// Message of the last failed remote call, cleared by the next success.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.inner
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Edit the in-memory value in place and notify subscribers.
    ///
    /// The cache is not touched; call [`CachedResource::persist`] to write
    /// the edit through.
    pub fn modify(&self, edit: impl FnOnce(&mut T)) {
        self.inner.state.send_modify(|value| {
            edit(value);
            value.normalize();
        });
        self.inner.loaded.store(true, Ordering::SeqCst);
    }

    /// Write the in-memory value to the cache.
    pub fn persist(&self) {
        let value = self.current();
        self.inner
            .ctx
            .cache
            .set(self.inner.spec.cache_key, &value, Some(self.inner.spec.policy.ttl));
    }

    /// Drop the cache entry so the next read goes to the network.
    pub fn invalidate(&self) {
        self.inner.ctx.cache.remove(self.inner.spec.cache_key);
        self.inner.last_fetch.store(0, Ordering::SeqCst);
        self.inner.loaded.store(false, Ordering::SeqCst);
    }

    /// Forget everything: in-memory value, cache entry and error.
    pub fn reset(&self) {
        self.invalidate();
        self.clear_error();
        self.inner.state.send_replace(T::default());
    }

    /// Handles shared with the owning service.
    #[must_use]
    pub fn context(&self) -> &ResourceContext {
        &self.inner.ctx
    }

    fn mark_loaded(&self) {
        self.inner
            .last_fetch
            .store(self.inner.ctx.cache.now_millis(), Ordering::SeqCst);
    }

    fn publish(&self, value: T) {
        self.inner.state.send_replace(value);
        self.inner.loaded.store(true, Ordering::SeqCst);
    }

    fn record_error(&self, error: ApiError) -> AppError {
        tracing::warn!(resource = self.inner.spec.name, error = %error, "Remote call failed");
        *self
            .inner
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error.to_string());
        AppError::Api(error)
    }

    fn clear_error(&self) {
        *self
            .inner
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

// =============================================================================
// KeyedResource
// =============================================================================

/// A family of user-scoped cached values under one key prefix.
///
/// Callers compute the full cache key and the request; this type handles the
/// memory → cache → network order and freshness per key. Signed-out reads
/// return the default value without a request.
pub struct KeyedResource<T> {
    inner: Arc<KeyedInner<T>>,
}

impl<T> Clone for KeyedResource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct KeyedInner<T> {
    name: &'static str,
    prefix: &'static str,
    policy: CachePolicy,
    ctx: ResourceContext,
    /// Loaded values with the epoch ms they were fetched at.
    entries: Mutex<HashMap<String, (T, i64)>>,
}

impl<T: ResourceValue> KeyedResource<T> {
    #[must_use]
    pub fn new(
        name: &'static str,
        prefix: &'static str,
        policy: CachePolicy,
        ctx: ResourceContext,
    ) -> Self {
        Self {
            inner: Arc::new(KeyedInner {
                name,
                prefix,
                policy,
                ctx,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Load the value stored under `key`, calling `request` on a miss.
    ///
    /// # Errors
    ///
    /// Returns the remote error.
    #[instrument(skip(self, request), fields(resource = self.inner.name))]
    pub async fn fetch(&self, key: &str, request: ApiRequest, force: bool) -> Result<T> {
        debug_assert!(key.starts_with(self.inner.prefix));
        if !self.inner.ctx.auth.is_authenticated() {
            return Ok(T::default());
        }

        if !force {
            if let Some(value) = self.fresh(key) {
                return Ok(value);
            }
            if let Some(mut value) = self.inner.ctx.cache.get::<T>(key) {
                tracing::debug!("Cache hit");
                value.normalize();
                self.remember(key, value.clone());
                return Ok(value);
            }
        }

        let mut value: T = self.inner.ctx.api.call(request).await.map_err(|e| {
            tracing::warn!(resource = self.inner.name, key, error = %e, "Remote call failed");
            AppError::Api(e)
        })?;
        value.normalize();
        self.inner.ctx.cache.set(key, &value, Some(self.inner.policy.ttl));
        self.remember(key, value.clone());
        Ok(value)
    }

    /// The in-memory value under `key`, fresh or not.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<T> {
        self.entries().get(key).map(|(v, _)| v.clone())
    }

    /// Drop one key from memory and cache.
    pub fn invalidate(&self, key: &str) {
        self.entries().remove(key);
        self.inner.ctx.cache.remove(key);
    }

    /// Drop every key of this family. Returns how many cache entries went.
    pub fn invalidate_all(&self) -> usize {
        self.entries().clear();
        self.inner.ctx.cache.remove_prefix(self.inner.prefix)
    }

    fn fresh(&self, key: &str) -> Option<T> {
        let now = self.inner.ctx.cache.now_millis();
        let interval = duration_millis(self.inner.policy.refresh_interval);
        self.entries()
            .get(key)
            .filter(|(_, at)| now.saturating_sub(*at) <= interval)
            .map(|(v, _)| v.clone())
    }

    fn remember(&self, key: &str, value: T) {
        let now = self.inner.ctx.cache.now_millis();
        self.entries().insert(key.to_string(), (value, now));
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, (T, i64)>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
