//! Shared fixtures for unit tests.

use std::sync::Arc;

use crate::api::Api;
use crate::api::testing::FakeTransport;
use crate::cache::{ManualClock, VersionedCache};
use crate::events::EventBus;
use crate::resource::ResourceContext;
use crate::session::AuthState;
use crate::session::tests::user;
use crate::storage::MemoryStore;

/// Everything a service needs, wired to a scripted transport.
pub struct TestContext {
    pub transport: Arc<FakeTransport>,
    pub api: Api,
    pub cache: VersionedCache,
    pub clock: Arc<ManualClock>,
    pub auth: AuthState,
    pub events: EventBus,
}

impl TestContext {
    /// Signed-out context.
    pub fn new() -> Self {
        let transport = Arc::new(FakeTransport::new());
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let cache = VersionedCache::new(
            Arc::new(MemoryStore::new()),
            clock.clone(),
            "delguur_",
            "1.0.0",
        );
        Self {
            api: Api::new(transport.clone()),
            auth: AuthState::load(cache.clone()),
            transport,
            cache,
            clock,
            events: EventBus::new(),
        }
    }

    /// Signed-in context.
    pub fn signed_in() -> Self {
        let ctx = Self::new();
        ctx.auth.store("token", &user());
        ctx
    }

    /// Handles for building resources.
    pub fn resource_context(&self) -> ResourceContext {
        ResourceContext {
            api: self.api.clone(),
            cache: self.cache.clone(),
            auth: self.auth.clone(),
            events: self.events.clone(),
        }
    }
}
