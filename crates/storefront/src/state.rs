//! Storefront state shared by every caller.

use std::sync::Arc;

use crate::api::{Api, ApiClient, Transport};
use crate::cache::{Clock, SystemClock, VersionedCache};
use crate::catalog::CatalogService;
use crate::config::StorefrontConfig;
use crate::error::Result;
use crate::events::EventBus;
use crate::payment::PaymentPoller;
use crate::resource::ResourceContext;
use crate::services::{
    AccountService, AddressService, CartService, CheckoutService, FavoriteService, OrderService,
    PromotionService, TempOrderService,
};
use crate::session::AuthState;
use crate::storage::{FileStore, KeyValueStore, MemoryStore};

/// The storefront client.
///
/// This struct is cheaply cloneable via `Arc`. Every service shares one
/// cache, one session and one event bus, so a change made through one
/// service is visible to all others.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: StorefrontConfig,
    ctx: ResourceContext,
    account: AccountService,
    addresses: AddressService,
    cart: CartService,
    catalog: CatalogService,
    checkout: CheckoutService,
    favorites: FavoriteService,
    orders: OrderService,
    promotions: PromotionService,
    temp_orders: TempOrderService,
    payments: PaymentPoller,
}

impl Storefront {
    /// Build a storefront with the default HTTP transport and store.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or the storage file cannot be set up.
    pub fn new(config: StorefrontConfig) -> Result<Self> {
        StorefrontBuilder::new(config).build()
    }

    /// Start a builder to swap the transport, store or clock.
    #[must_use]
    pub fn builder(config: StorefrontConfig) -> StorefrontBuilder {
        StorefrontBuilder::new(config)
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn account(&self) -> &AccountService {
        &self.inner.account
    }

    #[must_use]
    pub fn addresses(&self) -> &AddressService {
        &self.inner.addresses
    }

    #[must_use]
    pub fn cart(&self) -> &CartService {
        &self.inner.cart
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutService {
        &self.inner.checkout
    }

    #[must_use]
    pub fn favorites(&self) -> &FavoriteService {
        &self.inner.favorites
    }

    #[must_use]
    pub fn orders(&self) -> &OrderService {
        &self.inner.orders
    }

    #[must_use]
    pub fn promotions(&self) -> &PromotionService {
        &self.inner.promotions
    }

    #[must_use]
    pub fn temp_orders(&self) -> &TempOrderService {
        &self.inner.temp_orders
    }

    #[must_use]
    pub fn payments(&self) -> &PaymentPoller {
        &self.inner.payments
    }

    #[must_use]
    pub fn auth(&self) -> &AuthState {
        &self.inner.ctx.auth
    }

    #[must_use]
    pub fn cache(&self) -> &VersionedCache {
        &self.inner.ctx.cache
    }

    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.ctx.events
    }

    /// Sign out and drop every piece of user state held in memory.
    pub async fn logout(&self) {
        self.inner.payments.reset();
        self.inner.cart.reset();
        self.inner.account.logout().await;
        self.inner.addresses.reset();
        self.inner.checkout.reset();
        self.inner.favorites.reset();
        self.inner.orders.reset();
        self.inner.promotions.reset();
        self.inner.temp_orders.reset();
    }
}

/// Builder for [`Storefront`].
pub struct StorefrontBuilder {
    config: StorefrontConfig,
    transport: Option<Arc<dyn Transport>>,
    store: Option<Arc<dyn KeyValueStore>>,
    clock: Option<Arc<dyn Clock>>,
}

impl StorefrontBuilder {
    #[must_use]
    pub fn new(config: StorefrontConfig) -> Self {
        Self {
            config,
            transport: None,
            store: None,
            clock: None,
        }
    }

    /// Use `transport` instead of an [`ApiClient`].
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use `store` instead of the configured one.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Wire every service.
    ///
    /// A pending payment left by an earlier run resumes polling when called
    /// inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build or the storage file
    /// cannot be opened.
    pub fn build(self) -> Result<Storefront> {
        let config = self.config;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ApiClient::new(&config)?),
        };
        let store: Arc<dyn KeyValueStore> = match (self.store, &config.storage_path) {
            (Some(store), _) => store,
            (None, Some(path)) => Arc::new(FileStore::open(path)?),
            (None, None) => Arc::new(MemoryStore::new()),
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let cache = VersionedCache::new(
            store,
            clock,
            config.cache.prefix.clone(),
            config.cache.version.clone(),
        );
        let ctx = ResourceContext {
            api: Api::new(transport),
            auth: AuthState::load(cache.clone()),
            cache,
            events: EventBus::new(),
        };

        let orders = OrderService::new(ctx.clone());
        let cart = CartService::new(ctx.clone(), config.cart_debounce);

        tracing::debug!(
            api_url = %config.api_url,
            persistent = config.storage_path.is_some(),
            "Storefront ready"
        );

        let storefront = Storefront {
            inner: Arc::new(StorefrontInner {
                account: AccountService::new(ctx.clone(), config.facebook_app_id.clone()),
                addresses: AddressService::new(ctx.clone()),
                catalog: CatalogService::new(ctx.clone()),
                checkout: CheckoutService::new(ctx.clone(), cart.clone(), orders.clone()),
                favorites: FavoriteService::new(ctx.clone()),
                promotions: PromotionService::new(ctx.clone()),
                temp_orders: TempOrderService::new(ctx.clone(), orders.clone()),
                payments: PaymentPoller::new(
                    ctx.clone(),
                    orders.clone(),
                    config.payment_poll_interval,
                ),
                cart,
                orders,
                ctx,
                config,
            }),
        };

        // Polling needs a runtime; without one the caller resumes explicitly.
        if tokio::runtime::Handle::try_current().is_ok() {
            storefront.inner.payments.resume();
        }

        Ok(storefront)
    }
}
