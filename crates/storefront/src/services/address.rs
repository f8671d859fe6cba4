//! Shipping addresses.

use delguur_core::AddressId;
use tracing::instrument;

use crate::api::ApiRequest;
use crate::cache::keys;
use crate::error::{AppError, Result};
use crate::events::DomainEvent;
use crate::models::{Address, AddressInput};
use crate::resource::{CachedResource, ResourceContext, ResourceSpec};

/// Address book of the signed-in user.
#[derive(Clone)]
pub struct AddressService {
    addresses: CachedResource<Vec<Address>>,
}

impl AddressService {
    #[must_use]
    pub fn new(ctx: ResourceContext) -> Self {
        Self {
            addresses: CachedResource::new(
                ResourceSpec {
                    name: "addresses",
                    cache_key: keys::ADDRESSES,
                    path: "addresses",
                    policy: keys::ADDRESS_POLICY,
                    requires_auth: true,
                    event: Some(DomainEvent::AddressesChanged),
                },
                ctx,
            ),
        }
    }

    /// All saved addresses; empty when signed out.
    ///
    /// # Errors
    ///
    /// Returns the remote error.
    pub async fn list(&self, force: bool) -> Result<Vec<Address>> {
        self.addresses.fetch(force).await
    }

    /// The default address, falling back to the first one.
    ///
    /// # Errors
    ///
    /// Returns the remote error.
    pub async fn default_address(&self) -> Result<Option<Address>> {
        let addresses = self.list(false).await?;
        Ok(addresses
            .iter()
            .find(|a| a.is_default)
            .or_else(|| addresses.first())
            .cloned())
    }

    /// # Errors
    ///
    /// Returns [`AppError::BadRequest`] for incomplete input, otherwise see
    /// [`CachedResource::mutate`].
    #[instrument(skip(self, input))]
    pub async fn create(&self, input: &AddressInput) -> Result<()> {
        input.validate().map_err(AppError::BadRequest)?;
        self.addresses
            .mutate(ApiRequest::post("addresses").json(input)?)
            .await
    }

    /// # Errors
    ///
    /// See [`AddressService::create`].
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: AddressId, input: &AddressInput) -> Result<()> {
        input.validate().map_err(AppError::BadRequest)?;
        self.addresses
            .mutate(ApiRequest::put(format!("addresses/{id}")).json(input)?)
            .await
    }

    /// # Errors
    ///
    /// See [`CachedResource::mutate`].
    #[instrument(skip(self))]
    pub async fn delete(&self, id: AddressId) -> Result<()> {
        self.addresses
            .mutate(ApiRequest::delete(format!("addresses/{id}")))
            .await
    }

    /// # Errors
    ///
    /// See [`CachedResource::mutate`].
    #[instrument(skip(self))]
    pub async fn set_default(&self, id: AddressId) -> Result<()> {
        self.addresses
            .mutate(ApiRequest::put(format!("addresses/{id}/default")))
            .await
    }

    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<Vec<Address>> {
        self.addresses.subscribe()
    }

    #[must_use]
    pub fn current(&self) -> Vec<Address> {
        self.addresses.current()
    }

    pub fn reset(&self) {
        self.addresses.reset();
    }
}
