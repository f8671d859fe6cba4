//! Delguur storefront client library.
//!
//! A cached, event-driven client for the Delguur storefront backend: catalog
//! browsing, cart, addresses, favorites, checkout, orders and QPay payments.
//!
//! Every user-facing resource is read through a versioned key-value cache
//! with per-resource TTLs, refreshed in the background of writes, and
//! broadcast to subscribers through `tokio::sync::watch` channels. Cross-domain
//! changes are announced on a shared [`events::EventBus`].
//!
//! Start from [`Storefront`]:
//!
//! ```rust,ignore
//! let storefront = Storefront::new(StorefrontConfig::from_env()?)?;
//! storefront.account().login("bat@example.mn", "hunter22").await?;
//! let cart = storefront.cart().fetch(false).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod optimistic;
pub mod payment;
pub mod resource;
pub mod services;
pub mod session;
pub mod state;
pub mod storage;

#[cfg(test)]
mod testing;

pub use config::StorefrontConfig;
pub use error::{AppError, Notice, Result};
pub use events::DomainEvent;
pub use state::{Storefront, StorefrontBuilder};
