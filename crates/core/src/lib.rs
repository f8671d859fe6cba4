//! Delguur Core - Shared types library.
//!
//! This crate provides common types used across all Delguur components:
//! - `storefront` - Cached client library for the storefront backend
//! - `cli` - Command-line tools for sessions, carts and payments
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no caching, no HTTP clients.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money, emails, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
