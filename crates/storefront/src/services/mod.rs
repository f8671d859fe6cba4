//! Per-domain services over the cached resource layer.
//!
//! # Services
//!
//! - `account` - Sign-in, registration, Facebook token login, profile
//! - `address` - Shipping address book
//! - `cart` - Cart lines with optimistic quantity edits
//! - `checkout` - Checkout page data, previews and submission
//! - `favorite` - Favorite ids and list
//! - `order` - Order pages, details and lifecycle actions
//! - `promotion` - Promotions and promo code checks
//! - `temp_order` - Buy-now drafts

pub mod account;
pub mod address;
pub mod cart;
pub mod checkout;
pub mod favorite;
pub mod order;
pub mod promotion;
pub mod temp_order;

pub use account::AccountService;
pub use address::AddressService;
pub use cart::CartService;
pub use checkout::CheckoutService;
pub use favorite::FavoriteService;
pub use order::OrderService;
pub use promotion::PromotionService;
pub use temp_order::TempOrderService;
