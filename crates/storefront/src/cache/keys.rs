//! Cache keys and per-domain freshness policies.
//!
//! `ttl` bounds how long a persisted entry may be served; `refresh_interval`
//! bounds how long an in-memory copy is trusted before the service goes back
//! to the cache or network. Volatile data (cart, orders) gets minutes,
//! reference data (categories) gets a day.

use std::time::Duration;

use sha2::{Digest, Sha256};

const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Freshness policy for one cached domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// How long a persisted entry stays valid.
    pub ttl: Duration,
    /// How long an in-memory copy is served without re-reading.
    pub refresh_interval: Duration,
}

impl CachePolicy {
    const fn new(ttl: Duration, refresh_interval: Duration) -> Self {
        Self {
            ttl,
            refresh_interval,
        }
    }
}

pub const TOKEN: &str = "token";
pub const USER_INFO: &str = "user_info";
pub const CART_DATA: &str = "cart_data";
pub const ADDRESSES: &str = "addresses";
pub const CATEGORIES: &str = "categories";
pub const HOME_DATA: &str = "home_data";
pub const ORDER_LIST_PREFIX: &str = "order_list_";
pub const ORDER_DETAIL_PREFIX: &str = "order_detail_";
pub const FAVORITE_IDS: &str = "favorite_ids";
pub const FAVORITE_LIST: &str = "favorite_list";
pub const CHECKOUT_INFO: &str = "checkout_info";
pub const ORDER_PREVIEW_PREFIX: &str = "order_preview_";
pub const TEMP_ORDER: &str = "temp_order";
pub const PROMOTIONS: &str = "promotions";
pub const PAYMENT_SESSION: &str = "qpay_payment";

pub const SESSION_POLICY: CachePolicy = CachePolicy::new(Duration::from_secs(7 * 24 * 60 * 60), DAY);
pub const CART_POLICY: CachePolicy = CachePolicy::new(Duration::from_secs(30 * 60), Duration::from_secs(5 * 60));
pub const ADDRESS_POLICY: CachePolicy = CachePolicy::new(DAY, Duration::from_secs(30 * 60));
pub const CATEGORY_POLICY: CachePolicy = CachePolicy::new(DAY, DAY);
pub const HOME_POLICY: CachePolicy = CachePolicy::new(HOUR, Duration::from_secs(30 * 60));
pub const ORDER_POLICY: CachePolicy = CachePolicy::new(Duration::from_secs(10 * 60), Duration::from_secs(5 * 60));
pub const FAVORITE_POLICY: CachePolicy = CachePolicy::new(HOUR, Duration::from_secs(10 * 60));
pub const CHECKOUT_POLICY: CachePolicy = CachePolicy::new(Duration::from_secs(10 * 60), Duration::from_secs(5 * 60));
pub const PREVIEW_POLICY: CachePolicy = CachePolicy::new(Duration::from_secs(5 * 60), Duration::from_secs(5 * 60));
pub const TEMP_ORDER_POLICY: CachePolicy = CachePolicy::new(Duration::from_secs(30 * 60), Duration::from_secs(5 * 60));
pub const PROMOTION_POLICY: CachePolicy = CachePolicy::new(HOUR, Duration::from_secs(30 * 60));

/// Snapshot lifetime of a payment session kept for resume.
pub const PAYMENT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// In-process product cache lifetime.
pub const PRODUCT_TTL: Duration = Duration::from_secs(5 * 60);

/// Keys holding data of the signed-in user; dropped on logout.
pub const USER_SCOPED: &[&str] = &[
    TOKEN,
    USER_INFO,
    CART_DATA,
    ADDRESSES,
    FAVORITE_IDS,
    FAVORITE_LIST,
    CHECKOUT_INFO,
    TEMP_ORDER,
    PAYMENT_SESSION,
];

/// Prefixes of keyed user data; dropped on logout.
pub const USER_SCOPED_PREFIXES: &[&str] =
    &[ORDER_LIST_PREFIX, ORDER_DETAIL_PREFIX, ORDER_PREVIEW_PREFIX];

/// Key for a page of the order list.
#[must_use]
pub fn order_list(status: Option<&str>, page: u32, page_size: u32) -> String {
    format!(
        "{ORDER_LIST_PREFIX}{}_{page}_{page_size}",
        status.unwrap_or("all")
    )
}

/// Key for one order's detail.
#[must_use]
pub fn order_detail(order_id: impl std::fmt::Display) -> String {
    format!("{ORDER_DETAIL_PREFIX}{order_id}")
}

/// Key for an order preview, derived from its serialized parameters.
#[must_use]
pub fn order_preview(params_json: &str) -> String {
    let digest = Sha256::digest(params_json.as_bytes());
    let hex: String = digest
        .iter()
        .take(8)
        .map(|b| format!("{b:02x}"))
        .collect();
    format!("{ORDER_PREVIEW_PREFIX}{hex}")
}
