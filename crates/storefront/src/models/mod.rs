//! Wire and cache models for the storefront backend.
//!
//! Field names follow the backend's camelCase JSON. The same structs are
//! persisted in the local cache, so a schema change here must come with a
//! bump of the cache version.

pub mod address;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod favorite;
pub mod order;
pub mod payment;
pub mod promotion;
pub mod temp_order;
pub mod user;

pub use address::{Address, AddressInput};
pub use cart::{Cart, CartItem, CartPreview};
pub use catalog::{Banner, Category, HomeData, Product, ProductPage, ProductQuery, ProductSummary};
pub use checkout::{
    CheckoutInfo, CheckoutLine, OrderPreview, PreviewParams, ShippingMethod, SubmittedOrder,
};
pub use favorite::FavoriteItem;
pub use order::{OrderDetail, OrderLine, OrderPage, OrderQuery, OrderSummary};
pub use payment::{BankLink, PaymentSession, PaymentStatusReply, QPayInvoice};
pub use promotion::{DiscountType, Promotion, PromotionCheck};
pub use temp_order::{TempOrder, TempOrderLine, TempOrderUpdate};
pub use user::{AccountUpdate, AuthPayload, Credentials, RegisterInput, User};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A value held by a cached resource.
///
/// `normalize` runs after every decode (network or cache) so derived fields
/// are always consistent with the data they summarize.
pub trait ResourceValue:
    Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Recompute derived fields.
    fn normalize(&mut self) {}
}

impl<T> ResourceValue for Vec<T> where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> ResourceValue for Option<T> where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}
