//! Promotions.

use rust_decimal::Decimal;
use serde_json::json;
use tracing::instrument;

use crate::api::ApiRequest;
use crate::cache::keys;
use crate::error::{AppError, Result};
use crate::events::DomainEvent;
use crate::models::{Promotion, PromotionCheck};
use crate::resource::{CachedResource, ResourceContext, ResourceSpec};

#[derive(Clone)]
pub struct PromotionService {
    promotions: CachedResource<Vec<Promotion>>,
}

impl PromotionService {
    #[must_use]
    pub fn new(ctx: ResourceContext) -> Self {
        Self {
            promotions: CachedResource::new(
                ResourceSpec {
                    name: "promotions",
                    cache_key: keys::PROMOTIONS,
                    path: "promotions",
                    policy: keys::PROMOTION_POLICY,
                    requires_auth: false,
                    event: Some(DomainEvent::PromotionsChanged),
                },
                ctx,
            ),
        }
    }

    /// Active promotions. Visible without signing in.
    ///
    /// # Errors
    ///
    /// Returns the remote error.
    pub async fn list(&self, force: bool) -> Result<Vec<Promotion>> {
        self.promotions.fetch(force).await
    }

    /// Check a promo code against an order amount. Never cached.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::BadRequest`] for a blank code, or the remote
    /// error.
    #[instrument(skip(self))]
    pub async fn check(&self, code: &str, amount: Decimal) -> Result<PromotionCheck> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AppError::BadRequest("Enter a promo code".to_string()));
        }
        let request = ApiRequest::post("promotions/check")
            .json(&json!({ "code": code.to_uppercase(), "amount": amount }))?;
        Ok(self.promotions.context().api.call(request).await?)
    }

    pub fn reset(&self) {
        self.promotions.reset();
    }
}
