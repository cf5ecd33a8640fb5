//! External collaborator interfaces: coupons, shipping rates, and order
//! submission.
//!
//! The engine depends on these traits, not on the HTTP client, so tests
//! substitute local implementations. [`GatewayClient`] is the production
//! implementation speaking JSON to the commerce gateway.
//!
//! Collaborator failures are recoverable by design: a coupon failure
//! leaves the discount unapplied, a shipping-rate failure degrades to
//! [`ShippingOption::default_set`], and a submission failure leaves the
//! order-in-progress intact for a manual retry.

mod http;

pub use http::GatewayClient;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use quince_core::{OrderId, ShippingOptionId};

use crate::cart::CartItem;
use crate::session::Address;
use crate::submit::OrderPayload;

/// Errors from collaborator calls.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Rate limited by the gateway.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The coupon collaborator declined the code. Carries the user-facing
    /// message.
    #[error("{0}")]
    CouponRejected(String),

    /// The gateway returned a non-success status.
    #[error("gateway error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Truncated response body or gateway message.
        message: String,
    },
}

/// Display tag for a coupon. The discount amount is always resolved to an
/// absolute value by the collaborator; this tag only drives display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CouponKind {
    /// Percentage-off coupon (amount already resolved against the subtotal).
    Percentage,
    /// Fixed-amount coupon.
    Fixed,
}

/// A validated coupon: the resolved absolute discount plus its display tag.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CouponResolution {
    /// Absolute discount amount; authoritative, never recomputed locally.
    pub discount: Decimal,
    /// Display tag.
    pub kind: CouponKind,
}

/// Estimated delivery window for a shipping option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryWindow {
    /// Earliest delivery, in business days.
    pub min_days: u8,
    /// Latest delivery, in business days.
    pub max_days: u8,
}

impl std::fmt::Display for DeliveryWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.min_days == self.max_days {
            write!(f, "{} business day(s)", self.min_days)
        } else {
            write!(f, "{}-{} business days", self.min_days, self.max_days)
        }
    }
}

/// A shipping method quoted by the rate collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingOption {
    /// Option identity; the session stores the selected id only.
    pub id: ShippingOptionId,
    /// Display name.
    pub label: String,
    /// Price for this method.
    pub price: Decimal,
    /// Estimated delivery window.
    pub delivery_window: DeliveryWindow,
}

impl ShippingOption {
    /// The static fallback set used when the rate collaborator is
    /// unavailable, so checkout is never blocked on a rate lookup.
    #[must_use]
    pub fn default_set() -> Vec<Self> {
        vec![
            Self {
                id: ShippingOptionId::new("standard"),
                label: "Standard Shipping".to_string(),
                price: Decimal::new(599, 2),
                delivery_window: DeliveryWindow {
                    min_days: 3,
                    max_days: 5,
                },
            },
            Self {
                id: ShippingOptionId::new("express"),
                label: "Express Shipping".to_string(),
                price: Decimal::new(1499, 2),
                delivery_window: DeliveryWindow {
                    min_days: 1,
                    max_days: 2,
                },
            },
            Self {
                id: ShippingOptionId::new("overnight"),
                label: "Overnight Shipping".to_string(),
                price: Decimal::new(2999, 2),
                delivery_window: DeliveryWindow {
                    min_days: 1,
                    max_days: 1,
                },
            },
        ]
    }
}

/// Successful order submission response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderReceipt {
    /// Identifier assigned by the order service.
    pub order_id: OrderId,
}

/// Coupon validation collaborator.
#[allow(async_fn_in_trait)]
pub trait CouponService {
    /// Resolve a coupon code against the current cart subtotal.
    ///
    /// # Errors
    ///
    /// `CollaboratorError::CouponRejected` when the code is invalid, or a
    /// transport error when the collaborator cannot be reached.
    async fn resolve(
        &self,
        code: &str,
        cart_subtotal: Decimal,
    ) -> Result<CouponResolution, CollaboratorError>;
}

/// Shipping-rate collaborator.
#[allow(async_fn_in_trait)]
pub trait ShippingRates {
    /// Quote shipping methods for a destination and item set.
    ///
    /// # Errors
    ///
    /// Returns a transport or gateway error; callers usually go through
    /// [`quote_or_default`] instead of failing the flow.
    async fn quote(
        &self,
        address: &Address,
        items: &[CartItem],
    ) -> Result<Vec<ShippingOption>, CollaboratorError>;
}

/// Order-submission collaborator.
#[allow(async_fn_in_trait)]
pub trait OrderGateway {
    /// Submit the assembled order payload.
    ///
    /// # Errors
    ///
    /// Returns a transport or gateway error; the caller leaves all
    /// checkout state intact on failure.
    async fn submit_order(&self, payload: &OrderPayload) -> Result<OrderReceipt, CollaboratorError>;
}

/// Quote shipping methods, degrading to the static default set instead of
/// blocking checkout when the collaborator fails.
pub async fn quote_or_default<R: ShippingRates>(
    rates: &R,
    address: &Address,
    items: &[CartItem],
) -> Vec<ShippingOption> {
    match rates.quote(address, items).await {
        Ok(methods) if !methods.is_empty() => methods,
        Ok(_) => {
            warn!("shipping-rate collaborator returned no methods, using defaults");
            ShippingOption::default_set()
        }
        Err(e) => {
            warn!(error = %e, "shipping-rate lookup failed, using defaults");
            ShippingOption::default_set()
        }
    }
}
