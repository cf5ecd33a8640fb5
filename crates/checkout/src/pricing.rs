//! Pricing engine: a pure function from cart and session state to a price
//! breakdown.
//!
//! The breakdown is recomputed on demand after every relevant mutation and
//! never cached, so a stale total cannot be observed. The discount applies
//! against the pre-tax sum of all chargeable components and is clamped so
//! the taxable base never goes negative; rounding (2 decimal places,
//! half-up) happens only at the tax and total outputs.

use rust_decimal::Decimal;
use serde::Serialize;

use quince_core::round2;

use crate::cart::{CartStorage, CartStore};
use crate::collaborators::ShippingOption;
use crate::session::CheckoutSession;

/// Pricing parameters fixed per deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingConfig {
    /// Tax rate applied to the taxable base (e.g. `0.085`).
    pub tax_rate: Decimal,
    /// Flat gift-wrap fee, charged only when gift wrapping is enabled.
    pub gift_wrap_fee: Decimal,
}

/// The order total breakdown. Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceBreakdown {
    /// Cart subtotal at full precision.
    pub subtotal: Decimal,
    /// Selected shipping option price; zero if none chosen.
    pub shipping: Decimal,
    /// Gift-wrap fee; zero unless enabled.
    pub gift_wrap: Decimal,
    /// Coupon discount; zero if none applied.
    pub discount: Decimal,
    /// `max(0, subtotal + shipping + gift_wrap - discount)`.
    pub taxable_base: Decimal,
    /// `round2(taxable_base x tax_rate)`.
    pub tax: Decimal,
    /// `round2(taxable_base + tax)`.
    pub total: Decimal,
}

impl PriceBreakdown {
    /// Compute the breakdown from its components.
    ///
    /// Inputs are carried at full precision; only `tax` and `total` are
    /// rounded.
    #[must_use]
    pub fn compute(
        subtotal: Decimal,
        shipping: Decimal,
        gift_wrap: Decimal,
        discount: Decimal,
        tax_rate: Decimal,
    ) -> Self {
        let taxable_base = (subtotal + shipping + gift_wrap - discount).max(Decimal::ZERO);
        let tax = round2(taxable_base * tax_rate);
        let total = round2(taxable_base + tax);
        Self {
            subtotal,
            shipping,
            gift_wrap,
            discount,
            taxable_base,
            tax,
            total,
        }
    }

    /// Compute the breakdown for the current cart and session.
    ///
    /// The shipping price is resolved from the session's selected option id
    /// against the caller's quoted option list; an unset or unknown
    /// selection prices as zero.
    #[must_use]
    pub fn for_checkout<S: CartStorage>(
        cart: &CartStore<S>,
        session: &CheckoutSession,
        quoted: &[ShippingOption],
        config: &PricingConfig,
    ) -> Self {
        let shipping = session
            .shipping_option()
            .and_then(|id| quoted.iter().find(|option| &option.id == id))
            .map(|option| option.price)
            .unwrap_or_default();
        let gift_wrap = if session.gift().enabled {
            config.gift_wrap_fee
        } else {
            Decimal::ZERO
        };
        let discount = session
            .coupon()
            .map(|coupon| coupon.discount)
            .unwrap_or_default();
        Self::compute(cart.subtotal(), shipping, gift_wrap, discount, config.tax_rate)
    }
}
