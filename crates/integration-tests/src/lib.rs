//! Integration test support for Quince.
//!
//! Provides local implementations of the collaborator traits so the
//! checkout flow can be exercised end to end without a network, plus
//! builders for carts, addresses, and sessions.
//!
//! # Test Categories
//!
//! - `checkout_flow` - cart -> steps -> pricing -> submission scenarios
//! - `abandonment` - recovery timer scenarios under a paused clock

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use rust_decimal::Decimal;

use quince_checkout::cart::{CartItem, CartStore, MemoryCartStorage};
use quince_checkout::collaborators::{
    CollaboratorError, CouponKind, CouponResolution, CouponService, OrderGateway, OrderReceipt,
    ShippingOption, ShippingRates,
};
use quince_checkout::pricing::PricingConfig;
use quince_checkout::session::Address;
use quince_checkout::submit::OrderPayload;
use quince_core::{OrderId, ProductId, VariantId};

/// Initialize test logging once; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

/// Parse a decimal literal in tests.
///
/// # Panics
///
/// Panics on an invalid literal; test inputs are fixed strings.
#[must_use]
pub fn d(s: &str) -> Decimal {
    s.parse().expect("test decimal literal")
}

/// Build a cart item.
#[must_use]
pub fn cart_item(product: &str, variant: Option<&str>, price: &str, quantity: u32) -> CartItem {
    CartItem {
        product: ProductId::new(product),
        variant: variant.map(VariantId::new),
        title: format!("Item {product}"),
        unit_price: d(price),
        quantity,
        image_url: Some(format!("https://cdn.example.com/{product}.jpg")),
    }
}

/// An in-memory cart preloaded with the given items.
///
/// # Panics
///
/// Panics if an item is invalid; test inputs are fixed.
#[must_use]
pub fn cart_with(items: &[CartItem]) -> CartStore<MemoryCartStorage> {
    let mut cart = CartStore::open(MemoryCartStorage::new()).expect("open in-memory cart");
    for item in items {
        cart.add_item(item.clone()).expect("add test item");
    }
    cart
}

/// A complete, step-valid shipping address.
#[must_use]
pub fn valid_address() -> Address {
    Address {
        name: "Ada Smith".to_string(),
        street: "1 Orchard Lane".to_string(),
        unit: Some("Apt 4".to_string()),
        city: "Portland".to_string(),
        state: "OR".to_string(),
        postal_code: "97201".to_string(),
        country: "US".to_string(),
        phone: "555-0100".to_string(),
    }
}

/// Standard pricing parameters shared across scenarios.
#[must_use]
pub fn standard_pricing() -> PricingConfig {
    PricingConfig {
        tax_rate: d("0.085"),
        gift_wrap_fee: d("4.99"),
    }
}

// =============================================================================
// Mock Collaborators
// =============================================================================

/// Coupon service with a fixed table of known codes.
#[derive(Debug, Default)]
pub struct TableCoupons {
    codes: HashMap<String, (Decimal, CouponKind)>,
}

impl TableCoupons {
    /// Build a table from `(code, discount, kind)` rows.
    #[must_use]
    pub fn new(rows: &[(&str, &str, CouponKind)]) -> Self {
        let codes = rows
            .iter()
            .map(|(code, discount, kind)| ((*code).to_string(), (d(discount), *kind)))
            .collect();
        Self { codes }
    }
}

impl CouponService for TableCoupons {
    async fn resolve(
        &self,
        code: &str,
        _cart_subtotal: Decimal,
    ) -> Result<CouponResolution, CollaboratorError> {
        self.codes.get(code).map_or_else(
            || {
                Err(CollaboratorError::CouponRejected(
                    "This coupon code is not valid".to_string(),
                ))
            },
            |(discount, kind)| {
                Ok(CouponResolution {
                    discount: *discount,
                    kind: *kind,
                })
            },
        )
    }
}

/// Shipping-rate service that always fails, to exercise the fallback path.
#[derive(Debug, Default)]
pub struct UnreachableRates;

impl ShippingRates for UnreachableRates {
    async fn quote(
        &self,
        _address: &Address,
        _items: &[CartItem],
    ) -> Result<Vec<ShippingOption>, CollaboratorError> {
        Err(CollaboratorError::Api {
            status: 503,
            message: "rate service unavailable".to_string(),
        })
    }
}

/// Order gateway that records every payload it accepts or refuses.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    /// When set, every submission fails with this HTTP status.
    pub fail_with_status: Option<u16>,
    submissions: Mutex<Vec<OrderPayload>>,
    next_order: AtomicU64,
}

impl RecordingGateway {
    /// A gateway that accepts everything.
    #[must_use]
    pub fn accepting() -> Self {
        Self::default()
    }

    /// A gateway that refuses everything with the given status.
    #[must_use]
    pub fn refusing(status: u16) -> Self {
        Self {
            fail_with_status: Some(status),
            ..Self::default()
        }
    }

    /// Payloads received so far (accepted or refused).
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn submissions(&self) -> Vec<OrderPayload> {
        self.submissions.lock().expect("submissions lock").clone()
    }
}

impl OrderGateway for RecordingGateway {
    async fn submit_order(&self, payload: &OrderPayload) -> Result<OrderReceipt, CollaboratorError> {
        self.submissions
            .lock()
            .expect("submissions lock")
            .push(payload.clone());
        if let Some(status) = self.fail_with_status {
            return Err(CollaboratorError::Api {
                status,
                message: "order service rejected the request".to_string(),
            });
        }
        let n = self.next_order.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(OrderReceipt {
            order_id: OrderId::new(format!("ord-{n}")),
        })
    }
}
