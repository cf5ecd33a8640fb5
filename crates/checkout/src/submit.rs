//! Order submitter: assembles the final payload and places the order.
//!
//! Submission is guarded three ways: it is only reachable from the review
//! step, every step's validation is re-run at submit time (the cart could
//! have emptied while the user sat on the review page), and an in-flight
//! flag rejects re-entrant submissions while a call is outstanding -
//! duplicates are rejected, not queued.
//!
//! On success the cart store is cleared and the session becomes terminal;
//! on failure both are left fully intact and the user retries manually.
//! There is no automatic retry.

use std::sync::atomic::{AtomicBool, Ordering};

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use quince_core::{CurrencyCode, PaymentMethodId, ShippingOptionId};

use crate::cart::{CartItem, CartStorage, CartStore};
use crate::collaborators::{CollaboratorError, OrderGateway, OrderReceipt, ShippingOption};
use crate::pricing::{PriceBreakdown, PricingConfig};
use crate::session::{Address, CheckoutSession};
use crate::steps::{CheckoutStep, FieldError, format_field_errors, validate_step};

/// Errors from order submission.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Submission was attempted from a step other than review.
    #[error("submission is only available from the review step (current: {0})")]
    NotAtReview(CheckoutStep),

    /// The submit-time re-validation failed.
    #[error("order validation failed: {}", format_field_errors(.0))]
    Validation(Vec<FieldError>),

    /// Another submission is already outstanding.
    #[error("an order submission is already in progress")]
    AlreadyInFlight,

    /// The order collaborator rejected or could not take the order.
    #[error("order submission failed: {0}")]
    Gateway(#[from] CollaboratorError),
}

/// The immutable order snapshot sent to the order collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderPayload {
    /// Line items at submission time.
    pub items: Vec<CartItem>,
    /// Destination address.
    pub shipping_address: Address,
    /// Charged address (shipping address under "same as shipping").
    pub billing_address: Address,
    /// Selected payment method id.
    pub payment_method: PaymentMethodId,
    /// Whether gift wrapping was requested.
    pub gift_wrap: bool,
    /// Gift message, if any.
    pub gift_message: Option<String>,
    /// Selected shipping option id, if any.
    pub shipping_option: Option<ShippingOptionId>,
    /// Applied coupon code, if any.
    pub coupon_code: Option<String>,
    /// Order total from the pricing pipeline, computed at submission time.
    pub total: Decimal,
    /// Currency of all amounts.
    pub currency: CurrencyCode,
}

/// Releases the in-flight flag when a submission attempt ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The order submitter. One instance per checkout flow; holds only the
/// in-flight flag.
#[derive(Debug, Default)]
pub struct OrderSubmitter {
    in_flight: AtomicBool,
}

impl OrderSubmitter {
    /// Create a submitter with no submission outstanding.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            in_flight: AtomicBool::new(false),
        }
    }

    /// Whether a submission is currently outstanding.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Validate, snapshot, and submit the order; clear the cart and
    /// finish the session on success.
    ///
    /// The gateway is called exactly once per invocation. On failure the
    /// cart and session are untouched so the user can retry manually.
    ///
    /// # Errors
    ///
    /// See [`SubmitError`]; all variants leave checkout state intact.
    #[instrument(skip_all, fields(session = %session.id()))]
    pub async fn submit<G: OrderGateway, S: CartStorage>(
        &self,
        gateway: &G,
        cart: &mut CartStore<S>,
        session: &mut CheckoutSession,
        quoted: &[ShippingOption],
        pricing: &PricingConfig,
    ) -> Result<OrderReceipt, SubmitError> {
        if session.step() != CheckoutStep::Review {
            return Err(SubmitError::NotAtReview(session.step()));
        }

        // Re-validate everything: time may have passed since the step gate
        // last ran and the cart could have emptied.
        let errors = validate_step(CheckoutStep::Review, session, cart.is_empty());
        if !errors.is_empty() {
            return Err(SubmitError::Validation(errors));
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SubmitError::AlreadyInFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let payload = build_payload(cart, session, quoted, pricing)?;
        let receipt = gateway.submit_order(&payload).await?;

        // Success: the session is finished and the cart (including its
        // persisted record) is cleared. The order exists at this point, so
        // a persistence failure must not fail the submission.
        session.mark_submitted();
        if let Err(e) = cart.clear() {
            warn!(error = %e, "order placed but clearing the persisted cart failed");
        }
        info!(order_id = %receipt.order_id, total = %payload.total, "order submitted");
        Ok(receipt)
    }
}

/// Assemble the immutable payload snapshot from the cart and session.
fn build_payload<S: CartStorage>(
    cart: &CartStore<S>,
    session: &CheckoutSession,
    quoted: &[ShippingOption],
    pricing: &PricingConfig,
) -> Result<OrderPayload, SubmitError> {
    let payment_method = session.payment_method().cloned().ok_or_else(|| {
        SubmitError::Validation(vec![FieldError {
            field: "payment_method",
            message: "a payment method is required",
        }])
    })?;
    let breakdown = PriceBreakdown::for_checkout(cart, session, quoted, pricing);

    Ok(OrderPayload {
        items: cart.items().to_vec(),
        shipping_address: session.shipping_address().clone(),
        billing_address: session.effective_billing_address().clone(),
        payment_method,
        gift_wrap: session.gift().enabled,
        gift_message: session.gift().message.clone(),
        shipping_option: session.shipping_option().cloned(),
        coupon_code: session.coupon().map(|c| c.code.clone()),
        total: breakdown.total,
        currency: CurrencyCode::USD,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cart::MemoryCartStorage;
    use quince_core::{OrderId, ProductId};

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn pricing() -> PricingConfig {
        PricingConfig {
            tax_rate: d("0.085"),
            gift_wrap_fee: d("4.99"),
        }
    }

    fn ready_checkout() -> (CartStore<MemoryCartStorage>, CheckoutSession) {
        let mut cart = CartStore::open(MemoryCartStorage::new()).unwrap();
        cart.add_item(CartItem {
            product: ProductId::new("p1"),
            variant: None,
            title: "Field Notebook".to_string(),
            unit_price: d("100.00"),
            quantity: 1,
            image_url: None,
        })
        .unwrap();

        let mut session = CheckoutSession::new();
        session.advance(&cart).unwrap();
        session.set_shipping_address(Address {
            name: "Ada Smith".to_string(),
            street: "1 Orchard Lane".to_string(),
            unit: None,
            city: "Portland".to_string(),
            state: "OR".to_string(),
            postal_code: "97201".to_string(),
            country: "US".to_string(),
            phone: "555-0100".to_string(),
        });
        session.select_shipping_option(ShippingOptionId::new("standard"));
        session.advance(&cart).unwrap();
        session.select_payment_method(PaymentMethodId::new("pm-1"));
        session.advance(&cart).unwrap();
        (cart, session)
    }

    /// Gateway stub that accepts everything.
    struct Accepts;

    impl OrderGateway for Accepts {
        async fn submit_order(
            &self,
            _payload: &OrderPayload,
        ) -> Result<OrderReceipt, CollaboratorError> {
            Ok(OrderReceipt {
                order_id: OrderId::new("ord-1"),
            })
        }
    }

    /// Gateway stub that always fails with a server error.
    struct Refuses;

    impl OrderGateway for Refuses {
        async fn submit_order(
            &self,
            _payload: &OrderPayload,
        ) -> Result<OrderReceipt, CollaboratorError> {
            Err(CollaboratorError::Api {
                status: 502,
                message: "upstream unavailable".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_submit_success_clears_cart_and_finishes_session() {
        let (mut cart, mut session) = ready_checkout();
        let submitter = OrderSubmitter::new();
        let receipt = submitter
            .submit(
                &Accepts,
                &mut cart,
                &mut session,
                &ShippingOption::default_set(),
                &pricing(),
            )
            .await
            .unwrap();
        assert_eq!(receipt.order_id, OrderId::new("ord-1"));
        assert!(cart.is_empty());
        assert!(session.is_submitted());
        assert!(!submitter.is_in_flight());
    }

    #[tokio::test]
    async fn test_submit_failure_leaves_state_intact() {
        let (mut cart, mut session) = ready_checkout();
        let items_before = cart.items().to_vec();
        let session_before = session.clone();
        let submitter = OrderSubmitter::new();
        let err = submitter
            .submit(
                &Refuses,
                &mut cart,
                &mut session,
                &ShippingOption::default_set(),
                &pricing(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Gateway(_)));
        assert_eq!(cart.items(), items_before.as_slice());
        assert_eq!(session, session_before);
        assert_eq!(session.step(), CheckoutStep::Review);
        assert!(!submitter.is_in_flight());
    }

    #[tokio::test]
    async fn test_submit_rejected_outside_review() {
        let mut cart = CartStore::open(MemoryCartStorage::new()).unwrap();
        let mut session = CheckoutSession::new();
        let submitter = OrderSubmitter::new();
        let err = submitter
            .submit(&Accepts, &mut cart, &mut session, &[], &pricing())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SubmitError::NotAtReview(CheckoutStep::CartReview)
        ));
    }

    #[tokio::test]
    async fn test_submit_revalidates_emptied_cart() {
        let (mut cart, mut session) = ready_checkout();
        cart.clear().unwrap();
        let submitter = OrderSubmitter::new();
        let err = submitter
            .submit(&Accepts, &mut cart, &mut session, &[], &pricing())
            .await
            .unwrap_err();
        let SubmitError::Validation(errors) = err else {
            panic!("expected Validation");
        };
        assert!(errors.iter().any(|e| e.field == "cart"));
        assert_eq!(session.step(), CheckoutStep::Review);
    }

    #[tokio::test]
    async fn test_in_flight_guard_rejects_reentrant_submit() {
        let (mut cart, mut session) = ready_checkout();
        let submitter = OrderSubmitter::new();
        // Simulate an outstanding call by holding the flag
        submitter.in_flight.store(true, Ordering::SeqCst);
        let err = submitter
            .submit(
                &Accepts,
                &mut cart,
                &mut session,
                &ShippingOption::default_set(),
                &pricing(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::AlreadyInFlight));
        // The guarded attempt must not have touched anything
        assert!(!cart.is_empty());
        assert_eq!(session.step(), CheckoutStep::Review);
        submitter.in_flight.store(false, Ordering::SeqCst);
    }

    #[tokio::test]
    async fn test_payload_snapshot_contents() {
        let (cart, mut session) = ready_checkout();
        session.set_gift_wrap(true);
        session
            .set_gift_message(Some("Enjoy!".to_string()))
            .unwrap();

        let payload =
            build_payload(&cart, &session, &ShippingOption::default_set(), &pricing()).unwrap();
        assert_eq!(payload.items.len(), 1);
        assert_eq!(payload.payment_method, PaymentMethodId::new("pm-1"));
        assert!(payload.gift_wrap);
        assert_eq!(payload.gift_message.as_deref(), Some("Enjoy!"));
        assert_eq!(
            payload.shipping_option,
            Some(ShippingOptionId::new("standard"))
        );
        // 100.00 + 5.99 shipping + 4.99 gift wrap = 110.98; x1.085 = 120.41
        assert_eq!(payload.total, d("120.41"));
        // Billing defaults to shipping
        assert_eq!(payload.billing_address, payload.shipping_address);
    }
}
