//! Checkout session: the mutable state gathered across checkout steps.
//!
//! One live session per checkout attempt - created when the user enters
//! cart review, dropped on successful submission or explicit cancellation.
//! The session owns the addresses, shipping/payment selections, gift
//! options, and the applied coupon; the cart itself stays with
//! [`crate::cart::CartStore`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use quince_core::{PaymentMethodId, ShippingOptionId};

use crate::cart::{CartStorage, CartStore};
use crate::collaborators::{CollaboratorError, CouponKind, CouponService};
use crate::steps::{CheckoutStep, StepError, validate_step};

/// Maximum length of a gift message, in characters.
pub const GIFT_MESSAGE_MAX_LEN: usize = 200;

/// Unique identifier for a checkout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A shipping or billing address.
///
/// Required fields are step-validated, not type-enforced: an address can
/// be partially filled while the user is still on the shipping step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Recipient name.
    pub name: String,
    /// Street line.
    pub street: String,
    /// Apartment/unit, if any.
    pub unit: Option<String>,
    /// City.
    pub city: String,
    /// State or province.
    pub state: String,
    /// Postal code.
    pub postal_code: String,
    /// Country.
    pub country: String,
    /// Contact phone number.
    pub phone: String,
}

/// Gift options for the order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftOptions {
    /// Whether gift wrapping is requested.
    pub enabled: bool,
    /// Optional gift message; bounded by [`GIFT_MESSAGE_MAX_LEN`].
    pub message: Option<String>,
}

/// A coupon applied to the session.
///
/// The discount is the absolute amount resolved by the coupon collaborator;
/// the engine never recomputes it locally. The kind tag is display-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedCoupon {
    /// The coupon code as entered.
    pub code: String,
    /// Resolved absolute discount amount.
    pub discount: Decimal,
    /// Display tag: percentage or fixed.
    pub kind: CouponKind,
}

/// Errors from session mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The gift message exceeds the length bound.
    #[error("gift message exceeds {max} characters")]
    GiftMessageTooLong {
        /// The enforced maximum.
        max: usize,
    },
}

/// The checkout session aggregate. See the module docs for lifetime rules.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSession {
    id: SessionId,
    step: CheckoutStep,
    shipping_address: Address,
    billing_address: Option<Address>,
    billing_same_as_shipping: bool,
    shipping_option: Option<ShippingOptionId>,
    payment_method: Option<PaymentMethodId>,
    gift: GiftOptions,
    coupon: Option<AppliedCoupon>,
    created_at: DateTime<Utc>,
}

impl CheckoutSession {
    /// Start a new checkout attempt at the cart-review step.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: SessionId::generate(),
            step: CheckoutStep::CartReview,
            shipping_address: Address::default(),
            billing_address: None,
            billing_same_as_shipping: true,
            shipping_option: None,
            payment_method: None,
            gift: GiftOptions::default(),
            coupon: None,
            created_at: Utc::now(),
        }
    }

    /// Session identity.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// The current checkout step.
    #[must_use]
    pub const fn step(&self) -> CheckoutStep {
        self.step
    }

    /// When this attempt started.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The shipping address as entered so far.
    #[must_use]
    pub const fn shipping_address(&self) -> &Address {
        &self.shipping_address
    }

    /// The billing address that will be charged: the explicit billing
    /// address, or the shipping address under "same as shipping".
    #[must_use]
    pub fn effective_billing_address(&self) -> &Address {
        if self.billing_same_as_shipping {
            &self.shipping_address
        } else {
            self.billing_address.as_ref().unwrap_or(&self.shipping_address)
        }
    }

    /// Selected shipping option, if one has been chosen.
    #[must_use]
    pub const fn shipping_option(&self) -> Option<&ShippingOptionId> {
        self.shipping_option.as_ref()
    }

    /// Selected payment method, if one has been chosen.
    #[must_use]
    pub const fn payment_method(&self) -> Option<&PaymentMethodId> {
        self.payment_method.as_ref()
    }

    /// Gift options.
    #[must_use]
    pub const fn gift(&self) -> &GiftOptions {
        &self.gift
    }

    /// The applied coupon, if any.
    #[must_use]
    pub const fn coupon(&self) -> Option<&AppliedCoupon> {
        self.coupon.as_ref()
    }

    /// Replace the shipping address.
    pub fn set_shipping_address(&mut self, address: Address) {
        self.shipping_address = address;
    }

    /// Set an explicit billing address, turning off "same as shipping".
    pub fn set_billing_address(&mut self, address: Address) {
        self.billing_address = Some(address);
        self.billing_same_as_shipping = false;
    }

    /// Toggle "billing same as shipping". Turning it on discards any
    /// explicit billing address.
    pub fn set_billing_same_as_shipping(&mut self, same: bool) {
        self.billing_same_as_shipping = same;
        if same {
            self.billing_address = None;
        }
    }

    /// Select a shipping option by id. The option list itself comes from
    /// the shipping-rate collaborator; only the selection lives here.
    pub fn select_shipping_option(&mut self, option: ShippingOptionId) {
        self.shipping_option = Some(option);
    }

    /// Select a payment method by id. Tokenization and storage of the
    /// method are external.
    pub fn select_payment_method(&mut self, method: PaymentMethodId) {
        self.payment_method = Some(method);
    }

    /// Enable or disable gift wrapping.
    pub fn set_gift_wrap(&mut self, enabled: bool) {
        self.gift.enabled = enabled;
    }

    /// Set or clear the gift message.
    ///
    /// # Errors
    ///
    /// Returns an error if the message exceeds [`GIFT_MESSAGE_MAX_LEN`].
    pub fn set_gift_message(&mut self, message: Option<String>) -> Result<(), SessionError> {
        if let Some(ref msg) = message
            && msg.chars().count() > GIFT_MESSAGE_MAX_LEN
        {
            return Err(SessionError::GiftMessageTooLong {
                max: GIFT_MESSAGE_MAX_LEN,
            });
        }
        self.gift.message = message;
        Ok(())
    }

    /// Resolve a coupon code through the coupon collaborator and apply it.
    ///
    /// Applying a coupon replaces any previously applied one. On any
    /// failure the session is left untouched and the error carries the
    /// user-facing message.
    ///
    /// # Errors
    ///
    /// Returns `CollaboratorError::CouponRejected` for an invalid code, or
    /// a transport error if the collaborator could not be reached.
    pub async fn apply_coupon<C: CouponService>(
        &mut self,
        coupons: &C,
        code: &str,
        cart_subtotal: Decimal,
    ) -> Result<&AppliedCoupon, CollaboratorError> {
        let resolution = coupons.resolve(code, cart_subtotal).await?;
        debug!(code, discount = %resolution.discount, "coupon applied");
        let applied = self.coupon.insert(AppliedCoupon {
            code: code.to_string(),
            discount: resolution.discount,
            kind: resolution.kind,
        });
        Ok(&*applied)
    }

    /// Remove the applied coupon. Idempotent: removing when none is
    /// applied is a no-op, and the resulting price breakdown is identical
    /// to never having applied one.
    pub fn remove_coupon(&mut self) {
        self.coupon = None;
    }

    /// Advance to the next step if the current step's validation passes.
    ///
    /// # Errors
    ///
    /// `StepError::Blocked` with the violated fields if validation fails
    /// (the step does not change), or `StepError::NoForward` from `Review`
    /// and `Submitted` (review is left through submission).
    pub fn advance<S: CartStorage>(
        &mut self,
        cart: &CartStore<S>,
    ) -> Result<CheckoutStep, StepError> {
        let Some(next) = self.step.next() else {
            return Err(StepError::NoForward(self.step));
        };
        let errors = validate_step(self.step, self, cart.is_empty());
        if !errors.is_empty() {
            return Err(StepError::Blocked {
                step: self.step,
                errors,
            });
        }
        self.step = next;
        Ok(next)
    }

    /// Move back to an earlier step. Always permitted from any
    /// non-terminal step; never validated.
    ///
    /// # Errors
    ///
    /// Returns `StepError::InvalidRetreat` if the target is not an earlier
    /// live step or the session is already submitted.
    pub fn retreat(&mut self, to: CheckoutStep) -> Result<CheckoutStep, StepError> {
        if self.step.is_terminal() || to >= self.step {
            return Err(StepError::InvalidRetreat {
                from: self.step,
                to,
            });
        }
        self.step = to;
        Ok(to)
    }

    /// Whether the session has reached the terminal state.
    #[must_use]
    pub const fn is_submitted(&self) -> bool {
        self.step.is_terminal()
    }

    pub(crate) fn mark_submitted(&mut self) {
        self.step = CheckoutStep::Submitted;
    }
}

impl Default for CheckoutSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cart::{CartItem, MemoryCartStorage};
    use crate::collaborators::CouponResolution;
    use quince_core::ProductId;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn cart_with_item() -> CartStore<MemoryCartStorage> {
        let mut cart = CartStore::open(MemoryCartStorage::new()).unwrap();
        cart.add_item(CartItem {
            product: ProductId::new("p1"),
            variant: None,
            title: "Walnut Board".to_string(),
            unit_price: d("50.00"),
            quantity: 1,
            image_url: None,
        })
        .unwrap();
        cart
    }

    fn filled_address() -> Address {
        Address {
            name: "Ada Smith".to_string(),
            street: "1 Orchard Lane".to_string(),
            unit: None,
            city: "Portland".to_string(),
            state: "OR".to_string(),
            postal_code: "97201".to_string(),
            country: "US".to_string(),
            phone: "555-0100".to_string(),
        }
    }

    /// Coupon service stub resolving every code to a fixed $10 off.
    struct TenOff;

    impl CouponService for TenOff {
        async fn resolve(
            &self,
            _code: &str,
            _cart_subtotal: Decimal,
        ) -> Result<CouponResolution, CollaboratorError> {
            Ok(CouponResolution {
                discount: "10.00".parse().unwrap(),
                kind: CouponKind::Fixed,
            })
        }
    }

    /// Coupon service stub rejecting every code.
    struct AlwaysRejects;

    impl CouponService for AlwaysRejects {
        async fn resolve(
            &self,
            _code: &str,
            _cart_subtotal: Decimal,
        ) -> Result<CouponResolution, CollaboratorError> {
            Err(CollaboratorError::CouponRejected(
                "This code has expired".to_string(),
            ))
        }
    }

    #[test]
    fn test_new_session_defaults() {
        let session = CheckoutSession::new();
        assert_eq!(session.step(), CheckoutStep::CartReview);
        assert!(session.coupon().is_none());
        assert!(session.payment_method().is_none());
        assert!(!session.gift().enabled);
    }

    #[test]
    fn test_advance_requires_non_empty_cart() {
        let empty_cart = CartStore::open(MemoryCartStorage::new()).unwrap();
        let mut session = CheckoutSession::new();
        let err = session.advance(&empty_cart).unwrap_err();
        assert!(matches!(err, StepError::Blocked { .. }));
        assert_eq!(session.step(), CheckoutStep::CartReview);
    }

    #[test]
    fn test_advance_blocks_on_missing_city() {
        let cart = cart_with_item();
        let mut session = CheckoutSession::new();
        session.advance(&cart).unwrap();

        let mut address = filled_address();
        address.city = String::new();
        session.set_shipping_address(address);

        let err = session.advance(&cart).unwrap_err();
        let StepError::Blocked { step, errors } = err else {
            panic!("expected Blocked");
        };
        assert_eq!(step, CheckoutStep::Shipping);
        assert!(errors.iter().any(|e| e.field == "shipping_address.city"));
        // The step must not move on a failed validation
        assert_eq!(session.step(), CheckoutStep::Shipping);
    }

    #[test]
    fn test_full_forward_walk() {
        let cart = cart_with_item();
        let mut session = CheckoutSession::new();
        assert_eq!(session.advance(&cart).unwrap(), CheckoutStep::Shipping);
        session.set_shipping_address(filled_address());
        assert_eq!(session.advance(&cart).unwrap(), CheckoutStep::Payment);
        session.select_payment_method(quince_core::PaymentMethodId::new("pm-1"));
        assert_eq!(session.advance(&cart).unwrap(), CheckoutStep::Review);
        // Review is left through submission, not advance
        assert!(matches!(
            session.advance(&cart),
            Err(StepError::NoForward(CheckoutStep::Review))
        ));
    }

    #[test]
    fn test_retreat_skips_validation() {
        let cart = cart_with_item();
        let mut session = CheckoutSession::new();
        session.advance(&cart).unwrap();
        session.set_shipping_address(filled_address());
        session.advance(&cart).unwrap();

        // Wipe the address, then retreat; retreat never validates
        session.set_shipping_address(Address::default());
        assert_eq!(
            session.retreat(CheckoutStep::CartReview).unwrap(),
            CheckoutStep::CartReview
        );
    }

    #[test]
    fn test_retreat_rejects_forward_and_terminal() {
        let mut session = CheckoutSession::new();
        assert!(matches!(
            session.retreat(CheckoutStep::Review),
            Err(StepError::InvalidRetreat { .. })
        ));
        session.mark_submitted();
        assert!(matches!(
            session.retreat(CheckoutStep::CartReview),
            Err(StepError::InvalidRetreat { .. })
        ));
    }

    #[test]
    fn test_billing_same_as_shipping() {
        let mut session = CheckoutSession::new();
        session.set_shipping_address(filled_address());
        assert_eq!(session.effective_billing_address(), &filled_address());

        let mut other = filled_address();
        other.city = "Salem".to_string();
        session.set_billing_address(other.clone());
        assert_eq!(session.effective_billing_address(), &other);

        session.set_billing_same_as_shipping(true);
        assert_eq!(session.effective_billing_address(), &filled_address());
    }

    #[test]
    fn test_gift_message_bound() {
        let mut session = CheckoutSession::new();
        session
            .set_gift_message(Some("Happy birthday!".to_string()))
            .unwrap();
        let long = "x".repeat(GIFT_MESSAGE_MAX_LEN + 1);
        assert_eq!(
            session.set_gift_message(Some(long)),
            Err(SessionError::GiftMessageTooLong {
                max: GIFT_MESSAGE_MAX_LEN
            })
        );
        // A failed set leaves the previous message in place
        assert_eq!(session.gift().message.as_deref(), Some("Happy birthday!"));
    }

    #[tokio::test]
    async fn test_apply_and_remove_coupon() {
        let mut session = CheckoutSession::new();
        let applied = session
            .apply_coupon(&TenOff, "SAVE10", d("50.00"))
            .await
            .unwrap();
        assert_eq!(applied.discount, d("10.00"));
        assert_eq!(session.coupon().unwrap().code, "SAVE10");

        session.remove_coupon();
        assert!(session.coupon().is_none());
        // Idempotent
        session.remove_coupon();
        assert!(session.coupon().is_none());
    }

    #[tokio::test]
    async fn test_rejected_coupon_leaves_session_untouched() {
        let mut session = CheckoutSession::new();
        session
            .apply_coupon(&TenOff, "SAVE10", d("50.00"))
            .await
            .unwrap();
        let err = session
            .apply_coupon(&AlwaysRejects, "BADCODE", d("50.00"))
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::CouponRejected(_)));
        // The previously applied coupon survives a failed apply
        assert_eq!(session.coupon().unwrap().code, "SAVE10");
    }
}
