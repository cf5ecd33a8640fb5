//! Checkout step gate: the validated state machine over checkout steps.
//!
//! Steps advance one at a time and only past a passing validation; moving
//! backward is always permitted and never validated. Validation failures
//! are field-scoped and recoverable: the caller surfaces them next to the
//! offending inputs and retries locally.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::CheckoutSession;

/// Steps in the checkout flow. `Submitted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    /// Cart review.
    CartReview,
    /// Shipping address and method.
    Shipping,
    /// Payment method selection.
    Payment,
    /// Order review before submission.
    Review,
    /// Order placed; the session is finished.
    Submitted,
}

impl CheckoutStep {
    /// The step number (1-indexed); `Submitted` reports 5.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::CartReview => 1,
            Self::Shipping => 2,
            Self::Payment => 3,
            Self::Review => 4,
            Self::Submitted => 5,
        }
    }

    /// Stable identifier for serialization and logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CartReview => "cart_review",
            Self::Shipping => "shipping",
            Self::Payment => "payment",
            Self::Review => "review",
            Self::Submitted => "submitted",
        }
    }

    /// Human-readable name for progress displays.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::CartReview => "Cart",
            Self::Shipping => "Shipping",
            Self::Payment => "Payment",
            Self::Review => "Review",
            Self::Submitted => "Submitted",
        }
    }

    /// The following step, if there is a plain forward transition.
    ///
    /// Leaving `Review` happens through submission, not `advance`.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::CartReview => Some(Self::Shipping),
            Self::Shipping => Some(Self::Payment),
            Self::Payment => Some(Self::Review),
            Self::Review | Self::Submitted => None,
        }
    }

    /// Whether this step ends the session.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Submitted)
    }
}

impl std::fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A field-scoped validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Dotted path of the offending field (e.g. `shipping_address.city`).
    pub field: &'static str,
    /// Human-readable message for display next to the field.
    pub message: &'static str,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors from step transitions.
#[derive(Debug, Error)]
pub enum StepError {
    /// The current step's validation failed; the step did not change.
    #[error("cannot leave {step}: {}", format_field_errors(.errors))]
    Blocked {
        /// Step whose validation failed.
        step: CheckoutStep,
        /// The violated fields.
        errors: Vec<FieldError>,
    },

    /// There is no plain forward transition from this step.
    #[error("no forward transition from {0}; review is left through submission")]
    NoForward(CheckoutStep),

    /// The requested backward move was not to an earlier live step.
    #[error("cannot retreat from {from} to {to}")]
    InvalidRetreat {
        /// Current step.
        from: CheckoutStep,
        /// Requested step.
        to: CheckoutStep,
    },
}

pub(crate) fn format_field_errors(errors: &[FieldError]) -> String {
    if errors.is_empty() {
        return "(no field details provided)".to_string();
    }
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Run the validator for a step against the current session and cart.
///
/// Returns the violated fields; empty means the step passes. The `Review`
/// validator is the submit gate: it re-checks every earlier step, since
/// time may have elapsed and the cart could have emptied.
#[must_use]
pub fn validate_step(
    step: CheckoutStep,
    session: &CheckoutSession,
    cart_is_empty: bool,
) -> Vec<FieldError> {
    let mut errors = Vec::new();
    match step {
        CheckoutStep::CartReview => {
            if cart_is_empty {
                errors.push(FieldError {
                    field: "cart",
                    message: "your cart is empty",
                });
            }
        }
        CheckoutStep::Shipping => {
            let address = session.shipping_address();
            if address.street.trim().is_empty() {
                errors.push(FieldError {
                    field: "shipping_address.street",
                    message: "street is required",
                });
            }
            if address.city.trim().is_empty() {
                errors.push(FieldError {
                    field: "shipping_address.city",
                    message: "city is required",
                });
            }
            if address.postal_code.trim().is_empty() {
                errors.push(FieldError {
                    field: "shipping_address.postal_code",
                    message: "postal code is required",
                });
            }
            if address.country.trim().is_empty() {
                errors.push(FieldError {
                    field: "shipping_address.country",
                    message: "country is required",
                });
            }
        }
        CheckoutStep::Payment => {
            if session.payment_method().is_none() {
                errors.push(FieldError {
                    field: "payment_method",
                    message: "a payment method is required",
                });
            }
        }
        CheckoutStep::Review => {
            errors.extend(validate_step(CheckoutStep::CartReview, session, cart_is_empty));
            errors.extend(validate_step(CheckoutStep::Shipping, session, cart_is_empty));
            errors.extend(validate_step(CheckoutStep::Payment, session, cart_is_empty));
        }
        CheckoutStep::Submitted => {}
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_ordering_and_numbers() {
        assert!(CheckoutStep::CartReview < CheckoutStep::Shipping);
        assert!(CheckoutStep::Review < CheckoutStep::Submitted);
        assert_eq!(CheckoutStep::CartReview.number(), 1);
        assert_eq!(CheckoutStep::Review.number(), 4);
    }

    #[test]
    fn test_next_stops_at_review() {
        assert_eq!(CheckoutStep::CartReview.next(), Some(CheckoutStep::Shipping));
        assert_eq!(CheckoutStep::Payment.next(), Some(CheckoutStep::Review));
        assert_eq!(CheckoutStep::Review.next(), None);
        assert_eq!(CheckoutStep::Submitted.next(), None);
    }

    #[test]
    fn test_terminal() {
        assert!(CheckoutStep::Submitted.is_terminal());
        assert!(!CheckoutStep::Review.is_terminal());
    }

    #[test]
    fn test_field_error_display() {
        let err = FieldError {
            field: "shipping_address.city",
            message: "city is required",
        };
        assert_eq!(err.to_string(), "shipping_address.city: city is required");
    }

    #[test]
    fn test_format_field_errors_empty() {
        assert_eq!(format_field_errors(&[]), "(no field details provided)");
    }
}
