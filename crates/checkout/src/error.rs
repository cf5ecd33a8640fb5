//! Unified error type for the checkout engine.
//!
//! Each component surfaces its own typed error; `CheckoutError` is the
//! single type an embedding application matches on at its event-handler
//! boundary. Everything here is recoverable - validation failures block
//! one transition, collaborator failures degrade or surface a message,
//! submission failures leave the order-in-progress intact. Fatal errors
//! are the surrounding application's concern.

use thiserror::Error;

use crate::cart::CartError;
use crate::collaborators::CollaboratorError;
use crate::config::ConfigError;
use crate::session::SessionError;
use crate::steps::StepError;
use crate::submit::SubmitError;

/// Application-facing error for the checkout engine.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Cart mutation or persistence failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// A step transition was blocked or invalid.
    #[error("Step error: {0}")]
    Step(#[from] StepError),

    /// Session mutation failed.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// A collaborator call failed.
    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    /// Order submission failed.
    #[error("Submission error: {0}")]
    Submit(#[from] SubmitError),

    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl CheckoutError {
    /// A message safe to show the user.
    ///
    /// Validation and coupon errors carry their own wording; transport and
    /// storage details are not exposed.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Step(StepError::Blocked { errors, .. }) => errors
                .iter()
                .map(|e| e.message.to_string())
                .collect::<Vec<_>>()
                .join("; "),
            Self::Step(err) => err.to_string(),
            Self::Session(err) => err.to_string(),
            Self::Collaborator(CollaboratorError::CouponRejected(message)) => message.clone(),
            Self::Submit(SubmitError::Validation(errors)) => errors
                .iter()
                .map(|e| e.message.to_string())
                .collect::<Vec<_>>()
                .join("; "),
            Self::Submit(SubmitError::AlreadyInFlight | SubmitError::NotAtReview(_)) => {
                self.to_string()
            }
            Self::Submit(SubmitError::Gateway(_)) => {
                "We couldn't place your order. Please try again.".to_string()
            }
            Self::Collaborator(_) => "External service error".to_string(),
            Self::Cart(CartError::Storage(_)) => {
                "Your cart couldn't be saved. It is still available in this session.".to_string()
            }
            Self::Cart(err) => err.to_string(),
            Self::Config(_) => "Internal configuration error".to_string(),
        }
    }
}

/// Result type alias for `CheckoutError`.
pub type Result<T> = std::result::Result<T, CheckoutError>;
