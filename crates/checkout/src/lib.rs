//! Quince checkout - the cart/checkout lifecycle engine.
//!
//! This crate turns a mutable shopping cart into a validated, priced,
//! submittable order, and separately monitors cart abandonment to
//! re-engage the user. It is an embeddable core: page rendering, payment
//! tokenization, and the internals of the coupon/shipping/order services
//! live outside, behind the traits in [`collaborators`].
//!
//! # Architecture
//!
//! - [`cart`] - the cart store, sole owner of line items; persists through
//!   a swappable key-value backend and publishes observations
//! - [`session`] - per-attempt checkout state (addresses, selections,
//!   gift options, coupon)
//! - [`steps`] - the validated step gate over the checkout flow
//! - [`pricing`] - pure price-breakdown computation
//! - [`abandonment`] - cancellable recovery timers over cart activity
//! - [`submit`] - order assembly and submission with an in-flight guard
//! - [`collaborators`] - external service seams and the HTTP gateway client
//! - [`config`] - environment-driven configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use quince_checkout::cart::{CartStore, MemoryCartStorage};
//! use quince_checkout::collaborators::{GatewayClient, quote_or_default};
//! use quince_checkout::config::CheckoutConfig;
//! use quince_checkout::session::CheckoutSession;
//! use quince_checkout::submit::OrderSubmitter;
//!
//! let config = CheckoutConfig::from_env()?;
//! let gateway = GatewayClient::new(&config.gateway);
//!
//! let mut cart = CartStore::open(MemoryCartStorage::new())?;
//! let mut session = CheckoutSession::new();
//!
//! // ... user fills the cart and walks the steps ...
//! session.advance(&cart)?;
//!
//! let quoted = quote_or_default(&gateway, session.shipping_address(), cart.items()).await;
//! let submitter = OrderSubmitter::new();
//! let receipt = submitter
//!     .submit(&gateway, &mut cart, &mut session, &quoted, &config.pricing)
//!     .await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod abandonment;
pub mod cart;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod pricing;
pub mod session;
pub mod steps;
pub mod submit;

pub use abandonment::{AbandonmentMonitor, AbandonmentSettings, RecoveryPrompt};
pub use cart::{CartItem, CartStore, JsonFileCartStorage, MemoryCartStorage};
pub use collaborators::{
    CouponService, GatewayClient, OrderGateway, ShippingOption, ShippingRates,
};
pub use config::CheckoutConfig;
pub use error::{CheckoutError, Result};
pub use pricing::{PriceBreakdown, PricingConfig};
pub use session::{Address, CheckoutSession, GiftOptions};
pub use steps::{CheckoutStep, FieldError};
pub use submit::{OrderPayload, OrderSubmitter};
