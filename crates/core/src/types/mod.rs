//! Core types for Quince.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod money;

pub use id::*;
pub use money::{CurrencyCode, MoneyError, ensure_non_negative, round2};
