//! Cart store: the single owner and mutator of cart line items.
//!
//! The cart is an ordered collection keyed by `(product, variant)`. Every
//! mutation refreshes the activity timestamp, persists the full cart
//! through [`CartStorage`], and publishes a [`CartObservation`] on a watch
//! channel consumed by the abandonment monitor. The subtotal is always
//! derived from the line items, never stored.

pub mod storage;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use quince_core::{MoneyError, ProductId, VariantId, ensure_non_negative};

pub use storage::{CartStorage, JsonFileCartStorage, MemoryCartStorage, PersistedCart, StorageError};

/// Maximum quantity allowed per line item.
pub const MAX_QUANTITY_PER_ITEM: u32 = 999;

/// Errors from cart mutations.
#[derive(Debug, Error)]
pub enum CartError {
    /// An item was added with a zero quantity.
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// The requested quantity exceeds the per-item ceiling.
    #[error("quantity {requested} for {product} exceeds the limit of {MAX_QUANTITY_PER_ITEM}")]
    QuantityLimit {
        /// Product whose quantity was pushed over the ceiling.
        product: ProductId,
        /// Quantity that was requested.
        requested: u32,
    },

    /// An item carried a negative unit price.
    #[error(transparent)]
    Price(#[from] MoneyError),

    /// The persistence backend failed; in-memory state is already updated.
    #[error("cart storage error: {0}")]
    Storage(#[from] StorageError),
}

/// A line item in the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    /// Product identity.
    pub product: ProductId,
    /// Variant identity, if the product has variants.
    pub variant: Option<VariantId>,
    /// Display title.
    pub title: String,
    /// Price per unit; never negative.
    pub unit_price: Decimal,
    /// Quantity; at least 1 while the item is in the cart.
    pub quantity: u32,
    /// Image reference for display.
    pub image_url: Option<String>,
}

impl CartItem {
    /// The `(product, variant)` key items are merged on.
    #[must_use]
    pub fn key(&self) -> (&ProductId, Option<&VariantId>) {
        (&self.product, self.variant.as_ref())
    }

    /// Line total: unit price times quantity, at full precision.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// A snapshot of cart state published on every mutation.
///
/// The abandonment monitor only needs emptiness and an activity counter;
/// item data stays with the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CartObservation {
    /// Number of distinct line items.
    pub items: usize,
    /// Monotonic mutation counter; a change marks user activity.
    pub revision: u64,
}

/// The cart store. One instance per cart; all mutations go through it.
#[derive(Debug)]
pub struct CartStore<S: CartStorage> {
    items: Vec<CartItem>,
    last_activity_at: DateTime<Utc>,
    revision: u64,
    storage: S,
    observations: watch::Sender<CartObservation>,
}

impl<S: CartStorage> CartStore<S> {
    /// Open the cart store, restoring any persisted state.
    ///
    /// # Errors
    ///
    /// Returns an error if the persistence backend cannot be read.
    pub fn open(storage: S) -> Result<Self, CartError> {
        let (items, last_activity_at) = match storage.load()? {
            Some(persisted) => (persisted.items, persisted.last_activity_at),
            None => (Vec::new(), Utc::now()),
        };
        let (observations, _) = watch::channel(CartObservation {
            items: items.len(),
            revision: 0,
        });
        Ok(Self {
            items,
            last_activity_at,
            revision: 0,
            storage,
            observations,
        })
    }

    /// Subscribe to cart observations (used by the abandonment monitor).
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartObservation> {
        self.observations.subscribe()
    }

    /// Add an item, merging quantities when the `(product, variant)` key is
    /// already present.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero quantity, a negative unit price, a
    /// quantity past [`MAX_QUANTITY_PER_ITEM`], or a persistence failure.
    pub fn add_item(&mut self, item: CartItem) -> Result<(), CartError> {
        if item.quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        ensure_non_negative(item.unit_price)?;

        if let Some(existing) = self.items.iter_mut().find(|i| i.key() == item.key()) {
            let merged = existing.quantity.saturating_add(item.quantity);
            if merged > MAX_QUANTITY_PER_ITEM {
                return Err(CartError::QuantityLimit {
                    product: item.product,
                    requested: merged,
                });
            }
            existing.quantity = merged;
        } else {
            if item.quantity > MAX_QUANTITY_PER_ITEM {
                return Err(CartError::QuantityLimit {
                    product: item.product,
                    requested: item.quantity,
                });
            }
            self.items.push(item);
        }
        self.touch()
    }

    /// Set the quantity of an item. A quantity of zero removes the item.
    ///
    /// Returns whether an item was updated or removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the quantity exceeds the ceiling or persistence
    /// fails.
    pub fn update_quantity(
        &mut self,
        product: &ProductId,
        variant: Option<&VariantId>,
        quantity: u32,
    ) -> Result<bool, CartError> {
        if quantity == 0 {
            return self.remove_item(product, variant);
        }
        if quantity > MAX_QUANTITY_PER_ITEM {
            return Err(CartError::QuantityLimit {
                product: product.clone(),
                requested: quantity,
            });
        }
        let Some(item) = self
            .items
            .iter_mut()
            .find(|i| i.key() == (product, variant))
        else {
            return Ok(false);
        };
        item.quantity = quantity;
        self.touch()?;
        Ok(true)
    }

    /// Remove an item. Returns whether it was present.
    ///
    /// # Errors
    ///
    /// Returns an error if persistence fails.
    pub fn remove_item(
        &mut self,
        product: &ProductId,
        variant: Option<&VariantId>,
    ) -> Result<bool, CartError> {
        let before = self.items.len();
        self.items.retain(|i| i.key() != (product, variant));
        if self.items.len() == before {
            return Ok(false);
        }
        self.touch()?;
        Ok(true)
    }

    /// Remove every item and the persisted record.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted record cannot be removed.
    pub fn clear(&mut self) -> Result<(), CartError> {
        self.items.clear();
        self.last_activity_at = Utc::now();
        self.publish();
        self.storage.clear()?;
        Ok(())
    }

    /// Sum of `unit_price x quantity` across all items, at full precision.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Total item quantity (for the cart badge).
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Whether the cart has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The line items, in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Timestamp of the most recent mutation.
    #[must_use]
    pub const fn last_activity_at(&self) -> DateTime<Utc> {
        self.last_activity_at
    }

    /// Refresh activity, notify observers, and persist the full cart.
    fn touch(&mut self) -> Result<(), CartError> {
        self.last_activity_at = Utc::now();
        self.publish();
        self.storage.save(&PersistedCart {
            items: self.items.clone(),
            last_activity_at: self.last_activity_at,
        })?;
        Ok(())
    }

    fn publish(&mut self) {
        self.revision += 1;
        self.observations.send_replace(CartObservation {
            items: self.items.len(),
            revision: self.revision,
        });
    }
}
