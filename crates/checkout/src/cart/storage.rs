//! Durable key-value persistence for cart state.
//!
//! The cart survives a reload by serializing its full state (items plus the
//! last-activity timestamp) on every mutation. The backend is swappable
//! behind [`CartStorage`]: the engine ships an in-memory store for tests
//! and a JSON-file store; a database-backed store would implement the same
//! trait.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::CartItem;

/// Errors from the cart persistence backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing store failed.
    #[error("cart storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored document could not be (de)serialized.
    #[error("cart storage serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// The serialized cart document: items plus the activity timestamp the
/// abandonment monitor keys off after a reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedCart {
    /// Cart line items, in insertion order.
    pub items: Vec<CartItem>,
    /// Timestamp of the most recent cart mutation.
    pub last_activity_at: DateTime<Utc>,
}

/// Durable key-value interface for cart state.
///
/// Writes are full serialize/replace; there is no partial update.
pub trait CartStorage {
    /// Load the persisted cart, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read or parsed.
    fn load(&self) -> Result<Option<PersistedCart>, StorageError>;

    /// Replace the persisted cart with the given document.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn save(&mut self, cart: &PersistedCart) -> Result<(), StorageError>;

    /// Remove the persisted cart entirely.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be cleared.
    fn clear(&mut self) -> Result<(), StorageError>;
}

/// In-memory storage. State is lost on drop; used in tests and as a
/// default when no durable path is configured.
#[derive(Debug, Default)]
pub struct MemoryCartStorage {
    slot: Option<PersistedCart>,
}

impl MemoryCartStorage {
    /// Create an empty in-memory store.
    #[must_use]
    pub const fn new() -> Self {
        Self { slot: None }
    }
}

impl CartStorage for MemoryCartStorage {
    fn load(&self) -> Result<Option<PersistedCart>, StorageError> {
        Ok(self.slot.clone())
    }

    fn save(&mut self, cart: &PersistedCart) -> Result<(), StorageError> {
        self.slot = Some(cart.clone());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        self.slot = None;
        Ok(())
    }
}

/// JSON-file storage: one document per cart, replaced atomically enough
/// for a single-owner cart (see the concurrency model - one flow owns the
/// cart at a time).
#[derive(Debug)]
pub struct JsonFileCartStorage {
    path: PathBuf,
}

impl JsonFileCartStorage {
    /// Create a store backed by the given file path. The file is created
    /// on first save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file path.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl CartStorage for JsonFileCartStorage {
    fn load(&self) -> Result<Option<PersistedCart>, StorageError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let cart = serde_json::from_str(&raw)?;
        Ok(Some(cart))
    }

    fn save(&mut self, cart: &PersistedCart) -> Result<(), StorageError> {
        let raw = serde_json::to_vec(cart)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use quince_core::ProductId;

    fn sample_cart() -> PersistedCart {
        PersistedCart {
            items: vec![CartItem {
                product: ProductId::new("prod-1"),
                variant: None,
                title: "Ceramic Mug".to_string(),
                unit_price: "12.50".parse().unwrap(),
                quantity: 2,
                image_url: None,
            }],
            last_activity_at: Utc::now(),
        }
    }

    #[test]
    fn test_memory_storage_round_trip() {
        let mut storage = MemoryCartStorage::new();
        assert!(storage.load().unwrap().is_none());

        let cart = sample_cart();
        storage.save(&cart).unwrap();
        assert_eq!(storage.load().unwrap().unwrap(), cart);

        storage.clear().unwrap();
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_file_storage_round_trip() {
        let path = std::env::temp_dir().join(format!("quince-cart-{}.json", std::process::id()));
        let mut storage = JsonFileCartStorage::new(&path);

        // Missing file reads as "no cart", not an error
        let _ = storage.clear();
        assert!(storage.load().unwrap().is_none());

        let cart = sample_cart();
        storage.save(&cart).unwrap();
        assert_eq!(storage.load().unwrap().unwrap(), cart);

        storage.clear().unwrap();
        assert!(storage.load().unwrap().is_none());
        // Clearing an already-missing file is fine
        storage.clear().unwrap();
    }

    #[test]
    fn test_file_storage_corrupt_document_errors() {
        let path = std::env::temp_dir().join(format!(
            "quince-cart-corrupt-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, b"not json").unwrap();
        let storage = JsonFileCartStorage::new(&path);
        assert!(matches!(storage.load(), Err(StorageError::Serde(_))));
        std::fs::remove_file(&path).unwrap();
    }
}
