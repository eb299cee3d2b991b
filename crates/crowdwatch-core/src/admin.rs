//! Administrator-facing capacity and count mutations.
//!
//! [`CapacityAdminMutator`] is a thin validating façade in front of
//! [`ZoneStateStore::create`] and [`ZoneStateStore::apply_admin_edit`].
//! It rejects non-positive capacities and negative counts locally --
//! before any lock is taken or any network round-trip is attempted -- so
//! bad input fails fast with a validation error.

use std::sync::Arc;

use crowdwatch_types::{Zone, ZoneId};
use tokio::sync::RwLock;

use crate::store::{AdminEdit, StoreError, ZoneStateStore};

/// Validating façade over the zone store for administrative callers.
///
/// Raw inputs arrive as `i64` from the API boundary; the mutator narrows
/// them to the canonical unsigned ranges or rejects them with the
/// matching validation error.
#[derive(Debug, Clone)]
pub struct CapacityAdminMutator {
    store: Arc<RwLock<ZoneStateStore>>,
}

impl CapacityAdminMutator {
    /// Create a mutator bound to the shared zone store.
    pub const fn new(store: Arc<RwLock<ZoneStateStore>>) -> Self {
        Self { store }
    }

    /// Create a new zone after local validation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] or [`StoreError::InvalidCapacity`]
    /// without touching the store if the input is out of range.
    pub async fn create_zone(&self, name: &str, capacity: i64) -> Result<Zone, StoreError> {
        if name.trim().is_empty() {
            return Err(StoreError::InvalidName);
        }
        let capacity = validate_capacity(capacity)?;
        self.store.write().await.create(name, capacity)
    }

    /// Apply a capacity and/or count edit after local validation.
    ///
    /// Both fields are validated before the store lock is taken; the
    /// store then commits the combined result atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidCapacity`] / [`StoreError::InvalidCount`]
    /// for out-of-range input, or [`StoreError::NotFound`] if the zone id
    /// is stale.
    pub async fn edit_zone(
        &self,
        id: ZoneId,
        capacity: Option<i64>,
        current_count: Option<i64>,
    ) -> Result<Zone, StoreError> {
        let edit = AdminEdit {
            capacity: capacity.map(validate_capacity).transpose()?,
            current_count: current_count.map(validate_count).transpose()?,
        };
        self.store.write().await.apply_admin_edit(id, edit)
    }
}

/// Narrow a raw capacity to the canonical range.
fn validate_capacity(value: i64) -> Result<u32, StoreError> {
    if value <= 0 {
        return Err(StoreError::InvalidCapacity { value });
    }
    u32::try_from(value).map_err(|_| StoreError::InvalidCapacity { value })
}

/// Narrow a raw count to the canonical range. Counts above capacity are
/// valid -- that is the critical signal -- so only the sign is checked.
fn validate_count(value: i64) -> Result<u32, StoreError> {
    if value < 0 {
        return Err(StoreError::InvalidCount { value });
    }
    u32::try_from(value).map_err(|_| StoreError::InvalidCount { value })
}
