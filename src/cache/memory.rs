//! Process-local cache backend.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{Slot, SlotStore, SlotValue};
use crate::error::CacheError;

/// Keeps slot values in memory for the lifetime of the store.
///
/// An optional byte quota mirrors the limits of browser session storage:
/// a write that would push the total above it is refused and the previous
/// value is kept.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<Slot, SlotValue>>,
    quota_bytes: Option<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            slots: Mutex::default(),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn slots(&self) -> Result<MutexGuard<'_, HashMap<Slot, SlotValue>>, CacheError> {
        self.slots
            .lock()
            .map_err(|_| CacheError::Storage("memory store lock poisoned".to_string()))
    }
}

impl SlotStore for MemoryStore {
    fn get(&self, slot: Slot) -> Result<Option<SlotValue>, CacheError> {
        Ok(self.slots()?.get(&slot).cloned())
    }

    fn set(&self, value: SlotValue) -> Result<(), CacheError> {
        let mut slots = self.slots()?;
        let slot = value.slot();

        if let Some(quota) = self.quota_bytes {
            let others: usize = slots
                .iter()
                .filter(|(key, _)| **key != slot)
                .map(|(_, stored)| stored.byte_len())
                .sum();
            if (others + value.byte_len()) as u64 > quota {
                return Err(CacheError::QuotaExceeded);
            }
        }

        slots.insert(slot, value);
        Ok(())
    }

    fn clear(&self, slot: Slot) -> Result<(), CacheError> {
        self.slots()?.remove(&slot);
        Ok(())
    }
}
