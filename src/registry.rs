// Shared-resource registry
//
// Lets many independent pipeline owners reference one logically shared
// trainable unit, identified by a description string. Training contributions
// are buffered per identifier and the shared unit is trained exactly once,
// when the last outstanding reference submits its contribution. All
// bookkeeping lives behind a single registry-wide lock.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::ContractError;
use crate::factory::UnitFactory;
use crate::sample::{Sample, SampleCollection};
use crate::unit::TrainableUnit;

/// Configuration surface for shared-unit acquisition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedUnitConfig {
    /// Description string identifying the shared unit
    #[serde(default = "default_identifier")]
    pub identifier: String,
}

fn default_identifier() -> String {
    "Identity".to_string()
}

impl Default for SharedUnitConfig {
    fn default() -> Self {
        Self {
            identifier: default_identifier(),
        }
    }
}

/// Handle returned by `acquire`, carrying the identifier and whether this
/// owner created the entry (single-writer persistence gating).
#[derive(Debug, Clone)]
pub struct SharedHandle {
    identifier: String,
    is_owner: bool,
}

impl SharedHandle {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Whether this handle's owner created the entry and may persist it
    pub fn is_owner(&self) -> bool {
        self.is_owner
    }
}

struct RegistryEntry {
    unit: Box<dyn TrainableUnit>,
    refs: usize,
    pending: SampleCollection,
}

/// Keyed registry of shared trainable units with reference-counted training
///
/// Entries live for the registry's lifetime; a generation ends when the
/// reference count drops to zero and the pending contributions are flushed
/// into one training call, after which the entry can be acquired again.
pub struct SharedResourceRegistry {
    factory: UnitFactory,
    entries: Mutex<HashMap<String, RegistryEntry>>,
}

impl SharedResourceRegistry {
    /// Registry constructing shared units through `factory`
    pub fn new(factory: UnitFactory) -> Self {
        Self {
            factory,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Reference the shared unit for `identifier`, creating it on first use
    ///
    /// Increments the identifier's reference count. The returned handle
    /// records whether this call created the entry; only that owner may
    /// persist the unit.
    pub async fn acquire(&self, identifier: &str) -> Result<SharedHandle> {
        let mut entries = self.entries.lock().await;
        let is_owner = match entries.entry(identifier.to_string()) {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().refs += 1;
                false
            }
            Entry::Vacant(vacant) => {
                let unit = self
                    .factory
                    .create(identifier)
                    .with_context(|| format!("failed to construct shared unit '{identifier}'"))?;
                vacant.insert(RegistryEntry {
                    unit,
                    refs: 1,
                    pending: SampleCollection::new(),
                });
                true
            }
        };

        tracing::debug!(identifier = identifier, owner = is_owner, "acquired shared unit");

        Ok(SharedHandle {
            identifier: identifier.to_string(),
            is_owner,
        })
    }

    /// Submit one owner's training contribution
    ///
    /// Appends the contribution to the pending buffer and decrements the
    /// reference count. The call that drops the count to zero trains the
    /// shared unit with all accumulated data while still holding the
    /// registry lock, then clears the buffer. Calling more often than
    /// `acquire` is a contract violation.
    pub async fn train(&self, handle: &SharedHandle, contribution: SampleCollection) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .get_mut(&handle.identifier)
            .ok_or_else(|| ContractError::UnknownUnit {
                name: handle.identifier.clone(),
            })?;

        if entry.refs == 0 {
            return Err(ContractError::RefCountUnderflow {
                identifier: handle.identifier.clone(),
            }
            .into());
        }

        entry.pending.extend(contribution);
        entry.refs -= 1;
        if entry.refs > 0 {
            return Ok(());
        }

        let pending = std::mem::take(&mut entry.pending);
        tracing::info!(
            identifier = %handle.identifier,
            samples = pending.len(),
            "last contribution received, training shared unit"
        );

        // Deliberately trained under the lock: the flush must not interleave
        // with a concurrent acquire or train for this generation.
        entry
            .unit
            .train(pending)
            .await
            .with_context(|| format!("shared unit '{}' training failed", handle.identifier))
    }

    /// Delegate inference to the shared unit
    ///
    /// Assumes training has quiesced; concurrent projection during an
    /// in-flight train is a caller precondition.
    pub async fn project(&self, handle: &SharedHandle, sample: &Sample) -> Result<Sample> {
        let entries = self.entries.lock().await;
        let entry = entries
            .get(&handle.identifier)
            .ok_or_else(|| ContractError::UnknownUnit {
                name: handle.identifier.clone(),
            })?;
        entry.unit.project(sample)
    }

    /// Persist the shared unit's state
    ///
    /// Single-writer: only the handle that created the entry writes; for any
    /// other handle this is a no-op, so concurrent owners never produce
    /// duplicate or conflicting blobs.
    pub async fn serialize(&self, handle: &SharedHandle, out: &mut Vec<u8>) -> Result<()> {
        if !handle.is_owner {
            tracing::debug!(
                identifier = %handle.identifier,
                "skipping persistence for non-owning handle"
            );
            return Ok(());
        }
        let entries = self.entries.lock().await;
        let entry = entries
            .get(&handle.identifier)
            .ok_or_else(|| ContractError::UnknownUnit {
                name: handle.identifier.clone(),
            })?;
        entry.unit.serialize(out)
    }

    /// Restore the shared unit's state; no-op for non-owning handles
    pub async fn deserialize(&self, handle: &SharedHandle, input: &mut &[u8]) -> Result<()> {
        if !handle.is_owner {
            return Ok(());
        }
        let mut entries = self.entries.lock().await;
        let entry = entries
            .get_mut(&handle.identifier)
            .ok_or_else(|| ContractError::UnknownUnit {
                name: handle.identifier.clone(),
            })?;
        entry.unit.deserialize(input)
    }

    /// Outstanding reference count for `identifier` (zero if absent)
    pub async fn reference_count(&self, identifier: &str) -> usize {
        let entries = self.entries.lock().await;
        entries.get(identifier).map_or(0, |entry| entry.refs)
    }
}
