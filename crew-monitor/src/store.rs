//! Latest miner records, keyed by id.
//!
//! The store is replaced wholesale on every successful poll; ids missing
//! from the new list simply vanish. A failed poll never touches it.

use std::collections::BTreeMap;

use crate::api_client::types::{MinerId, MinerRecord};
use crate::tracing::prelude::*;

#[derive(Clone, Debug, Default)]
pub struct MinerStore {
    miners: BTreeMap<MinerId, MinerRecord>,
}

impl MinerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole store with `records`. An empty list is valid and
    /// empties the store.
    pub fn replace(&mut self, records: impl IntoIterator<Item = MinerRecord>) -> &Self {
        let mut miners = BTreeMap::new();
        for record in records {
            if let Some(previous) = miners.insert(record.id, record) {
                warn!(miner = %previous.id, "Duplicate miner id in poll result, keeping the last");
            }
        }
        self.miners = miners;
        self
    }

    pub fn get(&self, id: MinerId) -> Option<&MinerRecord> {
        self.miners.get(&id)
    }

    pub fn contains(&self, id: MinerId) -> bool {
        self.miners.contains_key(&id)
    }

    /// Display label of `id`, if present.
    pub fn label(&self, id: MinerId) -> Option<String> {
        self.get(id).map(MinerRecord::label)
    }

    pub fn len(&self) -> usize {
        self.miners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.miners.is_empty()
    }

    /// Records in id order.
    pub fn iter(&self) -> impl Iterator<Item = &MinerRecord> {
        self.miners.values()
    }
}
