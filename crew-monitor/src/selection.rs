//! The single miner under inspection.
//!
//! Every change of selection starts a new epoch. Per-miner fetches carry
//! the epoch they were issued under, so a result that arrives after the
//! operator moved on can be recognised and dropped.

use std::fmt;

use crate::api_client::types::MinerId;
use crate::store::MinerStore;
use crate::tracing::prelude::*;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SelectionEpoch(u64);

impl fmt::Display for SelectionEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Default)]
pub struct Selection {
    selected: Option<MinerId>,
    epoch: SelectionEpoch,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<MinerId> {
        self.selected
    }

    pub fn epoch(&self) -> SelectionEpoch {
        self.epoch
    }

    /// Select `id`. Re-selecting the current miner still starts a new
    /// epoch, superseding any fetch already in flight for it.
    pub fn select(&mut self, id: MinerId) -> SelectionEpoch {
        self.selected = Some(id);
        self.bump();
        debug!(miner = %id, epoch = %self.epoch, "Miner selected");
        self.epoch
    }

    /// Clear the selection. Returns false if nothing was selected.
    pub fn deselect(&mut self) -> bool {
        match self.selected.take() {
            Some(id) => {
                self.bump();
                debug!(miner = %id, epoch = %self.epoch, "Miner deselected");
                true
            }
            None => false,
        }
    }

    /// Drop the selection if its miner is no longer in `store`. Returns
    /// true if it did.
    pub fn reconcile(&mut self, store: &MinerStore) -> bool {
        match self.selected {
            Some(id) if !store.contains(id) => {
                debug!(miner = %id, "Selected miner vanished from poll");
                self.deselect()
            }
            _ => false,
        }
    }

    /// Whether a result issued for `id` under `epoch` still belongs to the
    /// current selection.
    pub fn is_current(&self, id: MinerId, epoch: SelectionEpoch) -> bool {
        self.selected == Some(id) && self.epoch == epoch
    }

    fn bump(&mut self) {
        self.epoch = SelectionEpoch(self.epoch.0 + 1);
    }
}
