//! Summary of the selected miner.

use crate::api_client::types::{MinerId, MinerRecord, MinerState};

/// Coarse status shown next to the selected miner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MinerStatus {
    Error,
    Updating,
    /// Delta known; the miner can be updated (or needs nothing).
    Ready,
    Incomplete,
}

impl MinerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MinerStatus::Error => "Error",
            MinerStatus::Updating => "Updating",
            MinerStatus::Ready => "Ready",
            MinerStatus::Incomplete => "Incomplete",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MinerSummary {
    pub id: MinerId,
    pub name: Option<String>,
    pub ipv4: Option<String>,
    pub status: MinerStatus,
    /// A configuration push would change something.
    pub can_update: bool,
    /// A restart (alone, or after an update) is possible.
    pub can_restart: bool,
    /// Nothing to push, only a restart pending.
    pub restart_only: bool,
    pub last_seen: u64,
}

pub fn summarize(record: &MinerRecord) -> MinerSummary {
    let mut summary = MinerSummary {
        id: record.id,
        name: record.name.clone(),
        ipv4: record.ipv4.clone(),
        status: MinerStatus::Incomplete,
        can_update: false,
        can_restart: false,
        restart_only: false,
        last_seen: record.last_seen,
    };

    if record.error.is_some() {
        summary.status = MinerStatus::Error;
    } else if record.delta_hash.is_some() {
        match &record.state {
            Some(MinerState::Updating) => summary.status = MinerStatus::Updating,
            Some(MinerState::Same) => {
                summary.status = MinerStatus::Ready;
                summary.can_restart = record.restart_required();
                summary.restart_only = summary.can_restart;
            }
            _ => {
                summary.status = MinerStatus::Ready;
                summary.can_update = true;
                summary.can_restart = true;
            }
        }
    }

    summary
}
