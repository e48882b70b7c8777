//! Miner classification.
//!
//! [`classify`] partitions the fleet into mutually exclusive buckets
//! describing how far each miner's configuration has converged, splits
//! the hashed buckets into sub-groups of identical configuration or
//! delta, and orders everything by display label so the rendered list
//! is stable from one poll to the next.
//!
//! Placement is decided by one table, first match wins:
//!
//! | error | delta_hash | state      | restart | config_hash | bucket          |
//! |-------|------------|------------|---------|-------------|-----------------|
//! | set   |            |            |         |             | Error           |
//! |       | set        | `updating` |         |             | Updating        |
//! |       | set        | `same`     | no      |             | InSync          |
//! |       | set        | `same`     | yes     |             | RestartRequired |
//! |       | set        | other      |         |             | DeltaPending    |
//! |       |            |            |         | set         | ConfigOnly      |
//! |       |            |            |         |             | Incomplete      |

mod delta;
mod summary;

pub use delta::{DeltaRow, RowKind, delta_rows, format_serial};
pub use summary::{MinerStatus, MinerSummary, summarize};

use std::collections::BTreeMap;

use crate::api_client::types::{MinerId, MinerRecord, MinerState};

/// Render variant used for a delta sub-group whose first member has no
/// state.
const DEFAULT_DELTA_VARIANT: &str = "differs";

/// Classification bucket. Declaration order is display order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BucketKind {
    /// The collection script failed.
    Error,
    /// A configuration update is in flight.
    Updating,
    /// Still establishing contact; nothing known yet.
    Incomplete,
    /// Configuration retrieved, no delta computed yet.
    ConfigOnly,
    /// A non-empty delta is waiting to be applied.
    DeltaPending,
    /// Delta is empty but the miner must restart.
    RestartRequired,
    /// Delta is empty; nothing to do.
    InSync,
}

impl BucketKind {
    pub const ORDER: [BucketKind; 7] = [
        BucketKind::Error,
        BucketKind::Updating,
        BucketKind::Incomplete,
        BucketKind::ConfigOnly,
        BucketKind::DeltaPending,
        BucketKind::RestartRequired,
        BucketKind::InSync,
    ];

    /// Explanatory caption, shown once per bucket kind.
    pub fn caption(self) -> &'static str {
        match self {
            BucketKind::Error => "Script failed",
            BucketKind::Updating => "Updating the miner configuration",
            BucketKind::Incomplete => "Waiting for data",
            BucketKind::ConfigOnly => "Waiting for crew data (have configuration)",
            BucketKind::DeltaPending => "Configuration differs",
            BucketKind::RestartRequired => "Restart required",
            BucketKind::InSync => "No change needed",
        }
    }

    /// Render style for every group of this kind except DeltaPending,
    /// whose style comes from its members' state.
    fn style(self) -> &'static str {
        match self {
            BucketKind::Error => "error",
            BucketKind::Updating => "updating",
            BucketKind::Incomplete => "incomplete",
            BucketKind::ConfigOnly => "config",
            BucketKind::DeltaPending => DEFAULT_DELTA_VARIANT,
            BucketKind::RestartRequired => "restart",
            BucketKind::InSync => "same",
        }
    }
}

/// One rendered cluster of miners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    pub kind: BucketKind,
    /// Render style. For DeltaPending this is the state of the first
    /// member (`add`, `del`, `change`, ...).
    pub variant: String,
    /// What the members share: the error message for Error, the hash
    /// for ConfigOnly and DeltaPending, nothing for the single-list
    /// buckets.
    pub key: Option<String>,
    /// First member in label order; groups of one kind are sorted by it.
    pub sort_key: MinerId,
    /// Members in label order. Never empty.
    pub members: Vec<MinerId>,
    /// Set on the first group of each kind, which carries the caption.
    pub explained: bool,
}

impl Group {
    pub fn caption(&self) -> Option<&'static str> {
        self.explained.then(|| self.kind.caption())
    }
}

/// Where a single record lands.
#[derive(Debug, PartialEq, Eq)]
enum Placement<'a> {
    Error(&'a str),
    Updating,
    InSync,
    RestartRequired,
    Delta(&'a str),
    Config(&'a str),
    Incomplete,
}

fn place(record: &MinerRecord) -> Placement<'_> {
    match (
        record.error.as_deref(),
        record.delta_hash.as_deref(),
        record.state.as_ref(),
        record.restart_required(),
        record.config_hash.as_deref(),
    ) {
        (Some(error), ..) => Placement::Error(error),
        (None, Some(_), Some(MinerState::Updating), _, _) => Placement::Updating,
        (None, Some(_), Some(MinerState::Same), false, _) => Placement::InSync,
        (None, Some(_), Some(MinerState::Same), true, _) => Placement::RestartRequired,
        (None, Some(delta), _, _, _) => Placement::Delta(delta),
        (None, None, _, _, Some(config)) => Placement::Config(config),
        (None, None, _, _, None) => Placement::Incomplete,
    }
}

/// Members sorted by (label, id).
fn ordered(mut members: Vec<&MinerRecord>) -> Vec<&MinerRecord> {
    members.sort_by_cached_key(|record| (record.label(), record.id));
    members
}

#[derive(Default)]
struct Buckets<'a> {
    error: BTreeMap<&'a str, Vec<&'a MinerRecord>>,
    updating: Vec<&'a MinerRecord>,
    incomplete: Vec<&'a MinerRecord>,
    config: BTreeMap<&'a str, Vec<&'a MinerRecord>>,
    delta: BTreeMap<&'a str, Vec<&'a MinerRecord>>,
    restart: Vec<&'a MinerRecord>,
    same: Vec<&'a MinerRecord>,
}

/// Collects groups and hands the caption to the first of each kind.
#[derive(Default)]
struct Emitter {
    groups: Vec<Group>,
}

impl Emitter {
    fn emit(&mut self, kind: BucketKind, variant: &str, key: Option<&str>, members: &[&MinerRecord]) {
        let Some(first) = members.first() else {
            return;
        };
        let explained = !self.groups.iter().any(|g| g.kind == kind);
        self.groups.push(Group {
            kind,
            variant: variant.to_string(),
            key: key.map(str::to_string),
            sort_key: first.id,
            members: members.iter().map(|r| r.id).collect(),
            explained,
        });
    }

    /// Emit hash-keyed sub-groups ordered by their lowest label.
    fn emit_hashed<'a>(
        &mut self,
        kind: BucketKind,
        clusters: BTreeMap<&'a str, Vec<&'a MinerRecord>>,
    ) {
        let mut clusters: Vec<(&str, Vec<&MinerRecord>)> = clusters
            .into_iter()
            .map(|(hash, members)| (hash, ordered(members)))
            .collect();
        clusters.sort_by_cached_key(|(hash, members)| {
            let first = members.first().map(|r| (r.label(), r.id));
            (first, *hash)
        });

        for (hash, members) in clusters {
            let variant = match kind {
                BucketKind::DeltaPending => members
                    .first()
                    .and_then(|r| r.state.as_ref())
                    .map_or(DEFAULT_DELTA_VARIANT, MinerState::as_str),
                _ => kind.style(),
            };
            self.emit(kind, variant, Some(hash), &members);
        }
    }
}

/// Partition `records` into ordered groups.
///
/// The result depends only on the set of records, not on the order they
/// arrive in. Every record appears in exactly one group.
pub fn classify<'a>(records: impl IntoIterator<Item = &'a MinerRecord>) -> Vec<Group> {
    let mut buckets = Buckets::default();

    for record in records {
        match place(record) {
            Placement::Error(error) => buckets.error.entry(error).or_default().push(record),
            Placement::Updating => buckets.updating.push(record),
            Placement::InSync => buckets.same.push(record),
            Placement::RestartRequired => buckets.restart.push(record),
            Placement::Delta(hash) => buckets.delta.entry(hash).or_default().push(record),
            Placement::Config(hash) => buckets.config.entry(hash).or_default().push(record),
            Placement::Incomplete => buckets.incomplete.push(record),
        }
    }

    let mut out = Emitter::default();

    for (error, members) in buckets.error {
        out.emit(BucketKind::Error, BucketKind::Error.style(), Some(error), &ordered(members));
    }
    for (kind, members) in [
        (BucketKind::Updating, buckets.updating),
        (BucketKind::Incomplete, buckets.incomplete),
    ] {
        out.emit(kind, kind.style(), None, &ordered(members));
    }
    out.emit_hashed(BucketKind::ConfigOnly, buckets.config);
    out.emit_hashed(BucketKind::DeltaPending, buckets.delta);
    for (kind, members) in [
        (BucketKind::RestartRequired, buckets.restart),
        (BucketKind::InSync, buckets.same),
    ] {
        out.emit(kind, kind.style(), None, &ordered(members));
    }

    out.groups
}
