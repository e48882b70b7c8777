//! API data transfer objects.
//!
//! These types mirror the JSON the crew backend serves. Field names
//! follow the wire format; where the dashboard uses a different name
//! the serde attribute carries the wire one.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Miner identifier, stable across polls.
///
/// Displayed in hex (`0x1f`) everywhere an operator sees it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct MinerId(pub u32);

impl fmt::Display for MinerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl FromStr for MinerId {
    type Err = std::num::ParseIntError;

    /// Accepts `0x`-prefixed hex or plain decimal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u32::from_str_radix(hex, 16).map(MinerId),
            None => s.parse().map(MinerId),
        }
    }
}

/// Convergence state reported for a miner.
///
/// Only `same` and `updating` carry meaning for classification. Any
/// other value (`add`, `del`, `change`, or a link state such as `sync`)
/// is kept verbatim because it names how a pending delta is drawn.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum MinerState {
    /// The outstanding delta is empty.
    Same,
    /// A remote update is in flight.
    Updating,
    Other(String),
}

impl MinerState {
    pub fn as_str(&self) -> &str {
        match self {
            MinerState::Same => "same",
            MinerState::Updating => "updating",
            MinerState::Other(s) => s,
        }
    }
}

impl From<String> for MinerState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "same" => MinerState::Same,
            "updating" => MinerState::Updating,
            _ => MinerState::Other(s),
        }
    }
}

impl From<MinerState> for String {
    fn from(state: MinerState) -> Self {
        match state {
            MinerState::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

/// Restart marker. The backend sends a reason string; older backends
/// send a plain boolean.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Restart {
    Flag(bool),
    Reason(String),
}

impl Restart {
    pub fn is_required(&self) -> bool {
        match self {
            Restart::Flag(required) => *required,
            Restart::Reason(_) => true,
        }
    }
}

/// One miner as listed by `GET /miners`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct MinerRecord {
    pub id: MinerId,
    pub name: Option<String>,
    pub ipv4: Option<String>,
    pub state: Option<MinerState>,
    /// Hash of the miner's current configuration, once retrieved.
    #[serde(rename = "miner_hash", alias = "config_hash")]
    pub config_hash: Option<String>,
    /// Hash of the outstanding delta; equal hashes mean identical diffs.
    pub delta_hash: Option<String>,
    pub restart: Option<Restart>,
    /// Failure message from the collection script.
    pub error: Option<String>,
    /// Unix time (seconds) the backend last heard from the miner.
    #[serde(default)]
    pub last_seen: u64,
}

impl MinerRecord {
    /// A record carrying only its id.
    pub fn new(id: MinerId) -> Self {
        Self {
            id,
            name: None,
            ipv4: None,
            state: None,
            config_hash: None,
            delta_hash: None,
            restart: None,
            error: None,
            last_seen: 0,
        }
    }

    /// Display label: the name if non-empty, else the IPv4 address, else
    /// the hex id.
    pub fn label(&self) -> String {
        match (self.name.as_deref(), self.ipv4.as_deref()) {
            (Some(name), _) if !name.is_empty() => name.to_string(),
            (_, Some(ipv4)) => ipv4.to_string(),
            _ => self.id.to_string(),
        }
    }

    pub fn restart_required(&self) -> bool {
        self.restart.as_ref().is_some_and(Restart::is_required)
    }
}

/// One changed (or, before a delta exists, one known) variable.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeltaEntry {
    pub name: String,
    pub old: Option<String>,
    pub new: Option<String>,
}

/// Per-miner detail from `GET /miner?id=`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct MinerDetail {
    #[serde(default)]
    pub id: Option<MinerId>,
    #[serde(default)]
    pub name: Option<String>,
    /// Serial numbers of the two hash boards.
    #[serde(default)]
    pub serial: [Option<String>; 2],
    #[serde(default)]
    pub delta: Vec<DeltaEntry>,
    #[serde(default)]
    pub delta_hash: Option<String>,
}

/// Outcome of a test run against the rules under test (`POST /run`).
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct RunResult {
    pub error: Option<String>,
    #[serde(default)]
    pub delta: Vec<DeltaEntry>,
}

/// Which rules file a path query refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PathKind {
    Active,
    Test,
}

impl PathKind {
    pub const ALL: [PathKind; 2] = [PathKind::Active, PathKind::Test];

    pub fn as_str(self) -> &'static str {
        match self {
            PathKind::Active => "active",
            PathKind::Test => "test",
        }
    }
}

impl fmt::Display for PathKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PathKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(PathKind::Active),
            "test" => Ok(PathKind::Test),
            other => Err(format!("unknown rules file {other:?} (expected active or test)")),
        }
    }
}
