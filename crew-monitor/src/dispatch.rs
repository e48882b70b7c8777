//! Operator actions: configuration updates, test runs and rules reload.
//!
//! Updates are fire-and-forget. Dispatching one disables both update
//! controls, and nothing here turns them back on: the next poll does,
//! once it sees the miner's new state.

use std::fmt;
use std::str::FromStr;

use crate::api_client::types::{MinerId, RunResult};
use crate::classify::{DeltaRow, MinerSummary, delta_rows};
use crate::error::{Error, Result};
use crate::store::MinerStore;

/// Which miners an update addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateScope {
    /// The selected miner.
    Miner,
    /// Every miner sharing the selected miner's delta.
    Group,
    /// The whole fleet.
    Fleet,
}

impl FromStr for UpdateScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "miner" | "id" => Ok(UpdateScope::Miner),
            "group" => Ok(UpdateScope::Group),
            "all" | "fleet" => Ok(UpdateScope::Fleet),
            other => Err(format!("unknown update scope {other:?} (expected miner, group or all)")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdateCommand {
    pub scope: UpdateScope,
    /// Restart the miners after pushing the configuration.
    pub restart: bool,
}

/// Concrete target, resolved against the store at dispatch time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateTarget {
    Miner(MinerId),
    Group(String),
    All,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateRequest {
    pub target: UpdateTarget,
    pub restart: bool,
}

impl UpdateRequest {
    /// Body of `POST /update`: `all`, `group=<hash>` or `id=<id>`, with
    /// `&restart` appended when requested. The backend takes the hash
    /// verbatim, so it is not percent-encoded.
    pub fn form_body(&self) -> String {
        let mut body = match &self.target {
            UpdateTarget::All => "all".to_string(),
            UpdateTarget::Group(hash) => format!("group={hash}"),
            UpdateTarget::Miner(id) => format!("id={}", id.0),
        };
        if self.restart {
            body.push_str("&restart");
        }
        body
    }
}

impl fmt::Display for UpdateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            UpdateTarget::All => f.write_str("all miners")?,
            UpdateTarget::Group(hash) => write!(f, "delta group {hash}")?,
            UpdateTarget::Miner(id) => write!(f, "miner {id}")?,
        }
        if self.restart {
            f.write_str(" with restart")?;
        }
        Ok(())
    }
}

/// Resolve `command` against the current selection and store.
///
/// The group hash is read from the store now, not from anything cached
/// when the miner was selected.
pub fn resolve(
    command: UpdateCommand,
    selected: Option<MinerId>,
    store: &MinerStore,
) -> Result<UpdateRequest> {
    let target = match command.scope {
        UpdateScope::Fleet => UpdateTarget::All,
        UpdateScope::Miner => UpdateTarget::Miner(selected.ok_or(Error::NoSelection)?),
        UpdateScope::Group => {
            let id = selected.ok_or(Error::NoSelection)?;
            let hash = store
                .get(id)
                .and_then(|record| record.delta_hash.clone())
                .ok_or(Error::NoDeltaHash(id))?;
            UpdateTarget::Group(hash)
        }
    };

    Ok(UpdateRequest {
        target,
        restart: command.restart,
    })
}

/// Caption of the restart control.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RestartCaption {
    #[default]
    UpdateAndRestart,
    Restart,
}

impl RestartCaption {
    pub fn as_str(self) -> &'static str {
        match self {
            RestartCaption::UpdateAndRestart => "Update & restart",
            RestartCaption::Restart => "Restart",
        }
    }
}

/// Enablement of the operator controls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Controls {
    pub update: bool,
    pub restart: bool,
    pub restart_caption: RestartCaption,
    /// Test run against the selected miner.
    pub test: bool,
    pub reload: bool,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            update: false,
            restart: false,
            restart_caption: RestartCaption::default(),
            test: false,
            reload: true,
        }
    }
}

impl Controls {
    /// Recompute the update controls from what the latest poll says about
    /// the selected miner. The caption only changes when restart is
    /// enabled, so a disabled control keeps its last label.
    pub fn apply_summary(&mut self, summary: Option<&MinerSummary>) {
        self.update = summary.is_some_and(|s| s.can_update);
        self.restart = summary.is_some_and(|s| s.can_restart);
        self.test = summary.is_some();
        if let Some(summary) = summary.filter(|s| s.can_restart) {
            self.restart_caption = if summary.restart_only {
                RestartCaption::Restart
            } else {
                RestartCaption::UpdateAndRestart
            };
        }
    }

    /// Both update controls go dark until the next poll.
    pub fn disable_update(&mut self) {
        self.update = false;
        self.restart = false;
    }
}

/// What a test run produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TestOutcome {
    Delta(Vec<DeltaRow>),
    /// Script error or transport failure, shown inline.
    Error(String),
}

impl TestOutcome {
    pub fn from_result(result: Result<RunResult>) -> Self {
        match result {
            Ok(RunResult {
                error: Some(error), ..
            }) => TestOutcome::Error(error),
            Ok(RunResult { error: None, delta }) => TestOutcome::Delta(delta_rows(&delta)),
            Err(e) => TestOutcome::Error(e.to_string()),
        }
    }
}

/// Operator alert for a reload outcome, if any.
pub fn reload_alert(result: Result<String>) -> Option<String> {
    match result {
        Ok(text) if text.trim().is_empty() => None,
        Ok(text) => Some(text.trim().to_string()),
        Err(e) => Some(format!("Reload failed: {e}")),
    }
}
