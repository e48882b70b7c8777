//! Test fixtures shared by the unit tests.

use std::sync::Arc;

use parking_lot::Mutex;
use time::OffsetDateTime;

use crate::api_client::types::{MinerId, MinerRecord, MinerState, PathKind, Restart};
use crate::classify::{BucketKind, DeltaRow, MinerSummary};
use crate::dispatch::{Controls, TestOutcome};
use crate::render::{DetailView, FleetView, Renderer, TestView};

pub(crate) struct RecordBuilder(MinerRecord);

pub(crate) fn record(id: u32) -> RecordBuilder {
    RecordBuilder(MinerRecord::new(MinerId(id)))
}

impl RecordBuilder {
    pub(crate) fn name(mut self, name: &str) -> Self {
        self.0.name = Some(name.to_string());
        self
    }

    pub(crate) fn ipv4(mut self, ipv4: &str) -> Self {
        self.0.ipv4 = Some(ipv4.to_string());
        self
    }

    pub(crate) fn state(mut self, state: &str) -> Self {
        self.0.state = Some(MinerState::from(state.to_string()));
        self
    }

    pub(crate) fn config(mut self, hash: &str) -> Self {
        self.0.config_hash = Some(hash.to_string());
        self
    }

    pub(crate) fn delta(mut self, hash: &str) -> Self {
        self.0.delta_hash = Some(hash.to_string());
        self
    }

    pub(crate) fn restart(mut self, reason: &str) -> Self {
        self.0.restart = Some(Restart::Reason(reason.to_string()));
        self
    }

    pub(crate) fn error(mut self, error: &str) -> Self {
        self.0.error = Some(error.to_string());
        self
    }

    pub(crate) fn build(self) -> MinerRecord {
        self.0
    }
}

/// Owned copy of everything a renderer was asked to show.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Rendered {
    Waiting,
    Unreachable(String),
    Groups(Vec<(BucketKind, Vec<MinerId>)>),
    Selected(Option<MinerId>),
    DetailEmpty,
    Retrieving(MinerId),
    Detail {
        miner: MinerId,
        serial: Option<String>,
        script_error: Option<String>,
        rows: Vec<DeltaRow>,
    },
    DetailFailed {
        miner: MinerId,
        message: String,
    },
    Controls(Controls),
    Path(PathKind, String),
    TestRunning(MinerId),
    TestDone(TestOutcome),
    Alert(String),
    Refreshed,
}

/// Renderer that records into a shared log.
#[derive(Clone, Default)]
pub(crate) struct RecordingRenderer {
    log: Arc<Mutex<Vec<Rendered>>>,
}

impl RecordingRenderer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Everything rendered since the last call.
    pub(crate) fn take(&self) -> Vec<Rendered> {
        std::mem::take(&mut *self.log.lock())
    }

    fn push(&self, event: Rendered) {
        self.log.lock().push(event);
    }
}

impl Renderer for RecordingRenderer {
    fn fleet(&mut self, view: &FleetView<'_>) {
        self.push(match view {
            FleetView::Waiting => Rendered::Waiting,
            FleetView::Unreachable(message) => Rendered::Unreachable(message.to_string()),
            FleetView::Groups { groups, .. } => Rendered::Groups(
                groups.iter().map(|g| (g.kind, g.members.clone())).collect(),
            ),
        });
    }

    fn selected(&mut self, summary: Option<&MinerSummary>) {
        self.push(Rendered::Selected(summary.map(|s| s.id)));
    }

    fn detail(&mut self, view: &DetailView<'_>) {
        self.push(match view {
            DetailView::Empty => Rendered::DetailEmpty,
            DetailView::Retrieving(miner) => Rendered::Retrieving(*miner),
            DetailView::Loaded {
                miner,
                serial,
                script_error,
                rows,
            } => Rendered::Detail {
                miner: *miner,
                serial: serial.map(str::to_string),
                script_error: script_error.map(str::to_string),
                rows: rows.to_vec(),
            },
            DetailView::Failed { miner, message, .. } => Rendered::DetailFailed {
                miner: *miner,
                message: message.to_string(),
            },
        });
    }

    fn controls(&mut self, controls: &Controls) {
        self.push(Rendered::Controls(controls.clone()));
    }

    fn path(&mut self, kind: PathKind, path: &str) {
        self.push(Rendered::Path(kind, path.to_string()));
    }

    fn test_result(&mut self, view: &TestView<'_>) {
        self.push(match view {
            TestView::Running(miner) => Rendered::TestRunning(*miner),
            TestView::Done(outcome) => Rendered::TestDone((*outcome).clone()),
        });
    }

    fn alert(&mut self, message: &str) {
        self.push(Rendered::Alert(message.to_string()));
    }

    fn refreshed(&mut self, _at: OffsetDateTime) {
        self.push(Rendered::Refreshed);
    }
}
