//! Poll cycle state machine.
//!
//! [`Dashboard`] owns the miner store, the selection and the renderer,
//! and decides what to fetch next. It performs no I/O: every method
//! returns the [`Effect`]s the driver must carry out, and the driver
//! feeds completions back in. That keeps the ordering rules testable
//! without a runtime.
//!
//! # State Machine
//!
//! ```text
//!               start / select / refresh / timer / auto on
//!  Idle ────────────────────────────────────────────► FetchingList(n)
//!   ▲                                                    │   │
//!   │   list failed, or ok with nothing selected         │   │ list ok, miner selected
//!   ├────────────────────────────────────────────────────┘   ▼
//!   │                  detail done (rendered or dropped)  FetchingDetail(n)
//!   └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Every trigger opens a new cycle with a fresh [`CycleId`], abandoning
//! whatever cycle was open. Completions for an abandoned cycle are
//! dropped without touching the store or the screen. Detail results are
//! also tied to the selection epoch they were issued under and dropped if
//! the operator has since selected something else.
//!
//! When a cycle completes with auto-refresh on, the timer is armed for
//! one interval from that moment. That is the only automatic trigger;
//! there is no retry beyond the next tick.

use std::fmt;
use std::time::Duration;

use time::OffsetDateTime;

use crate::api_client::types::{MinerDetail, MinerId, MinerRecord, PathKind, RunResult};
use crate::classify::{Group, classify, delta_rows, format_serial, summarize};
use crate::config::DashboardConfig;
use crate::dispatch::{self, Controls, TestOutcome, UpdateCommand, UpdateRequest, reload_alert};
use crate::error::{Error, Result};
use crate::render::{DetailView, FleetView, Renderer, TestView};
use crate::selection::{Selection, SelectionEpoch};
use crate::store::MinerStore;
use crate::tracing::prelude::*;

/// Sequence number of a poll cycle. Later cycles compare greater.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CycleId(u64);

impl CycleId {
    fn next(self) -> Self {
        CycleId(self.0 + 1)
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifies a detail fetch: which cycle issued it, for which miner,
/// under which selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DetailTicket {
    pub cycle: CycleId,
    pub miner: MinerId,
    pub epoch: SelectionEpoch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No cycle open. `scheduled` if the auto-refresh timer is armed.
    Idle { scheduled: bool },
    FetchingList(CycleId),
    FetchingDetail(CycleId),
}

/// Work the driver must carry out on the dashboard's behalf.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    FetchList(CycleId),
    FetchDetail(DetailTicket),
    FetchPath(PathKind),
    /// Replace any pending timer with one firing after the duration.
    ArmTimer(Duration),
    CancelTimer,
    SubmitUpdate(UpdateRequest),
    RunTest(MinerId),
    Reload,
}

#[derive(Clone, Copy, Debug)]
struct OpenCycle {
    id: CycleId,
    list_done: bool,
    detail: Option<DetailTicket>,
}

#[derive(Debug, Default)]
enum PathSlot {
    #[default]
    Unknown,
    Fetching,
    Known(String),
}

pub struct Dashboard<R> {
    renderer: R,
    interval: Duration,
    auto: bool,
    store: MinerStore,
    selection: Selection,
    controls: Controls,
    groups: Vec<Group>,
    active_path: PathSlot,
    test_path: PathSlot,
    latest: CycleId,
    open: Option<OpenCycle>,
    timer_armed: bool,
    /// Newest cycle whose detail reached the screen.
    detail_rendered: Option<CycleId>,
}

impl<R: Renderer> Dashboard<R> {
    pub fn new(config: &DashboardConfig, renderer: R) -> Self {
        Self {
            renderer,
            interval: config.poll_interval,
            auto: config.auto_refresh,
            store: MinerStore::new(),
            selection: Selection::new(),
            controls: Controls::default(),
            groups: Vec::new(),
            active_path: PathSlot::Unknown,
            test_path: PathSlot::Unknown,
            latest: CycleId::default(),
            open: None,
            timer_armed: false,
            detail_rendered: None,
        }
    }

    pub fn phase(&self) -> Phase {
        match self.open {
            Some(OpenCycle {
                id,
                list_done: false,
                ..
            }) => Phase::FetchingList(id),
            Some(OpenCycle { id, .. }) => Phase::FetchingDetail(id),
            None => Phase::Idle {
                scheduled: self.timer_armed,
            },
        }
    }

    pub fn auto_refresh(&self) -> bool {
        self.auto
    }

    pub fn store(&self) -> &MinerStore {
        &self.store
    }

    pub fn selected(&self) -> Option<MinerId> {
        self.selection.selected()
    }

    /// Groups from the last successful poll.
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    /// Path of a rules file, once the backend has told us.
    pub fn path(&self, kind: PathKind) -> Option<&str> {
        match self.path_slot(kind) {
            PathSlot::Known(path) => Some(path),
            _ => None,
        }
    }

    /// Initial load.
    pub fn start(&mut self) -> Vec<Effect> {
        self.renderer.controls(&self.controls);
        self.begin_cycle("start")
    }

    pub fn refresh(&mut self) -> Vec<Effect> {
        self.begin_cycle("refresh")
    }

    /// Select `id` and poll right away so the operator gets quick
    /// feedback. Classification still runs from the fleet list only.
    pub fn select(&mut self, id: MinerId) -> Vec<Effect> {
        self.selection.select(id);
        self.renderer.detail(&DetailView::Retrieving(id));

        let summary = self.store.get(id).map(summarize);
        self.controls.apply_summary(summary.as_ref());
        self.renderer.controls(&self.controls);

        self.begin_cycle("select")
    }

    pub fn deselect(&mut self) {
        if self.selection.deselect() {
            self.clear_selection_views();
        }
    }

    pub fn set_auto_refresh(&mut self, on: bool) -> Vec<Effect> {
        self.auto = on;
        if on {
            info!(interval = ?self.interval, "Auto-refresh enabled");
            return self.begin_cycle("auto-refresh");
        }

        info!("Auto-refresh disabled");
        self.cancel_timer().into_iter().collect()
    }

    pub fn timer_fired(&mut self) -> Vec<Effect> {
        if !std::mem::take(&mut self.timer_armed) || !self.auto {
            return Vec::new();
        }
        self.begin_cycle("timer")
    }

    pub fn list_completed(
        &mut self,
        cycle: CycleId,
        result: Result<Vec<MinerRecord>>,
    ) -> Vec<Effect> {
        let Some(open) = self.open.filter(|open| open.id == cycle && !open.list_done) else {
            debug!(cycle = %cycle, latest = %self.latest, "Dropping stale miner list");
            return Vec::new();
        };

        let mut effects = Vec::new();
        let mut detail = None;

        match result {
            Ok(records) => {
                self.apply_list(records);
                effects.extend(self.unknown_paths());
                if let Some(miner) = self.selection.selected() {
                    let ticket = DetailTicket {
                        cycle,
                        miner,
                        epoch: self.selection.epoch(),
                    };
                    effects.push(Effect::FetchDetail(ticket));
                    detail = Some(ticket);
                }
            }
            Err(e) => {
                warn!(cycle = %cycle, "Miner list fetch failed: {e}");
                self.renderer.fleet(&FleetView::Unreachable(&e.to_string()));
                if self.selection.reconcile(&self.store) {
                    self.clear_selection_views();
                }
            }
        }

        self.open = Some(OpenCycle {
            list_done: true,
            detail,
            ..open
        });
        if detail.is_none() {
            effects.extend(self.finish_cycle());
        }
        effects
    }

    pub fn detail_completed(
        &mut self,
        ticket: DetailTicket,
        result: Result<MinerDetail>,
    ) -> Vec<Effect> {
        let newest = self.detail_rendered.is_none_or(|rendered| ticket.cycle > rendered);
        if newest && self.selection.is_current(ticket.miner, ticket.epoch) {
            self.render_detail(ticket, result);
            self.detail_rendered = Some(ticket.cycle);
        } else {
            debug!(
                miner = %ticket.miner,
                cycle = %ticket.cycle,
                epoch = %ticket.epoch,
                "Dropping stale miner detail"
            );
        }

        match self.open {
            Some(open) if open.detail == Some(ticket) => self.finish_cycle(),
            _ => Vec::new(),
        }
    }

    pub fn path_completed(&mut self, kind: PathKind, result: Result<String>) {
        match result {
            Ok(path) => {
                self.renderer.path(kind, &path);
                *self.path_slot_mut(kind) = PathSlot::Known(path);
            }
            Err(e) => {
                warn!(kind = %kind, "Rules path fetch failed: {e}");
                *self.path_slot_mut(kind) = PathSlot::Unknown;
            }
        }
    }

    /// Resolve and dispatch an update. Both update controls stay disabled
    /// until a later poll re-enables them, and commands arriving while
    /// they are off are rejected.
    pub fn update(&mut self, command: UpdateCommand) -> Result<Vec<Effect>> {
        let request = dispatch::resolve(command, self.selection.selected(), &self.store)?;
        let (enabled, control) = if command.restart {
            (self.controls.restart, self.controls.restart_caption.as_str())
        } else {
            (self.controls.update, "Update")
        };
        if !enabled {
            debug!(request = %request, "Update control is off, ignoring");
            return Err(Error::ControlDisabled(control));
        }
        info!(request = %request, "Dispatching update");

        self.controls.disable_update();
        self.renderer.controls(&self.controls);
        Ok(vec![Effect::SubmitUpdate(request)])
    }

    pub fn update_submitted(&mut self, request: UpdateRequest, result: Result<()>) {
        match result {
            Ok(()) => debug!(request = %request, "Update accepted"),
            Err(e) => {
                warn!(request = %request, "Update failed: {e}");
                self.renderer.alert(&format!("Update of {request} failed: {e}"));
            }
        }
    }

    pub fn run_test(&mut self) -> Result<Vec<Effect>> {
        let id = self.selection.selected().ok_or(Error::NoSelection)?;
        debug!(miner = %id, "Running rules under test");
        self.renderer.test_result(&TestView::Running(id));
        Ok(vec![Effect::RunTest(id)])
    }

    pub fn test_completed(&mut self, id: MinerId, result: Result<RunResult>) {
        let outcome = TestOutcome::from_result(result);
        if let TestOutcome::Error(error) = &outcome {
            debug!(miner = %id, "Test run reported: {error}");
        }
        self.renderer.test_result(&TestView::Done(&outcome));
    }

    pub fn reload(&mut self) -> Vec<Effect> {
        if !self.controls.reload {
            debug!("Reload already in flight");
            return Vec::new();
        }
        self.controls.reload = false;
        self.renderer.controls(&self.controls);
        vec![Effect::Reload]
    }

    pub fn reload_completed(&mut self, result: Result<String>) {
        self.controls.reload = true;
        self.renderer.controls(&self.controls);
        match reload_alert(result) {
            Some(alert) => {
                warn!("Reload: {alert}");
                self.renderer.alert(&alert);
            }
            None => info!("Active rules reloaded"),
        }
    }

    #[cfg(test)]
    pub(crate) fn renderer(&self) -> &R {
        &self.renderer
    }

    fn begin_cycle(&mut self, trigger: &'static str) -> Vec<Effect> {
        let mut effects: Vec<Effect> = self.cancel_timer().into_iter().collect();

        self.latest = self.latest.next();
        if let Some(abandoned) = self.open.replace(OpenCycle {
            id: self.latest,
            list_done: false,
            detail: None,
        }) {
            debug!(cycle = %abandoned.id, "Abandoning open poll cycle");
        }

        debug!(cycle = %self.latest, trigger, "Starting poll cycle");
        effects.push(Effect::FetchList(self.latest));
        effects
    }

    fn finish_cycle(&mut self) -> Vec<Effect> {
        let Some(open) = self.open.take() else {
            return Vec::new();
        };
        trace!(cycle = %open.id, "Poll cycle complete");

        if self.auto && !self.timer_armed {
            self.timer_armed = true;
            return vec![Effect::ArmTimer(self.interval)];
        }
        Vec::new()
    }

    fn cancel_timer(&mut self) -> Option<Effect> {
        std::mem::take(&mut self.timer_armed).then_some(Effect::CancelTimer)
    }

    fn apply_list(&mut self, records: Vec<MinerRecord>) {
        self.store.replace(records);

        if self.selection.reconcile(&self.store) {
            self.renderer.detail(&DetailView::Empty);
        }

        self.groups = classify(self.store.iter());
        if self.store.is_empty() {
            self.renderer.fleet(&FleetView::Waiting);
        } else {
            self.renderer.fleet(&FleetView::Groups {
                groups: &self.groups,
                store: &self.store,
            });
        }

        let summary = self
            .selection
            .selected()
            .and_then(|id| self.store.get(id))
            .map(summarize);
        self.renderer.selected(summary.as_ref());
        self.controls.apply_summary(summary.as_ref());
        self.renderer.controls(&self.controls);

        if !self.store.is_empty() {
            self.renderer.refreshed(OffsetDateTime::now_utc());
        }
        debug!(
            miners = self.store.len(),
            groups = self.groups.len(),
            "Miner list applied"
        );
    }

    fn render_detail(&mut self, ticket: DetailTicket, result: Result<MinerDetail>) {
        let script_error = self
            .store
            .get(ticket.miner)
            .and_then(|record| record.error.as_deref());

        match result {
            Ok(detail) => {
                let rows = delta_rows(&detail.delta);
                let serial = format_serial(&detail.serial);
                self.renderer.detail(&DetailView::Loaded {
                    miner: ticket.miner,
                    serial: serial.as_deref(),
                    script_error,
                    rows: &rows,
                });
            }
            Err(e) => {
                warn!(miner = %ticket.miner, "Miner detail fetch failed: {e}");
                let message = e.to_string();
                self.renderer.detail(&DetailView::Failed {
                    miner: ticket.miner,
                    script_error,
                    message: &message,
                });
            }
        }
    }

    fn clear_selection_views(&mut self) {
        self.renderer.selected(None);
        self.renderer.detail(&DetailView::Empty);
        self.controls.apply_summary(None);
        self.renderer.controls(&self.controls);
    }

    fn unknown_paths(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        for kind in PathKind::ALL {
            let slot = self.path_slot_mut(kind);
            if matches!(slot, PathSlot::Unknown) {
                *slot = PathSlot::Fetching;
                effects.push(Effect::FetchPath(kind));
            }
        }
        effects
    }

    fn path_slot(&self, kind: PathKind) -> &PathSlot {
        match kind {
            PathKind::Active => &self.active_path,
            PathKind::Test => &self.test_path,
        }
    }

    fn path_slot_mut(&mut self, kind: PathKind) -> &mut PathSlot {
        match kind {
            PathKind::Active => &mut self.active_path,
            PathKind::Test => &mut self.test_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::*;
    use crate::api_client::types::DeltaEntry;
    use crate::classify::BucketKind;
    use crate::dispatch::{UpdateScope, UpdateTarget};
    use crate::testing::{RecordingRenderer, Rendered, record};

    const INTERVAL: Duration = Duration::from_secs(10);

    fn dashboard(auto: bool) -> Dashboard<RecordingRenderer> {
        let config = DashboardConfig {
            auto_refresh: auto,
            poll_interval: INTERVAL,
            ..DashboardConfig::default()
        };
        Dashboard::new(&config, RecordingRenderer::new())
    }

    fn unavailable() -> Error {
        Error::Status {
            url: "http://crew/miners".into(),
            status: StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn fleet() -> Vec<MinerRecord> {
        vec![
            record(1).name("rig1").delta("h1").state("change").build(),
            record(2).name("rig2").delta("h1").state("change").build(),
            record(3).error("timeout").build(),
        ]
    }

    fn detail(serial: &str) -> MinerDetail {
        MinerDetail {
            serial: [Some(serial.to_string()), None],
            delta: vec![DeltaEntry {
                name: "pool".into(),
                old: Some("p1".into()),
                new: Some("p2".into()),
            }],
            ..MinerDetail::default()
        }
    }

    fn list_cycle(effects: &[Effect]) -> CycleId {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::FetchList(cycle) => Some(*cycle),
                _ => None,
            })
            .expect("cycle should fetch the list")
    }

    fn detail_ticket(effects: &[Effect]) -> DetailTicket {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::FetchDetail(ticket) => Some(*ticket),
                _ => None,
            })
            .expect("cycle should fetch detail")
    }

    fn details(rendered: &[Rendered]) -> Vec<&Rendered> {
        rendered
            .iter()
            .filter(|r| matches!(r, Rendered::Detail { .. } | Rendered::DetailFailed { .. }))
            .collect()
    }

    #[test]
    fn start_fetches_list() {
        let mut dash = dashboard(false);
        let effects = dash.start();
        assert_eq!(effects, vec![Effect::FetchList(CycleId(1))]);
        assert_eq!(dash.phase(), Phase::FetchingList(CycleId(1)));
    }

    #[test]
    fn list_is_classified_and_rendered() {
        let mut dash = dashboard(false);
        let cycle = list_cycle(&dash.start());
        dash.renderer().take();

        let effects = dash.list_completed(cycle, Ok(fleet()));

        assert_eq!(
            effects,
            vec![
                Effect::FetchPath(PathKind::Active),
                Effect::FetchPath(PathKind::Test)
            ]
        );
        assert_eq!(dash.phase(), Phase::Idle { scheduled: false });
        assert_eq!(dash.store().len(), 3);

        let rendered = dash.renderer().take();
        assert!(rendered.contains(&Rendered::Groups(vec![
            (BucketKind::Error, vec![MinerId(3)]),
            (BucketKind::DeltaPending, vec![MinerId(1), MinerId(2)]),
        ])));
        assert!(rendered.contains(&Rendered::Refreshed));
    }

    #[test]
    fn empty_list_shows_waiting_placeholder() {
        let mut dash = dashboard(false);
        let cycle = list_cycle(&dash.start());
        dash.renderer().take();

        dash.list_completed(cycle, Ok(Vec::new()));

        let rendered = dash.renderer().take();
        assert!(rendered.contains(&Rendered::Waiting));
        assert!(!rendered.contains(&Rendered::Refreshed));
        assert!(dash.groups().is_empty());
        assert!(dash.store().is_empty());
    }

    #[test]
    fn failed_list_keeps_store_and_skips_detail() {
        let mut dash = dashboard(true);
        let cycle = list_cycle(&dash.start());
        dash.list_completed(cycle, Ok(fleet()));
        dash.timer_fired();

        let cycle = list_cycle(&dash.select(MinerId(1)));
        dash.renderer().take();
        let effects = dash.list_completed(cycle, Err(unavailable()));

        assert_eq!(effects, vec![Effect::ArmTimer(INTERVAL)]);
        assert_eq!(dash.store().len(), 3);
        assert_eq!(dash.selected(), Some(MinerId(1)));
        assert_eq!(
            dash.renderer().take(),
            vec![Rendered::Unreachable(
                "http://crew/miners returned 503 Service Unavailable".into()
            )]
        );
    }

    #[test]
    fn auto_refresh_arms_timer_after_cycle_and_timer_starts_next() {
        let mut dash = dashboard(true);
        let first = list_cycle(&dash.start());
        let effects = dash.list_completed(first, Ok(Vec::new()));
        assert!(effects.contains(&Effect::ArmTimer(INTERVAL)));
        assert_eq!(dash.phase(), Phase::Idle { scheduled: true });

        let effects = dash.timer_fired();
        assert_eq!(effects, vec![Effect::FetchList(first.next())]);
        assert_eq!(dash.phase(), Phase::FetchingList(first.next()));
    }

    #[test]
    fn manual_mode_never_arms_timer() {
        let mut dash = dashboard(false);
        let cycle = list_cycle(&dash.start());
        let effects = dash.list_completed(cycle, Ok(fleet()));
        assert!(!effects.iter().any(|e| matches!(e, Effect::ArmTimer(_))));
        assert!(dash.timer_fired().is_empty());
    }

    #[test]
    fn turning_auto_off_cancels_timer_but_not_in_flight_fetch() {
        let mut dash = dashboard(true);
        let cycle = list_cycle(&dash.start());
        dash.list_completed(cycle, Ok(Vec::new()));

        assert_eq!(dash.set_auto_refresh(false), vec![Effect::CancelTimer]);
        assert_eq!(dash.phase(), Phase::Idle { scheduled: false });

        // Re-enable, then disable while the list fetch is in flight.
        let cycle = list_cycle(&dash.set_auto_refresh(true));
        assert!(dash.set_auto_refresh(false).is_empty());
        dash.renderer().take();

        let effects = dash.list_completed(cycle, Ok(fleet()));
        assert!(!effects.iter().any(|e| matches!(e, Effect::ArmTimer(_))));
        assert!(dash
            .renderer()
            .take()
            .iter()
            .any(|r| matches!(r, Rendered::Groups(_))));
    }

    #[test]
    fn enabling_auto_refresh_polls_immediately() {
        let mut dash = dashboard(false);
        let cycle = list_cycle(&dash.start());
        dash.list_completed(cycle, Ok(Vec::new()));

        let effects = dash.set_auto_refresh(true);
        assert_eq!(effects, vec![Effect::FetchList(cycle.next())]);
    }

    #[test]
    fn select_cancels_pending_timer_and_polls_now() {
        let mut dash = dashboard(true);
        let cycle = list_cycle(&dash.start());
        dash.list_completed(cycle, Ok(fleet()));
        dash.renderer().take();

        let effects = dash.select(MinerId(2));
        assert_eq!(
            effects,
            vec![Effect::CancelTimer, Effect::FetchList(cycle.next())]
        );
        assert_eq!(
            dash.renderer().take(),
            vec![
                Rendered::Retrieving(MinerId(2)),
                Rendered::Controls(dash.controls().clone())
            ]
        );
        assert!(dash.controls().update && dash.controls().test);
    }

    #[test]
    fn selected_miner_gets_detail_after_list() {
        let mut dash = dashboard(true);
        dash.start();
        let cycle = list_cycle(&dash.select(MinerId(1)));

        let effects = dash.list_completed(cycle, Ok(fleet()));
        let ticket = detail_ticket(&effects);
        assert_eq!(ticket.miner, MinerId(1));
        assert_eq!(dash.phase(), Phase::FetchingDetail(cycle));
        assert!(!effects.iter().any(|e| matches!(e, Effect::ArmTimer(_))));

        dash.renderer().take();
        let effects = dash.detail_completed(ticket, Ok(detail("A1")));
        assert_eq!(effects, vec![Effect::ArmTimer(INTERVAL)]);

        let rendered = dash.renderer().take();
        assert_eq!(
            details(&rendered),
            vec![&Rendered::Detail {
                miner: MinerId(1),
                serial: Some("A1/-".into()),
                script_error: None,
                rows: delta_rows(&detail("A1").delta),
            }]
        );
    }

    #[test]
    fn detail_for_previous_selection_is_dropped() {
        let mut dash = dashboard(false);
        dash.start();

        let cycle_a = list_cycle(&dash.select(MinerId(1)));
        let ticket_a = detail_ticket(&dash.list_completed(cycle_a, Ok(fleet())));

        let cycle_b = list_cycle(&dash.select(MinerId(2)));
        let ticket_b = detail_ticket(&dash.list_completed(cycle_b, Ok(fleet())));
        dash.renderer().take();

        dash.detail_completed(ticket_b, Ok(detail("B")));
        dash.detail_completed(ticket_a, Ok(detail("A")));

        let rendered = dash.renderer().take();
        let shown = details(&rendered);
        assert_eq!(shown.len(), 1);
        assert!(matches!(
            shown[0],
            Rendered::Detail { miner: MinerId(2), serial: Some(s), .. } if s == "B/-"
        ));
    }

    #[test]
    fn detail_arriving_after_reselect_but_before_new_list_is_dropped() {
        let mut dash = dashboard(false);
        dash.start();

        let cycle_a = list_cycle(&dash.select(MinerId(1)));
        let ticket_a = detail_ticket(&dash.list_completed(cycle_a, Ok(fleet())));

        dash.select(MinerId(2));
        dash.renderer().take();
        dash.detail_completed(ticket_a, Ok(detail("A")));

        assert!(details(&dash.renderer().take()).is_empty());
        assert!(matches!(dash.phase(), Phase::FetchingList(_)));
    }

    #[test]
    fn stale_list_does_not_clobber_newer_cycle() {
        let mut dash = dashboard(false);
        let old = list_cycle(&dash.start());
        let new = list_cycle(&dash.refresh());

        dash.list_completed(new, Ok(fleet()));
        dash.renderer().take();

        let effects = dash.list_completed(old, Ok(Vec::new()));
        assert!(effects.is_empty());
        assert_eq!(dash.store().len(), 3);
        assert!(dash.renderer().take().is_empty());
    }

    #[test]
    fn vanished_selection_is_cleared_without_detail_fetch() {
        let mut dash = dashboard(false);
        dash.start();
        let cycle = list_cycle(&dash.select(MinerId(9)));
        dash.renderer().take();

        let effects = dash.list_completed(cycle, Ok(fleet()));

        assert_eq!(dash.selected(), None);
        assert!(!effects.iter().any(|e| matches!(e, Effect::FetchDetail(_))));
        let rendered = dash.renderer().take();
        assert!(rendered.contains(&Rendered::DetailEmpty));
        assert!(rendered.contains(&Rendered::Selected(None)));
    }

    #[test]
    fn detail_failure_is_inline_and_leaves_list_alone() {
        let mut dash = dashboard(true);
        dash.start();
        let cycle = list_cycle(&dash.select(MinerId(3)));
        let ticket = detail_ticket(&dash.list_completed(cycle, Ok(fleet())));
        dash.renderer().take();

        let effects = dash.detail_completed(ticket, Err(unavailable()));

        assert_eq!(effects, vec![Effect::ArmTimer(INTERVAL)]);
        assert_eq!(
            dash.renderer().take(),
            vec![Rendered::DetailFailed {
                miner: MinerId(3),
                message: "http://crew/miners returned 503 Service Unavailable".into(),
            }]
        );
        assert_eq!(dash.groups().len(), 2);
    }

    #[test]
    fn script_error_leads_the_detail_view() {
        let mut dash = dashboard(false);
        dash.start();
        let cycle = list_cycle(&dash.select(MinerId(3)));
        let ticket = detail_ticket(&dash.list_completed(cycle, Ok(fleet())));
        dash.renderer().take();

        dash.detail_completed(ticket, Ok(MinerDetail::default()));

        assert!(matches!(
            &dash.renderer().take()[..],
            [Rendered::Detail { script_error: Some(e), .. }] if e == "timeout"
        ));
    }

    #[test]
    fn group_update_disables_controls_until_next_poll() {
        let mut dash = dashboard(false);
        dash.start();
        let cycle = list_cycle(&dash.select(MinerId(1)));
        let ticket = detail_ticket(&dash.list_completed(cycle, Ok(fleet())));
        dash.detail_completed(ticket, Ok(detail("A")));
        assert!(dash.controls().update && dash.controls().restart);

        let effects = dash
            .update(UpdateCommand {
                scope: UpdateScope::Group,
                restart: false,
            })
            .unwrap();
        let [Effect::SubmitUpdate(request)] = &effects[..] else {
            panic!("expected one update, got {effects:?}");
        };
        assert_eq!(request.target, UpdateTarget::Group("h1".into()));
        assert_eq!(request.form_body(), "group=h1");
        assert!(!dash.controls().update && !dash.controls().restart);

        dash.update_submitted(request.clone(), Ok(()));
        assert!(!dash.controls().update);

        let cycle = list_cycle(&dash.refresh());
        dash.list_completed(cycle, Ok(fleet()));
        assert!(dash.controls().update && dash.controls().restart);
    }

    #[test]
    fn second_update_while_first_in_flight_is_rejected() {
        let mut dash = dashboard(false);
        dash.start();
        let cycle = list_cycle(&dash.select(MinerId(1)));
        dash.list_completed(cycle, Ok(fleet()));

        let miner = UpdateCommand {
            scope: UpdateScope::Miner,
            restart: false,
        };
        assert!(matches!(
            &dash.update(miner).unwrap()[..],
            [Effect::SubmitUpdate(_)]
        ));

        dash.renderer().take();
        assert!(matches!(
            dash.update(miner),
            Err(Error::ControlDisabled("Update"))
        ));
        assert!(matches!(
            dash.update(UpdateCommand {
                restart: true,
                ..miner
            }),
            Err(Error::ControlDisabled("Update & restart"))
        ));
        assert!(dash.renderer().take().is_empty());
    }

    #[test]
    fn in_sync_miner_accepts_neither_update_nor_restart() {
        let mut dash = dashboard(false);
        dash.start();
        let cycle = list_cycle(&dash.select(MinerId(4)));
        dash.list_completed(cycle, Ok(vec![record(4).delta("h").state("same").build()]));
        assert!(!dash.controls().update && !dash.controls().restart);

        for restart in [false, true] {
            let result = dash.update(UpdateCommand {
                scope: UpdateScope::Miner,
                restart,
            });
            assert!(matches!(result, Err(Error::ControlDisabled(_))), "restart={restart}");
        }
    }

    #[test]
    fn restart_only_miner_accepts_restart_but_not_update() {
        let mut dash = dashboard(false);
        dash.start();
        let cycle = list_cycle(&dash.select(MinerId(4)));
        let pending_restart = record(4).delta("h").state("same").restart("firmware").build();
        dash.list_completed(cycle, Ok(vec![pending_restart]));

        let update = UpdateCommand {
            scope: UpdateScope::Miner,
            restart: false,
        };
        assert!(matches!(
            dash.update(update),
            Err(Error::ControlDisabled("Update"))
        ));

        let effects = dash
            .update(UpdateCommand {
                restart: true,
                ..update
            })
            .unwrap();
        assert_eq!(
            effects,
            vec![Effect::SubmitUpdate(UpdateRequest {
                target: UpdateTarget::Miner(MinerId(4)),
                restart: true,
            })]
        );
    }

    #[test]
    fn selecting_another_miner_recomputes_controls_at_once() {
        let mut dash = dashboard(false);
        dash.start();
        let cycle = list_cycle(&dash.select(MinerId(1)));
        dash.list_completed(cycle, Ok(fleet()));
        assert!(dash.controls().update);

        dash.select(MinerId(9));
        assert!(!dash.controls().update && !dash.controls().restart);
        assert!(matches!(
            dash.update(UpdateCommand {
                scope: UpdateScope::Miner,
                restart: false,
            }),
            Err(Error::ControlDisabled(_))
        ));
    }

    #[test]
    fn unknown_selection_dropped_when_list_fails() {
        let mut dash = dashboard(false);
        let cycle = list_cycle(&dash.start());
        dash.list_completed(cycle, Ok(fleet()));

        let cycle = list_cycle(&dash.select(MinerId(9)));
        dash.renderer().take();
        dash.list_completed(cycle, Err(unavailable()));

        assert_eq!(dash.selected(), None);
        assert_eq!(dash.store().len(), 3);
        let rendered = dash.renderer().take();
        assert!(rendered.contains(&Rendered::Selected(None)));
        assert!(rendered.contains(&Rendered::DetailEmpty));
        assert!(matches!(dash.run_test(), Err(Error::NoSelection)));
    }

    #[test]
    fn known_selection_survives_failed_list() {
        let mut dash = dashboard(false);
        let cycle = list_cycle(&dash.start());
        dash.list_completed(cycle, Ok(fleet()));

        let cycle = list_cycle(&dash.select(MinerId(2)));
        dash.list_completed(cycle, Err(unavailable()));

        assert_eq!(dash.selected(), Some(MinerId(2)));
    }

    #[test]
    fn update_without_selection_is_rejected() {
        let mut dash = dashboard(false);
        let result = dash.update(UpdateCommand {
            scope: UpdateScope::Miner,
            restart: true,
        });
        assert!(matches!(result, Err(Error::NoSelection)));
        assert!(dash.renderer().take().is_empty());
    }

    #[test]
    fn failed_update_alerts_operator() {
        let mut dash = dashboard(false);
        let request = UpdateRequest {
            target: UpdateTarget::All,
            restart: true,
        };
        dash.update_submitted(request, Err(unavailable()));
        assert!(matches!(
            &dash.renderer().take()[..],
            [Rendered::Alert(message)] if message.starts_with("Update of all miners with restart failed")
        ));
    }

    #[test]
    fn test_run_renders_inline_result() {
        let mut dash = dashboard(false);
        assert!(matches!(dash.run_test(), Err(Error::NoSelection)));

        dash.start();
        let cycle = list_cycle(&dash.select(MinerId(1)));
        dash.list_completed(cycle, Ok(fleet()));
        dash.renderer().take();

        assert_eq!(dash.run_test().unwrap(), vec![Effect::RunTest(MinerId(1))]);
        dash.test_completed(
            MinerId(1),
            Ok(RunResult {
                error: Some("Wait for more miner data".into()),
                delta: Vec::new(),
            }),
        );

        assert_eq!(
            dash.renderer().take(),
            vec![
                Rendered::TestRunning(MinerId(1)),
                Rendered::TestDone(TestOutcome::Error("Wait for more miner data".into())),
            ]
        );
    }

    #[test]
    fn reload_is_single_flight_and_alerts_on_message() {
        let mut dash = dashboard(false);
        assert_eq!(dash.reload(), vec![Effect::Reload]);
        assert!(dash.reload().is_empty());

        dash.renderer().take();
        dash.reload_completed(Ok("rules.lua:3: syntax error\n".into()));
        assert!(dash.controls().reload);
        assert!(dash
            .renderer()
            .take()
            .contains(&Rendered::Alert("rules.lua:3: syntax error".into())));

        assert_eq!(dash.reload(), vec![Effect::Reload]);
        dash.renderer().take();
        dash.reload_completed(Ok(String::new()));
        assert!(!dash
            .renderer()
            .take()
            .iter()
            .any(|r| matches!(r, Rendered::Alert(_))));
    }

    #[test]
    fn rules_paths_fetched_until_known() {
        let mut dash = dashboard(false);
        let cycle = list_cycle(&dash.start());
        let effects = dash.list_completed(cycle, Ok(fleet()));
        assert_eq!(
            effects,
            vec![
                Effect::FetchPath(PathKind::Active),
                Effect::FetchPath(PathKind::Test)
            ]
        );

        dash.path_completed(PathKind::Active, Ok("/srv/active/rules.lua".into()));
        dash.path_completed(PathKind::Test, Err(unavailable()));
        assert_eq!(dash.path(PathKind::Active), Some("/srv/active/rules.lua"));
        assert_eq!(dash.path(PathKind::Test), None);

        let cycle = list_cycle(&dash.refresh());
        let effects = dash.list_completed(cycle, Ok(fleet()));
        assert_eq!(effects, vec![Effect::FetchPath(PathKind::Test)]);
    }

    #[test]
    fn deselect_clears_selection_views() {
        let mut dash = dashboard(false);
        dash.start();
        dash.select(MinerId(1));
        dash.renderer().take();

        dash.deselect();
        assert_eq!(dash.selected(), None);
        let rendered = dash.renderer().take();
        assert_eq!(rendered[0], Rendered::Selected(None));
        assert_eq!(rendered[1], Rendered::DetailEmpty);

        dash.deselect();
        assert!(dash.renderer().take().is_empty());
    }
}
