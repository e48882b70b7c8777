//! Presentation seam.
//!
//! The dashboard state machine never formats anything itself; it hands
//! structured views to a [`Renderer`]. [`TextRenderer`] is the
//! line-oriented implementation used by the `crew-monitor` binary.

use std::io::Write;

use time::OffsetDateTime;
use time::macros::format_description;

use crate::api_client::types::{MinerId, PathKind};
use crate::classify::{DeltaRow, Group, MinerSummary, RowKind};
use crate::dispatch::{Controls, TestOutcome};
use crate::store::MinerStore;
use crate::tracing::prelude::*;

/// Content of the miner list.
#[derive(Debug)]
pub enum FleetView<'a> {
    /// The backend answered with an empty list.
    Waiting,
    /// The list fetch failed; the store still holds the last good data.
    Unreachable(&'a str),
    Groups {
        groups: &'a [Group],
        store: &'a MinerStore,
    },
}

/// Content of the selected miner's delta view.
#[derive(Debug)]
pub enum DetailView<'a> {
    /// Nothing selected.
    Empty,
    /// Selected, detail fetch outstanding.
    Retrieving(MinerId),
    Loaded {
        miner: MinerId,
        serial: Option<&'a str>,
        /// Collection script error, shown above the delta.
        script_error: Option<&'a str>,
        rows: &'a [DeltaRow],
    },
    Failed {
        miner: MinerId,
        script_error: Option<&'a str>,
        message: &'a str,
    },
}

/// Content of the test result view.
#[derive(Debug)]
pub enum TestView<'a> {
    Running(MinerId),
    Done(&'a TestOutcome),
}

/// Rendering collaborator. Called only from the dashboard task.
pub trait Renderer: Send + 'static {
    fn fleet(&mut self, view: &FleetView<'_>);

    fn selected(&mut self, summary: Option<&MinerSummary>);

    fn detail(&mut self, view: &DetailView<'_>);

    fn controls(&mut self, controls: &Controls);

    fn path(&mut self, kind: PathKind, path: &str);

    fn test_result(&mut self, view: &TestView<'_>);

    /// Something the operator must acknowledge.
    fn alert(&mut self, message: &str);

    /// The list was refreshed with data at `at`.
    fn refreshed(&mut self, at: OffsetDateTime);
}

/// `YYYY-MM-DD HH:MM:SSZ` for a Unix timestamp.
pub fn format_utc(secs: u64) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]Z");
    i64::try_from(secs)
        .ok()
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .and_then(|at| at.format(format).ok())
        .unwrap_or_else(|| secs.to_string())
}

/// `YYYY-MM-DD HH:MMZ`, used for the refresh stamp.
pub fn format_utc_minutes(at: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]Z");
    let at = at.to_offset(time::UtcOffset::UTC);
    at.format(format)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

/// Plain-text renderer writing one block per update.
pub struct TextRenderer<W> {
    out: W,
}

impl<W: Write + Send + 'static> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, text: &str) {
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|()| self.out.flush()) {
            warn!("Failed to write dashboard output: {e}");
        }
    }
}

fn row_marker(kind: RowKind) -> char {
    match kind {
        RowKind::Unchanged => ' ',
        RowKind::Removed => '-',
        RowKind::Added => '+',
    }
}

fn push_rows(text: &mut String, rows: &[DeltaRow]) {
    for row in rows {
        text.push_str(&format!(
            "  {} {:<24} {}\n",
            row_marker(row.kind),
            row.name.as_deref().unwrap_or(""),
            row.value
        ));
    }
}

impl<W: Write + Send + 'static> Renderer for TextRenderer<W> {
    fn fleet(&mut self, view: &FleetView<'_>) {
        let mut text = String::from("== Miners ==\n");
        match view {
            FleetView::Waiting => text.push_str("Waiting for crew data ...\n"),
            FleetView::Unreachable(message) => text.push_str(&format!("{message}\n")),
            FleetView::Groups { groups, store } => {
                for group in groups.iter() {
                    match group.caption() {
                        Some(caption) => text.push_str(&format!("[{}] {caption}\n", group.variant)),
                        None => text.push_str(&format!("[{}]\n", group.variant)),
                    }
                    let labels: Vec<String> = group
                        .members
                        .iter()
                        .map(|id| store.label(*id).unwrap_or_else(|| id.to_string()))
                        .collect();
                    text.push_str(&format!("  {}\n", labels.join("  ")));
                }
            }
        }
        self.emit(&text);
    }

    fn selected(&mut self, summary: Option<&MinerSummary>) {
        let Some(summary) = summary else {
            self.emit("== Selected: none ==\n");
            return;
        };
        let dash = "\u{2014}";
        self.emit(&format!(
            "== Selected {} ==\n  state: {}\n  name: {}\n  ip: {}\n  last seen: {}\n",
            summary.id,
            summary.status.as_str(),
            summary.name.as_deref().unwrap_or(dash),
            summary.ipv4.as_deref().unwrap_or(dash),
            format_utc(summary.last_seen),
        ));
    }

    fn detail(&mut self, view: &DetailView<'_>) {
        let mut text = String::new();
        match view {
            DetailView::Empty => return,
            DetailView::Retrieving(miner) => {
                text.push_str(&format!("== Delta {miner} ==\nRetrieving variables ...\n"));
            }
            DetailView::Loaded {
                miner,
                serial,
                script_error,
                rows,
            } => {
                text.push_str(&format!(
                    "== Delta {miner} (serial {}) ==\n",
                    serial.unwrap_or("\u{2014}")
                ));
                if let Some(error) = script_error {
                    text.push_str(&format!("  ! {error}\n"));
                }
                push_rows(&mut text, rows);
            }
            DetailView::Failed {
                miner,
                script_error,
                message,
            } => {
                text.push_str(&format!("== Delta {miner} ==\n"));
                if let Some(error) = script_error {
                    text.push_str(&format!("  ! {error}\n"));
                }
                text.push_str(&format!("  {message}\n"));
            }
        }
        self.emit(&text);
    }

    fn controls(&mut self, controls: &Controls) {
        let flag = |on: bool| if on { "on" } else { "off" };
        self.emit(&format!(
            "-- controls: update {} / {} {} / test {} / reload {}\n",
            flag(controls.update),
            controls.restart_caption.as_str(),
            flag(controls.restart),
            flag(controls.test),
            flag(controls.reload),
        ));
    }

    fn path(&mut self, kind: PathKind, path: &str) {
        self.emit(&format!("-- {kind} rules: {}\n", path.trim()));
    }

    fn test_result(&mut self, view: &TestView<'_>) {
        let mut text = String::new();
        match view {
            TestView::Running(miner) => text.push_str(&format!("== Test {miner} ==\nRunning ...\n")),
            TestView::Done(TestOutcome::Error(error)) => {
                text.push_str(&format!("== Test result ==\n  ! {error}\n"));
            }
            TestView::Done(TestOutcome::Delta(rows)) => {
                text.push_str("== Test result ==\n");
                if rows.is_empty() {
                    text.push_str("  (no changes)\n");
                }
                push_rows(&mut text, rows);
            }
        }
        self.emit(&text);
    }

    fn alert(&mut self, message: &str) {
        self.emit(&format!("!! {message}\n"));
    }

    fn refreshed(&mut self, at: OffsetDateTime) {
        self.emit(&format!("-- last refresh {}\n", format_utc_minutes(at)));
    }
}
