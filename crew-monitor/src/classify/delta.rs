//! Rows of the per-miner delta view.

use crate::api_client::types::DeltaEntry;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowKind {
    /// Value the miner has and keeps.
    Unchanged,
    /// Value the miner has and will lose.
    Removed,
    /// Value the miner will get.
    Added,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeltaRow {
    /// Variable name. Omitted on the added row that directly follows the
    /// removed row of the same variable.
    pub name: Option<String>,
    pub value: String,
    pub kind: RowKind,
}

/// Expand delta entries into display rows, old value first.
///
/// A changed variable yields a Removed row with its name followed by an
/// unnamed Added row. A variable only gained yields a named Added row.
pub fn delta_rows(delta: &[DeltaEntry]) -> Vec<DeltaRow> {
    let mut rows = Vec::with_capacity(delta.len());

    for entry in delta {
        let changed = entry.old != entry.new;

        if let Some(old) = &entry.old {
            rows.push(DeltaRow {
                name: Some(entry.name.clone()),
                value: old.clone(),
                kind: if changed { RowKind::Removed } else { RowKind::Unchanged },
            });
        }

        if let Some(new) = entry.new.as_ref().filter(|_| changed) {
            rows.push(DeltaRow {
                name: entry.old.is_none().then(|| entry.name.clone()),
                value: new.clone(),
                kind: RowKind::Added,
            });
        }
    }

    rows
}

/// `first/second` board serials, `-` for an empty or unknown half, or
/// nothing when both are unknown.
pub fn format_serial(serial: &[Option<String>; 2]) -> Option<String> {
    if serial.iter().all(Option::is_none) {
        return None;
    }

    let half = |s: &Option<String>| match s.as_deref() {
        None | Some("") => "-".to_string(),
        Some(s) => s.to_string(),
    };
    Some(format!("{}/{}", half(&serial[0]), half(&serial[1])))
}
