//! ==============================================================================
//! render.rs - view model for the "last status" summary and the records table
//! ==============================================================================
//!
//! purpose:
//!     turns a newest-first list of records into what a view shows:
//!     - the last status (label + raw date) of the newest record
//!     - one row per record, missing cells replaced by a placeholder glyph
//!     - the displayed row count
//!
//!     the view model is output-agnostic. dashboard.rs turns it into html,
//!     terminal.rs into a text table.
//!
//! ==============================================================================

use crate::domain::Record;

use serde::Serialize;
use std::sync::RwLock;

/// shown for any missing value
pub const PLACEHOLDER: &str = "—";

/// text of the single row shown when there is nothing to list
pub const NO_DATA: &str = "No data";

/// id, name, status, ip, date
pub const COLUMNS: [&str; 5] = ["ID", "Name", "Status", "IP", "Date"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LastStatus {
    pub status: String,
    /// raw date string of the newest record, empty when unknown
    pub date: String,
}

impl LastStatus {
    fn of(record: Option<&Record>) -> Self {
        Self {
            status: display(record.and_then(|r| r.status.as_deref())),
            date: record.and_then(|r| r.date.clone()).unwrap_or_default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Row {
    pub id: String,
    pub name: String,
    pub status: String,
    pub ip: String,
    pub date: String,
}

impl Row {
    fn of(record: &Record) -> Self {
        Self {
            id: display(record.id.as_deref()),
            name: display(record.name.as_deref()),
            status: display(record.status.as_deref()),
            ip: display(record.ip.as_deref()),
            date: display(record.date.as_deref()),
        }
    }

    pub fn cells(&self) -> [&str; 5] {
        [&self.id, &self.name, &self.status, &self.ip, &self.date]
    }
}

/// everything a view displays
///
/// an empty `rows` means the table shows the single "no data" row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusView {
    pub last: LastStatus,
    pub rows: Vec<Row>,
    pub count: usize,
}

impl StatusView {
    /// render an already sorted and windowed list
    pub fn from_records(records: &[Record]) -> Self {
        Self {
            last: LastStatus::of(records.first()),
            rows: records.iter().map(Row::of).collect(),
            count: records.len(),
        }
    }

    pub fn empty() -> Self {
        Self::from_records(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Default for StatusView {
    fn default() -> Self {
        Self::empty()
    }
}

fn display(value: Option<&str>) -> String {
    value.unwrap_or(PLACEHOLDER).to_string()
}

/// where a refresh delivers its result
///
/// `ticket` increases with every refresh started against the sink, so a
/// sink can ignore a result that was overtaken by a newer refresh.
pub trait StatusSink: Send + Sync {
    fn publish(&self, ticket: u64, view: StatusView);
}

/// shared holder of a view's latest rendered state
#[derive(Debug, Default)]
pub struct ViewSlot {
    inner: RwLock<SlotState>,
}

#[derive(Debug, Default)]
struct SlotState {
    ticket: Option<u64>,
    view: StatusView,
    rendered_at: Option<String>,
}

impl ViewSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> StatusView {
        match self.inner.read() {
            Ok(state) => state.view.clone(),
            Err(poisoned) => poisoned.into_inner().view.clone(),
        }
    }

    /// local wall-clock time of the last accepted render
    pub fn rendered_at(&self) -> Option<String> {
        match self.inner.read() {
            Ok(state) => state.rendered_at.clone(),
            Err(poisoned) => poisoned.into_inner().rendered_at.clone(),
        }
    }
}

impl StatusSink for ViewSlot {
    fn publish(&self, ticket: u64, view: StatusView) {
        let mut state = match self.inner.write() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if state.ticket.is_some_and(|current| current > ticket) {
            tracing::debug!(ticket, "dropping superseded refresh result");
            return;
        }
        state.ticket = Some(ticket);
        state.view = view;
        state.rendered_at = Some(chrono::Local::now().format("%H:%M:%S").to_string());
    }
}
