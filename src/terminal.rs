//! text rendering of a view for `watch` and `record`

use crate::render::{StatusSink, StatusView, COLUMNS, NO_DATA};

use std::io::{self, Write};
use std::sync::Mutex;
use tabled::builder::Builder;
use tabled::settings::object::{Cell, Rows};
use tabled::settings::{Alignment, Span, Style};

pub fn render_table(view: &StatusView) -> String {
    let mut builder = Builder::default();
    builder.push_record(COLUMNS);

    if view.is_empty() {
        builder.push_record([NO_DATA, "", "", "", ""]);
    } else {
        for row in &view.rows {
            builder.push_record(row.cells());
        }
    }

    let mut table = builder.build();
    table.with(Style::modern_rounded());
    if view.is_empty() {
        table.modify(Cell::new(1, 0), Span::column(COLUMNS.len() as _));
        table.modify(Rows::new(1..), Alignment::center());
    }
    table.to_string()
}

pub fn render_summary(view: &StatusView) -> String {
    let mut out = format!("Last status: {}", view.last.status);
    if !view.last.date.is_empty() {
        out.push_str(&format!(" ({})", view.last.date));
    }
    out.push_str(&format!("\nRows: {}", view.count));
    out
}

/// prints every published view to stdout
#[derive(Debug, Default)]
pub struct TerminalSink {
    // keeps output of overlapping refreshes from interleaving
    out: Mutex<()>,
}

impl TerminalSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusSink for TerminalSink {
    fn publish(&self, _ticket: u64, view: StatusView) {
        let _guard = self.out.lock();
        let mut stdout = io::stdout().lock();
        let stamp = chrono::Local::now().format("%H:%M:%S");
        if let Err(e) = writeln!(
            stdout,
            "\n[{stamp}] {}\n{}",
            render_summary(&view),
            render_table(&view)
        ) {
            tracing::debug!("stdout write failed: {e}");
        }
    }
}
