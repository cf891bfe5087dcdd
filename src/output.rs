//! Output rendering: the abstract sink peripheral commands write through, plus the one concrete
//! renderer this crate ships (`TextOutputSink`).
//!
//! Out of scope per spec.md §1 beyond this single default — HTML/CSV/JSON/Gantt renderers are
//! additional `OutputSink` implementations a caller can supply. Grounded on the CLI teacher's
//! `fmt.rs`: a running max-width `Sizing` computed once per render, status text colorized by
//! sentiment, written to STDERR.

use colored::{ColoredString, Colorize};

use crate::status::StatusSentiment;

/// A single row's worth of already-stringified fields, in column order.
pub type Row = Vec<String>;

/// A display-ready document: a title, a header, and zero or more rows, built incrementally.
#[derive(Clone, Debug, Default)]
pub struct Document {
    pub title: Option<String>,
    pub header: Vec<String>,
    pub rows: Vec<Row>,
}

impl Document {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn header(mut self, header: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.header = header.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn row(mut self, row: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.rows.push(row.into_iter().map(Into::into).collect());
        self
    }

    /// The widest value (including the header) in each column, for fixed-width alignment.
    #[must_use]
    pub fn column_widths(&self) -> Vec<usize> {
        let columns = self.header.len().max(self.rows.iter().map(Vec::len).max().unwrap_or(0));
        (0..columns)
            .map(|col| {
                let header_width = self.header.get(col).map_or(0, String::len);
                let row_width = self.rows.iter().filter_map(|row| row.get(col)).map(String::len).max().unwrap_or(0);
                header_width.max(row_width)
            })
            .collect()
    }
}

/// A status label paired with the sentiment used to colorize it.
#[derive(Clone, Debug)]
pub struct StatusCell {
    pub label: String,
    pub sentiment: StatusSentiment,
}

/// The rendering port peripheral commands write through.
pub trait OutputSink {
    fn render(&self, document: &Document);

    /// Render a single status-colored line, e.g. for event-by-event streaming output.
    fn render_status_line(&self, fields: &[&str], status: &StatusCell, reason: Option<&str>);
}

/// The default renderer: plain-text tables to STDERR, colorized by status sentiment, following
/// the CLI teacher's `fmt::print_events` layout.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextOutputSink {
    pub color: bool,
}

impl TextOutputSink {
    #[must_use]
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn colorize(&self, text: &str, sentiment: StatusSentiment) -> ColoredString {
        if !self.color {
            return text.normal();
        }
        match sentiment {
            StatusSentiment::Positive => text.green(),
            StatusSentiment::Neutral => text.yellow(),
            StatusSentiment::Negative => text.red(),
        }
    }
}

impl OutputSink for TextOutputSink {
    fn render(&self, document: &Document) {
        if let Some(title) = &document.title {
            eprintln!("{title}");
        }

        let widths = document.column_widths();
        if !document.header.is_empty() {
            eprintln!("{}", pad_row(&document.header, &widths));
        }
        for row in &document.rows {
            eprintln!("{}", pad_row(row, &widths));
        }
        eprintln!();
    }

    fn render_status_line(&self, fields: &[&str], status: &StatusCell, reason: Option<&str>) {
        let status_text = self.colorize(&status.label, status.sentiment);
        let mut line = fields.join(" ");
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(&status_text.to_string());
        if let Some(reason) = reason.filter(|r| !r.is_empty()) {
            line.push(' ');
            line.push_str(&if self.color { reason.bright_black().to_string() } else { reason.to_string() });
        }
        eprintln!("{line}");
    }
}

fn pad_row(row: &[String], widths: &[usize]) -> String {
    row.iter()
        .enumerate()
        .map(|(i, cell)| format!("{:width$}", cell, width = widths.get(i).copied().unwrap_or(0)))
        .collect::<Vec<_>>()
        .join("  ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_widths_accounts_for_header_and_rows() {
        let document = Document::new().header(["Name", "Status"]).row(["Bucket", "CREATE_COMPLETE"]).row(["A", "OK"]);
        assert_eq!(document.column_widths(), vec!["Bucket".len(), "CREATE_COMPLETE".len()]);
    }

    #[test]
    fn render_status_line_without_color_has_no_escape_codes() {
        // Exercised for side effects (stderr write); the absence of a panic with color disabled
        // is the behavior under test, since colored::control may be globally disabled in CI.
        let sink = TextOutputSink::new(false);
        sink.render_status_line(&["Bucket"], &StatusCell { label: "CREATE_COMPLETE".to_string(), sentiment: StatusSentiment::Positive }, None);
    }
}
