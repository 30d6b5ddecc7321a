//! Output formatting utilities for CLI commands

use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use reshelf::{Outcome, ReconciliationReport};

/// Build a table with headers and rows
pub fn build_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);

    for row in rows {
        table.add_row(row);
    }

    table
}

/// Print a table with headers and rows
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    println!("{}", build_table(headers, rows));
}

/// Per-class counts for the report summary.
pub fn summary_rows(report: &ReconciliationReport) -> Vec<Vec<String>> {
    report
        .by_class
        .iter()
        .map(|(class_tag, entries)| {
            let count = |outcome: Outcome| {
                entries
                    .iter()
                    .filter(|e| e.outcome == outcome)
                    .count()
                    .to_string()
            };
            let moved = if report.dry_run {
                count(Outcome::Planned)
            } else {
                count(Outcome::Moved)
            };
            vec![
                class_tag.to_string(),
                entries.len().to_string(),
                moved,
                count(Outcome::AlreadyCanonical),
                count(Outcome::Unmapped),
            ]
        })
        .collect()
}

/// Print the grouped report followed by a per-class summary table.
pub fn print_report(report: &ReconciliationReport) {
    print!("{}", report.render_text());

    if report.by_class.is_empty() {
        return;
    }

    println!();
    let moved_header = if report.dry_run { "Planned" } else { "Moved" };
    print_table(
        &["Class", "Total", moved_header, "In place", "No rule"],
        summary_rows(report),
    );

    let verb = if report.dry_run { "would move" } else { "moved" };
    let moved = if report.dry_run {
        report.count(Outcome::Planned)
    } else {
        report.moved_count()
    };
    println!(
        "{} item(s) {}, {} failure(s)",
        moved,
        verb,
        report.failures.len()
    );
}
