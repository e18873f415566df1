//! Plain-text rendering of query results.

use super::QueryResult;

/// Header shown for columns the server returned without a name.
pub const UNNAMED_COLUMN: &str = "(no column name)";

/// Render a result set as an aligned text table.
///
/// Returns an empty string when the result has no columns. Trailing padding
/// is trimmed from every line.
#[must_use]
pub fn render_table(result: &QueryResult) -> String {
    if result.columns.is_empty() {
        return String::new();
    }

    let headers: Vec<&str> = result
        .columns
        .iter()
        .map(|column| {
            if column.name.is_empty() {
                UNNAMED_COLUMN
            } else {
                column.name.as_str()
            }
        })
        .collect();
    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(ToString::to_string).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut lines = Vec::with_capacity(cells.len().saturating_add(2));
    lines.push(join_padded(headers.iter().copied(), &widths));
    lines.push(
        widths
            .iter()
            .map(|w| "─".repeat(*w))
            .collect::<Vec<_>>()
            .join("─┼─"),
    );
    for row in &cells {
        lines.push(join_padded(row.iter().map(String::as_str), &widths));
    }

    lines.join("\n")
}

fn join_padded<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let line = cells
        .zip(widths)
        .map(|(cell, width)| format!("{cell:width$}"))
        .collect::<Vec<_>>()
        .join(" │ ");
    String::from(line.trim_end())
}

/// Format an integer with comma thousands separators.
#[must_use]
pub fn format_thousands(value: i64) -> String {
    let mut grouped = Vec::new();
    let mut run = 0;
    for digit in value.unsigned_abs().to_string().chars().rev() {
        if run == 3 {
            grouped.push(',');
            run = 0;
        }
        grouped.push(digit);
        run += 1;
    }
    if value < 0 {
        grouped.push('-');
    }
    grouped.iter().rev().collect()
}
