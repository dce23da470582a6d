//! Result Presenter - console table for query results

use crate::error::{CsvqlError, Result};
use crate::storage::{cell_to_string, RowStream};
use comfy_table::{presets, Attribute, Cell, Color, Table};
use std::io::Write;

/// Renders the whole stream as an aligned table on `out`.
///
/// Rows are drained before anything is written, so a failed read leaves
/// `out` untouched. Returns the number of rows rendered.
pub fn print_result(rows: &mut dyn RowStream, out: &mut dyn Write) -> Result<usize> {
    let header: Vec<Cell> = rows
        .columns()
        .iter()
        .map(|column| {
            Cell::new(column)
                .fg(Color::Green)
                .add_attribute(Attribute::Underlined)
        })
        .collect();

    let mut body = Vec::new();
    while let Some(row) = rows.next_row().map_err(read_failure)? {
        let cells: Vec<Cell> = row
            .iter()
            .enumerate()
            .map(|(idx, value)| {
                let cell = Cell::new(cell_to_string(value));
                if idx == 0 {
                    cell.fg(Color::Yellow)
                } else {
                    cell
                }
            })
            .collect();
        body.push(cells);
    }

    let mut table = Table::new();
    table.load_preset(presets::NOTHING).set_header(header);
    let total = body.len();
    for cells in body {
        table.add_row(cells);
    }

    writeln!(out, "{}", table)?;
    out.flush()?;
    Ok(total)
}

fn read_failure(e: CsvqlError) -> CsvqlError {
    match e {
        CsvqlError::RowRead(_) => e,
        other => CsvqlError::RowRead(other.to_string()),
    }
}
