//! Table storage
//!
//! Reads and writes the flat table as CSV (or JSON for output). Cells read
//! from CSV are typed the way a spreadsheet would type them.

use crate::config::TableConfig;
use dbc_table_codec::{Cell, Field, TabularRow};
use std::io::{Read, Write};

/// Errors from reading or writing tables
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read positional rows from CSV
pub fn read_csv<R: Read>(reader: R, config: &TableConfig) -> Result<Vec<Vec<Cell>>, TableError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(config.has_header)
        .delimiter(config.delimiter as u8)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        rows.push(record.iter().map(Cell::parse).collect());
    }

    log::debug!("Read {} table rows", rows.len());
    Ok(rows)
}

/// Write rows as CSV with a header row in canonical column order
pub fn write_csv<W: Write>(writer: W, rows: &[TabularRow], config: &TableConfig) -> Result<(), TableError> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(config.delimiter as u8)
        .from_writer(writer);

    if config.has_header {
        csv_writer.write_record(Field::headers())?;
    }
    for row in rows {
        let cells = row.to_cells(&Field::ALL);
        csv_writer.write_record(cells.iter().map(|cell| cell.to_string()))?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Write rows as a JSON array of objects keyed by column header
pub fn write_json<W: Write>(writer: W, rows: &[TabularRow]) -> Result<(), TableError> {
    let records: Vec<serde_json::Map<String, serde_json::Value>> = rows
        .iter()
        .map(|row| {
            row.iter()
                .filter(|(_, cell)| !cell.is_blank())
                .map(|(field, cell)| {
                    serde_json::to_value(cell).map(|value| (field.header().to_string(), value))
                })
                .collect::<Result<_, serde_json::Error>>()
        })
        .collect::<Result<_, _>>()?;

    serde_json::to_writer_pretty(writer, &records)?;
    Ok(())
}
