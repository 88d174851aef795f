/// Tabbed (SALLELES) export reader
///
/// One worksheet per station. Expected sheet structure:
///
/// ```text
/// Row 1: column headers (col A is the timestamp column)
/// Row 2: metadata row (units etc.) - skipped
/// Row 3+: timestamp | measurement values
/// ```
///
/// Only the columns configured for the station are retained; the extract's
/// vintage is the latest timestamp of the sorted table.
use calamine::{open_workbook, Data, Reader, Xlsx};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

use crate::config::ExtractionSpec;
use crate::reader::{parse_timestamp, parse_value, ReadError};
use crate::series::{RawExtract, SeriesTable};

pub fn read(path: &Path, spec: &ExtractionSpec) -> Result<BTreeMap<String, RawExtract>, ReadError> {
    let mut workbook: Xlsx<BufReader<File>> =
        open_workbook::<Xlsx<BufReader<File>>, _>(path).map_err(|e| ReadError::WorkbookOpen {
            path: path.display().to_string(),
            msg: e.to_string(),
        })?;

    let mut extracts = BTreeMap::new();

    for (entity, columns) in spec.entities() {
        let range = workbook
            .worksheet_range(entity)
            .map_err(|_| ReadError::SheetNotFound(entity.to_string()))?;

        let table = parse_sheet(&range, entity, columns)?;
        debug!(
            "read {} rows for station {} from {}",
            table.len(),
            entity,
            path.display()
        );

        // empty tables carry no vintage marker and abort the run
        let extract = RawExtract::new(entity, table)
            .ok_or_else(|| ReadError::EmptyTable(entity.to_string()))?;
        extracts.insert(entity.to_string(), extract);
    }

    Ok(extracts)
}

fn parse_sheet(
    range: &calamine::Range<Data>,
    sheet: &str,
    columns: &[String],
) -> Result<SeriesTable, ReadError> {
    // Row 1 (index 0) holds the column headers; locate each configured column
    let col_indices = locate_columns(range, sheet, columns)?;

    let mut table = SeriesTable::new(columns.to_vec());

    // Row 2 (index 1) is the metadata row - data starts at index 2
    for row_idx in 2..range.height() {
        let ts_cell = range.get((row_idx, 0)).unwrap_or(&Data::Empty);
        let timestamp = match parse_timestamp(ts_cell, row_idx)? {
            Some(ts) => ts,
            // blank timestamp: trailing padding row, skip it
            None => continue,
        };

        let mut values = Vec::with_capacity(col_indices.len());
        for &col_idx in &col_indices {
            let cell = range.get((row_idx, col_idx)).unwrap_or(&Data::Empty);
            values.push(parse_value(cell, row_idx, col_idx)?);
        }
        table.insert_row(timestamp, values);
    }

    Ok(table)
}

/// Map each configured column name to its position in the header row.
fn locate_columns(
    range: &calamine::Range<Data>,
    sheet: &str,
    columns: &[String],
) -> Result<Vec<usize>, ReadError> {
    let mut headers = Vec::with_capacity(range.width());
    for col in 0..range.width() {
        let name = match range.get((0, col)) {
            Some(Data::String(s)) => s.trim().to_string(),
            _ => String::new(),
        };
        headers.push(name);
    }

    columns
        .iter()
        .map(|wanted| {
            headers
                .iter()
                .position(|h| h == wanted)
                .ok_or_else(|| ReadError::ColumnNotFound {
                    sheet: sheet.to_string(),
                    column: wanted.clone(),
                })
        })
        .collect()
}
