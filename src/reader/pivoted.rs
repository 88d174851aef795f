/// Pivoted (POSTE_CENTRAL) export reader
///
/// A single `DATA` worksheet in long format, one observation per row:
///
/// ```text
/// date | rank | value
/// ```
///
/// The long table is pivoted into a wide table indexed by timestamp with one
/// column per identifier. A duplicate (date, identifier) pair is a format
/// error. The vintage is the latest timestamp across the whole file; each
/// station's extract is the column-subset slice over the full file index.
use calamine::{open_workbook, Data, Reader, Xlsx};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

use crate::config::ExtractionSpec;
use crate::reader::{cell_as_identifier, parse_timestamp, parse_value, ReadError};
use crate::series::{RawExtract, SeriesTable};

const DATA_SHEET: &str = "DATA";
const DATE_COLUMN: &str = "date";
const RANK_COLUMN: &str = "rank";
const VALUE_COLUMN: &str = "value";

pub fn read(path: &Path, spec: &ExtractionSpec) -> Result<BTreeMap<String, RawExtract>, ReadError> {
    let mut workbook: Xlsx<BufReader<File>> =
        open_workbook::<Xlsx<BufReader<File>>, _>(path).map_err(|e| ReadError::WorkbookOpen {
            path: path.display().to_string(),
            msg: e.to_string(),
        })?;

    let range = workbook
        .worksheet_range(DATA_SHEET)
        .map_err(|_| ReadError::SheetNotFound(DATA_SHEET.to_string()))?;

    let wide = pivot(&range)?;
    debug!(
        "pivoted {} timestamps, {} identifiers from {}",
        wide.rows.len(),
        wide.identifiers.len(),
        path.display()
    );

    let mut extracts = BTreeMap::new();
    for (entity, columns) in spec.entities() {
        // a configured identifier never seen in the file is a format error
        for column in columns {
            if !wide.identifiers.contains(column) {
                return Err(ReadError::IdentifierNotFound(column.clone()));
            }
        }

        // slice over the full file index: rows where this station has no
        // value still appear, as empty rows
        let mut table = SeriesTable::new(columns.to_vec());
        for (timestamp, cells) in &wide.rows {
            let values = columns
                .iter()
                .map(|column| cells.get(column).copied())
                .collect();
            table.insert_row(*timestamp, values);
        }

        let extract = RawExtract::new(entity, table)
            .ok_or_else(|| ReadError::EmptyTable(DATA_SHEET.to_string()))?;
        extracts.insert(entity.to_string(), extract);
    }

    Ok(extracts)
}

struct WideTable {
    /// Identifiers observed in the rank column, with or without a value.
    identifiers: BTreeSet<String>,
    rows: BTreeMap<chrono::NaiveDateTime, HashMap<String, f64>>,
}

/// Reshape the long (date, rank, value) table into a wide table keyed by
/// timestamp with one entry per identifier.
fn pivot(range: &calamine::Range<Data>) -> Result<WideTable, ReadError> {
    let date_col = locate_header(range, DATE_COLUMN)?;
    let rank_col = locate_header(range, RANK_COLUMN)?;
    let value_col = locate_header(range, VALUE_COLUMN)?;

    let mut identifiers = BTreeSet::new();
    let mut rows: BTreeMap<chrono::NaiveDateTime, HashMap<String, f64>> = BTreeMap::new();
    let mut seen: BTreeSet<(chrono::NaiveDateTime, String)> = BTreeSet::new();

    for row_idx in 1..range.height() {
        let ts_cell = range.get((row_idx, date_col)).unwrap_or(&Data::Empty);
        let timestamp = match parse_timestamp(ts_cell, row_idx)? {
            Some(ts) => ts,
            None => continue,
        };

        let rank_cell = range.get((row_idx, rank_col)).unwrap_or(&Data::Empty);
        let identifier = match cell_as_identifier(rank_cell) {
            Some(id) => id,
            None => continue,
        };

        // pivoting an ambiguous key is undefined; refuse it
        if !seen.insert((timestamp, identifier.clone())) {
            return Err(ReadError::DuplicatePivotKey {
                timestamp,
                identifier,
            });
        }
        identifiers.insert(identifier.clone());

        let value_cell = range.get((row_idx, value_col)).unwrap_or(&Data::Empty);
        let row = rows.entry(timestamp).or_default();
        if let Some(value) = parse_value(value_cell, row_idx, value_col)? {
            row.insert(identifier, value);
        }
    }

    if rows.is_empty() {
        return Err(ReadError::EmptyTable(DATA_SHEET.to_string()));
    }

    Ok(WideTable { identifiers, rows })
}

fn locate_header(range: &calamine::Range<Data>, name: &str) -> Result<usize, ReadError> {
    for col in 0..range.width() {
        if let Some(Data::String(s)) = range.get((0, col)) {
            if s.trim() == name {
                return Ok(col);
            }
        }
    }
    Err(ReadError::ColumnNotFound {
        sheet: DATA_SHEET.to_string(),
        column: name.to_string(),
    })
}
