// Source readers for station export files
//
// Two Excel layouts exist in the field:
// - Tabbed (SALLELES): one worksheet per station, wide format
// - Pivoted (POSTE_CENTRAL): one long-format DATA worksheet shared by all
//   stations, pivoted into wide tables per station
//
// Both resolve to the same capability: read one file against the extraction
// spec and hand back a vintage-stamped table per station.

pub mod pivoted;
pub mod tabbed;

use calamine::Data;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::config::ExtractionSpec;
use crate::series::RawExtract;

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("failed to open workbook {path}: {msg}")]
    WorkbookOpen { path: String, msg: String },

    #[error("sheet not found: {0}")]
    SheetNotFound(String),

    #[error("column '{column}' not found in sheet '{sheet}'")]
    ColumnNotFound { sheet: String, column: String },

    #[error("identifier '{0}' not present in pivoted data")]
    IdentifierNotFound(String),

    #[error("invalid timestamp at row {row}: {value}")]
    InvalidTimestamp { row: usize, value: String },

    #[error("invalid value at row {row}, col {col}: {msg}")]
    InvalidValue { row: usize, col: usize, msg: String },

    #[error("duplicate entry for timestamp {timestamp} and identifier '{identifier}'")]
    DuplicatePivotKey {
        timestamp: NaiveDateTime,
        identifier: String,
    },

    #[error("no data rows in sheet '{0}'")]
    EmptyTable(String),
}

/// Source file layout, selected once at startup from validated configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// SALLELES exports: one worksheet per station.
    Tabbed,
    /// POSTE_CENTRAL exports: one long-format DATA worksheet, pivoted.
    Pivoted,
}

impl SourceFormat {
    /// Read one export file, returning a vintage-stamped extract per station
    /// named in the spec. Any missing sheet, column or identifier is an
    /// error; nothing is recovered locally.
    pub fn read(
        &self,
        path: &Path,
        spec: &ExtractionSpec,
    ) -> Result<BTreeMap<String, RawExtract>, ReadError> {
        match self {
            SourceFormat::Tabbed => tabbed::read(path, spec),
            SourceFormat::Pivoted => pivoted::read(path, spec),
        }
    }
}

/// Convert an Excel date serial to a datetime, fractional part as time of day.
fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    // Excel epoch: 1899-12-30 (adjusted for Excel's off-by-one bug)
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let days = serial.floor();
    let seconds = ((serial - days) * 86_400.0).round() as i64;
    let date = epoch.checked_add_signed(Duration::days(days as i64))?;
    date.and_hms_opt(0, 0, 0)?
        .checked_add_signed(Duration::seconds(seconds))
}

/// Parse a timestamp cell. Exports carry either native Excel datetimes,
/// date serials, or strings in `%d/%m/%Y %H:%M:%S`. Empty cells yield `None`
/// so trailing blank rows can be skipped.
pub(crate) fn parse_timestamp(cell: &Data, row: usize) -> Result<Option<NaiveDateTime>, ReadError> {
    match cell {
        Data::DateTime(excel_dt) => Ok(excel_dt.as_datetime()),
        Data::Float(f) => Ok(excel_serial_to_datetime(*f)),
        Data::Int(i) => Ok(excel_serial_to_datetime(*i as f64)),
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            parse_timestamp_str(trimmed)
                .map(Some)
                .ok_or_else(|| ReadError::InvalidTimestamp {
                    row,
                    value: s.clone(),
                })
        }
        Data::Empty => Ok(None),
        other => Err(ReadError::InvalidTimestamp {
            row,
            value: format!("{other:?}"),
        }),
    }
}

fn parse_timestamp_str(s: &str) -> Option<NaiveDateTime> {
    const DATETIME_FORMATS: [&str; 2] = ["%d/%m/%Y %H:%M:%S", "%Y-%m-%d %H:%M:%S"];
    const DATE_FORMATS: [&str; 2] = ["%d/%m/%Y", "%Y-%m-%d"];

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Parse a measurement cell. Empty and `n/a`-style cells are missing values,
/// not errors; decimal commas are accepted.
pub(crate) fn parse_value(cell: &Data, row: usize, col: usize) -> Result<Option<f64>, ReadError> {
    match cell {
        Data::Float(f) => Ok(Some(*f)),
        Data::Int(i) => Ok(Some(*i as f64)),
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("n/a") {
                return Ok(None);
            }
            trimmed
                .parse::<f64>()
                .or_else(|_| trimmed.replace(',', ".").parse::<f64>())
                .map(Some)
                .map_err(|_| ReadError::InvalidValue {
                    row,
                    col,
                    msg: format!("cannot parse value: {s}"),
                })
        }
        Data::Empty => Ok(None),
        other => Err(ReadError::InvalidValue {
            row,
            col,
            msg: format!("expected number, got: {other:?}"),
        }),
    }
}

/// Render a cell as an identifier string (pivoted `rank` column).
pub(crate) fn cell_as_identifier(cell: &Data) -> Option<String> {
    match cell {
        Data::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(format!("{f:.0}")),
        _ => None,
    }
}
