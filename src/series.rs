/// Core data model for station time series
///
/// A `SeriesTable` is a time-indexed table with named columns; rows are kept
/// in a `BTreeMap` so the timestamp index is always sorted ascending. A
/// `RawExtract` is the table read for one station from one file, stamped with
/// its vintage (the latest timestamp present in the table). An `EntityLedger`
/// accumulates one station's extracts keyed by vintage.
use chrono::NaiveDateTime;
use std::collections::BTreeMap;

/// Time-indexed table: one row per timestamp, one cell per configured column.
///
/// Missing cells are `None`. Rows are always sorted ascending by timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesTable {
    columns: Vec<String>,
    rows: BTreeMap<NaiveDateTime, Vec<Option<f64>>>,
}

impl SeriesTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: BTreeMap::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Insert a row; `values` must have one entry per column.
    /// An existing row at the same timestamp is replaced.
    pub fn insert_row(&mut self, timestamp: NaiveDateTime, mut values: Vec<Option<f64>>) {
        values.resize(self.columns.len(), None);
        self.rows.insert(timestamp, values);
    }

    pub fn cell(&self, timestamp: NaiveDateTime, column: &str) -> Option<f64> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(&timestamp).and_then(|row| row[idx])
    }

    pub fn timestamps(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        self.rows.keys().copied()
    }

    /// Rows in ascending timestamp order.
    pub fn rows(&self) -> impl Iterator<Item = (NaiveDateTime, &[Option<f64>])> {
        self.rows.iter().map(|(ts, values)| (*ts, values.as_slice()))
    }

    /// Latest timestamp in the table, i.e. the extract's vintage marker.
    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.rows.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell-wise conditional merge of a newer table into this one.
    ///
    /// The row index becomes the union of both indices. Only cells where
    /// `newer` holds a present value overwrite; a `None` cell in `newer`
    /// leaves whatever this table already had, even on a shared timestamp.
    /// Columns are aligned by name; a column of `newer` absent here is
    /// ignored.
    pub fn overlay(&mut self, newer: &SeriesTable) {
        let width = self.columns.len();
        let col_map: Vec<Option<usize>> = newer
            .columns
            .iter()
            .map(|name| self.columns.iter().position(|c| c == name))
            .collect();

        for (ts, values) in &newer.rows {
            let row = self.rows.entry(*ts).or_insert_with(|| vec![None; width]);
            for (src, target) in values.iter().zip(&col_map) {
                if let (Some(value), Some(idx)) = (src, target) {
                    row[*idx] = Some(*value);
                }
            }
        }
    }
}

/// One station's data as read from one file, stamped with its vintage.
///
/// The vintage is the maximum timestamp present in the table - a recency
/// marker for merge ordering, not the time the file was read.
#[derive(Debug, Clone)]
pub struct RawExtract {
    pub entity: String,
    pub vintage: NaiveDateTime,
    pub series: SeriesTable,
}

impl RawExtract {
    /// Build an extract from a non-empty table; the vintage is derived from
    /// the table's last timestamp. Returns `None` for an empty table.
    pub fn new(entity: impl Into<String>, series: SeriesTable) -> Option<Self> {
        let vintage = series.last_timestamp()?;
        Some(Self {
            entity: entity.into(),
            vintage,
            series,
        })
    }
}

/// All extracts collected for one station, keyed by vintage.
///
/// Vintages are unique within a ledger: a second extract sharing a vintage is
/// rejected whole (first-seen wins), never merged.
#[derive(Debug, Clone, Default)]
pub struct EntityLedger {
    extracts: BTreeMap<NaiveDateTime, RawExtract>,
}

impl EntityLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an extract under its vintage. Returns the rejected extract's
    /// vintage if that vintage is already present in the ledger.
    pub fn insert(&mut self, extract: RawExtract) -> Result<(), NaiveDateTime> {
        if self.extracts.contains_key(&extract.vintage) {
            return Err(extract.vintage);
        }
        self.extracts.insert(extract.vintage, extract);
        Ok(())
    }

    /// Extracts in ascending vintage order.
    pub fn extracts(&self) -> impl Iterator<Item = &RawExtract> {
        self.extracts.values()
    }

    pub fn vintages(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        self.extracts.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.extracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extracts.is_empty()
    }
}
