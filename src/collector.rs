/// Collector: builds the per-station ledger of extracts
///
/// Scans the matched export files, invokes the source reader, and folds each
/// (station, extract) pair into that station's ledger. A second extract
/// carrying a vintage the ledger already holds is dropped whole with a
/// diagnostic; it is never merged partially. Reader errors abort the run.
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::ExtractionSpec;
use crate::reader::{ReadError, SourceFormat};
use crate::series::{EntityLedger, RawExtract};

pub struct Collector<'a> {
    spec: &'a ExtractionSpec,
    format: SourceFormat,
    ledgers: BTreeMap<String, EntityLedger>,
}

impl<'a> Collector<'a> {
    pub fn new(spec: &'a ExtractionSpec, format: SourceFormat) -> Self {
        Self {
            spec,
            format,
            ledgers: BTreeMap::new(),
        }
    }

    /// Read one export file and fold its extracts into the ledgers.
    /// Any reader error propagates unchanged and aborts the run.
    pub fn ingest_file(&mut self, path: &Path) -> Result<(), ReadError> {
        info!("reading file {}", path.display());
        let extracts = self.format.read(path, self.spec)?;
        self.absorb(&path.display().to_string(), extracts);
        Ok(())
    }

    /// Fold already-read extracts into the ledgers. `source` only labels the
    /// duplicate-vintage diagnostic; it does not affect the result.
    pub fn absorb(&mut self, source: &str, extracts: BTreeMap<String, RawExtract>) {
        for (entity, extract) in extracts {
            let vintage = extract.vintage;
            let ledger = self.ledgers.entry(entity.clone()).or_default();
            match ledger.insert(extract) {
                Ok(()) => {
                    debug!("station {}: recorded extract with vintage {}", entity, vintage);
                }
                Err(vintage) => {
                    warn!(
                        "station {}: file {} skipped, duplicate vintage {}",
                        entity, source, vintage
                    );
                }
            }
        }
    }

    /// Hand the completed ledgers to the reconciliation engine.
    pub fn into_ledgers(self) -> BTreeMap<String, EntityLedger> {
        self.ledgers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::SeriesTable;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn extract(entity: &str, rows: &[(u32, f64)]) -> RawExtract {
        let mut table = SeriesTable::new(vec!["debit".into()]);
        for (day, value) in rows {
            table.insert_row(ts(*day), vec![Some(*value)]);
        }
        RawExtract::new(entity, table).unwrap()
    }

    fn spec() -> ExtractionSpec {
        ExtractionSpec::parse("Cesse : debit").unwrap()
    }

    #[test]
    fn absorb_creates_ledger_per_station() {
        let spec = spec();
        let mut collector = Collector::new(&spec, SourceFormat::Tabbed);

        let mut extracts = BTreeMap::new();
        extracts.insert("Cesse".to_string(), extract("Cesse", &[(10, 5.4)]));
        extracts.insert("Moussoulens".to_string(), extract("Moussoulens", &[(11, 2.0)]));
        collector.absorb("fichier_a.xlsx", extracts);

        let ledgers = collector.into_ledgers();
        assert_eq!(ledgers.len(), 2);
        assert_eq!(ledgers["Cesse"].len(), 1);
        assert_eq!(ledgers["Moussoulens"].len(), 1);
    }

    #[test]
    fn duplicate_vintage_keeps_first_seen() {
        let spec = spec();
        let mut collector = Collector::new(&spec, SourceFormat::Tabbed);

        let mut first = BTreeMap::new();
        first.insert("Cesse".to_string(), extract("Cesse", &[(10, 1.0)]));
        collector.absorb("fichier_a.xlsx", first);

        // same vintage, different value: dropped whole
        let mut second = BTreeMap::new();
        second.insert("Cesse".to_string(), extract("Cesse", &[(10, 2.0)]));
        collector.absorb("fichier_b.xlsx", second);

        let ledgers = collector.into_ledgers();
        let ledger = &ledgers["Cesse"];
        assert_eq!(ledger.len(), 1);
        let kept = ledger.extracts().next().unwrap();
        assert_eq!(kept.series.cell(ts(10), "debit"), Some(1.0));
    }

    #[test]
    fn file_order_does_not_change_ledgers() {
        let spec = spec();
        let batches = [
            ("a.xlsx", extract("Cesse", &[(10, 5.4)])),
            ("b.xlsx", extract("Cesse", &[(12, 5.7)])),
            ("c.xlsx", extract("Cesse", &[(11, 5.6)])),
        ];

        let mut forward = Collector::new(&spec, SourceFormat::Tabbed);
        for (source, ex) in &batches {
            let mut m = BTreeMap::new();
            m.insert("Cesse".to_string(), ex.clone());
            forward.absorb(source, m);
        }

        let mut reversed = Collector::new(&spec, SourceFormat::Tabbed);
        for (source, ex) in batches.iter().rev() {
            let mut m = BTreeMap::new();
            m.insert("Cesse".to_string(), ex.clone());
            reversed.absorb(source, m);
        }

        let a: Vec<_> = forward.into_ledgers()["Cesse"].vintages().collect();
        let b: Vec<_> = reversed.into_ledgers()["Cesse"].vintages().collect();
        assert_eq!(a, b);
        assert_eq!(a, vec![ts(10), ts(11), ts(12)]);
    }
}
