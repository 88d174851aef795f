/// Reconciliation engine: folds each station's ledger into one series
///
/// Extracts are snapshots of the same underlying series taken at different
/// times, dated by their vintage (latest timestamp present). Folding in
/// ascending vintage order, a newer extract's present values are
/// authoritative corrections and extensions, but its gaps must not erase
/// values an older extract already reported. The result depends only on the
/// set of extracts and their vintages, never on file-listing order.
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::series::{EntityLedger, SeriesTable};

/// Fold every station's ledger, ascending by vintage, into its reconciled
/// series. Ledgers are read-only; reconciling twice yields identical output.
pub fn reconcile(ledgers: &BTreeMap<String, EntityLedger>) -> BTreeMap<String, SeriesTable> {
    let mut reconciled = BTreeMap::new();

    for (entity, ledger) in ledgers {
        let mut extracts = ledger.extracts();
        let Some(first) = extracts.next() else {
            continue;
        };

        // seed with the oldest extract, then overlay newer vintages on top
        let mut accumulator = first.series.clone();
        for extract in extracts {
            accumulator.overlay(&extract.series);
        }

        debug!(
            "station {}: {} extracts reconciled into {} rows",
            entity,
            ledger.len(),
            accumulator.len()
        );
        reconciled.insert(entity.clone(), accumulator);
    }

    info!("reconciled {} stations", reconciled.len());
    reconciled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::RawExtract;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::collections::BTreeSet;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn extract(rows: &[(u32, Option<f64>)]) -> RawExtract {
        let mut table = SeriesTable::new(vec!["debit".into()]);
        for (day, value) in rows {
            table.insert_row(ts(*day), vec![*value]);
        }
        RawExtract::new("Cesse", table).unwrap()
    }

    fn ledger_of(extracts: Vec<RawExtract>) -> BTreeMap<String, EntityLedger> {
        let mut ledger = EntityLedger::new();
        for ex in extracts {
            ledger.insert(ex).unwrap();
        }
        let mut map = BTreeMap::new();
        map.insert("Cesse".to_string(), ledger);
        map
    }

    #[test]
    fn cesse_end_to_end_scenario() {
        // extract X, vintage 2025-01-10
        let x = extract(&[(8, Some(5.0)), (9, Some(5.2)), (10, Some(5.4))]);
        // extract Y, vintage 2025-01-12, overlapping on the 10th
        let y = extract(&[(10, Some(5.5)), (11, Some(5.6)), (12, Some(5.7))]);

        let result = reconcile(&ledger_of(vec![x, y]));
        let series = &result["Cesse"];

        let expected = [
            (8, 5.0),
            (9, 5.2),
            (10, 5.5), // overwritten by the newer vintage
            (11, 5.6),
            (12, 5.7),
        ];
        assert_eq!(series.len(), expected.len());
        for (day, value) in expected {
            assert_eq!(series.cell(ts(day), "debit"), Some(value), "day {day}");
        }
    }

    #[test]
    fn index_is_union_of_all_extracts() {
        let a = extract(&[(1, Some(1.0)), (5, Some(2.0))]);
        let b = extract(&[(3, Some(3.0)), (9, Some(4.0))]);
        let c = extract(&[(2, Some(5.0)), (12, Some(6.0))]);

        let ledgers = ledger_of(vec![a, b, c]);
        let mut expected: BTreeSet<NaiveDateTime> = BTreeSet::new();
        for ledger in ledgers.values() {
            for ex in ledger.extracts() {
                expected.extend(ex.series.timestamps());
            }
        }

        let result = reconcile(&ledgers);
        let actual: BTreeSet<NaiveDateTime> = result["Cesse"].timestamps().collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn newer_gap_preserves_older_value() {
        let older = extract(&[(8, Some(5.0)), (9, Some(5.2))]);
        // newer vintage covers the 9th but reports no value there
        let newer = extract(&[(9, None), (10, Some(5.4))]);

        let result = reconcile(&ledger_of(vec![older, newer]));
        let series = &result["Cesse"];
        assert_eq!(series.cell(ts(9), "debit"), Some(5.2));
        assert_eq!(series.cell(ts(10), "debit"), Some(5.4));
    }

    #[test]
    fn greatest_vintage_wins_on_shared_timestamps() {
        let v1 = extract(&[(5, Some(1.0)), (6, Some(1.1))]);
        let v2 = extract(&[(5, Some(2.0)), (7, Some(2.1))]);
        let v3 = extract(&[(5, Some(3.0)), (8, Some(3.1))]);

        let result = reconcile(&ledger_of(vec![v3, v1, v2]));
        assert_eq!(result["Cesse"].cell(ts(5), "debit"), Some(3.0));
    }

    #[test]
    fn reconcile_is_idempotent() {
        let ledgers = ledger_of(vec![
            extract(&[(8, Some(5.0)), (10, Some(5.4))]),
            extract(&[(10, Some(5.5)), (12, Some(5.7))]),
        ]);

        let first = reconcile(&ledgers);
        let second = reconcile(&ledgers);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_ledger_produces_no_series() {
        let mut map = BTreeMap::new();
        map.insert("Cesse".to_string(), EntityLedger::new());
        assert!(reconcile(&map).is_empty());
    }
}
