// Tests for the source reader error surface that need no Excel fixture

use series_reconciler::config::ExtractionSpec;
use series_reconciler::reader::{ReadError, SourceFormat};
use std::path::Path;

#[test]
fn tabbed_reader_reports_missing_workbook() {
    let spec = ExtractionSpec::parse("Cesse : DEBIT").unwrap();
    let result = SourceFormat::Tabbed.read(Path::new("/nonexistent/export.xlsx"), &spec);

    match result.unwrap_err() {
        ReadError::WorkbookOpen { path, .. } => {
            assert_eq!(path, "/nonexistent/export.xlsx");
        }
        other => panic!("expected WorkbookOpen, got {other:?}"),
    }
}

#[test]
fn pivoted_reader_reports_missing_workbook() {
    let spec = ExtractionSpec::parse("Cesse : CESSE.DEBIT").unwrap();
    let result = SourceFormat::Pivoted.read(Path::new("/nonexistent/poste.xlsx"), &spec);

    assert!(matches!(
        result.unwrap_err(),
        ReadError::WorkbookOpen { .. }
    ));
}

#[test]
fn not_an_xlsx_file_fails_to_open() {
    let mut file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
    std::io::Write::write_all(&mut file, b"pas un classeur excel").unwrap();

    let spec = ExtractionSpec::parse("Cesse : DEBIT").unwrap();
    let result = SourceFormat::Tabbed.read(file.path(), &spec);
    assert!(matches!(
        result.unwrap_err(),
        ReadError::WorkbookOpen { .. }
    ));
}
