/// Output sink: one `;`-delimited file per station
///
/// File names are derived from the station name (`export_<station>_.csv`).
/// The first column is the ascending timestamp under a `date` header; the
/// remaining columns are the station's configured fields. Missing cells are
/// written as empty fields. The output directory is created on demand.
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::series::SeriesTable;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to write output file: {0}")]
    Write(#[from] csv::Error),
}

pub fn output_path(out_dir: &Path, entity: &str) -> PathBuf {
    out_dir.join(format!("export_{entity}_.csv"))
}

/// Write one station's reconciled series, one row per timestamp ascending.
pub fn write_series(out_dir: &Path, entity: &str, series: &SeriesTable) -> Result<(), SinkError> {
    if !out_dir.exists() {
        info!("creating missing output directory {}", out_dir.display());
        std::fs::create_dir_all(out_dir).map_err(|source| SinkError::CreateDir {
            path: out_dir.display().to_string(),
            source,
        })?;
    }

    let path = output_path(out_dir, entity);
    info!("writing {}", path.display());

    let mut writer = csv::WriterBuilder::new().delimiter(b';').from_path(&path)?;

    let mut header = Vec::with_capacity(series.columns().len() + 1);
    header.push("date".to_string());
    header.extend(series.columns().iter().cloned());
    writer.write_record(&header)?;

    for (timestamp, values) in series.rows() {
        let mut record = Vec::with_capacity(values.len() + 1);
        record.push(timestamp.format(TIMESTAMP_FORMAT).to_string());
        for value in values {
            record.push(value.map(|v| v.to_string()).unwrap_or_default());
        }
        writer.write_record(&record)?;
    }

    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}
