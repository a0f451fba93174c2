//! Append-only CSV results table.

pub mod schema;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use self::schema::{Metric, ResultRow, Scenario, StoredRow, Value, HEADER};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("results table {} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Handle to the results table. Rows are only ever appended.
#[derive(Debug, Clone)]
pub struct ResultLog {
    path: PathBuf,
}

impl ResultLog {
    /// Open (or create) the table, writing the header only if the file is new
    /// or empty. Existing rows are never touched.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let io_err = |source| StorageError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let needs_header = match std::fs::metadata(&path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(io_err(e)),
        };

        let log = Self { path };
        if needs_header {
            log.write_record(&HEADER)?;
            info!(path = %log.path.display(), "created results table");
        }
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row stamped with the current time and return it.
    pub fn append(
        &self,
        scenario: Scenario,
        metric: Metric,
        value: Value,
    ) -> Result<ResultRow, StorageError> {
        let row = ResultRow::now(scenario, metric, value);
        self.append_row(&row)?;
        Ok(row)
    }

    /// Append a raw value, normalising anything that is not a finite number
    /// or a known status to the missing-value marker.
    pub fn append_raw(
        &self,
        scenario: Scenario,
        metric: Metric,
        raw: &str,
    ) -> Result<ResultRow, StorageError> {
        let value = Value::parse_lenient(raw);
        if value.is_missing() {
            warn!(%scenario, %metric, raw, "value is not numeric, recording as missing");
        }
        self.append(scenario, metric, value)
    }

    pub fn append_row(&self, row: &ResultRow) -> Result<(), StorageError> {
        if row.value.is_missing() {
            debug!(scenario = %row.scenario, metric = %row.metric, "recording missing value");
        }
        info!(
            scenario = %row.scenario,
            metric = %row.metric,
            value = %row.value,
            "logging result"
        );
        self.write_record(&row.to_record())
    }

    /// Encode the record in memory and hand it to the file in a single write.
    fn write_record<I, T>(&self, record: I) -> Result<(), StorageError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut encoder = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        encoder.write_record(record)?;
        let bytes = encoder.into_inner().map_err(|e| StorageError::Io {
            path: self.path.clone(),
            source: std::io::Error::other(e.to_string()),
        })?;

        let io_err = |source| StorageError::Io {
            path: self.path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        file.write_all(&bytes).map_err(io_err)?;
        file.flush().map_err(io_err)?;
        Ok(())
    }
}

/// Read every row of the table. Rows that do not fit the layout are skipped.
pub fn read_rows(path: &Path) -> Result<Vec<StoredRow>, StorageError> {
    if !path.exists() {
        return Err(StorageError::NotFound(path.to_path_buf()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut rows = Vec::new();
    for (index, record) in reader.deserialize::<StoredRow>().enumerate() {
        match record {
            Ok(row) => rows.push(row),
            Err(e) => warn!(row = index + 1, error = %e, "skipping unreadable row"),
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::{Status, MISSING_MARKER};

    fn lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");

        let log = ResultLog::open(&path).unwrap();
        log.append(Scenario::Baseline, Metric::Latency, Value::Number(12.5))
            .unwrap();
        drop(log);

        let log = ResultLog::open(&path).unwrap();
        log.append(Scenario::Baseline, Metric::Jitter, Value::Number(2.5))
            .unwrap();

        let lines = lines(&path);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Timestamp,Scenario,Metric,Value");
        assert!(lines[1].ends_with(",baseline,latency,12.5"));
        assert!(lines[2].ends_with(",baseline,jitter,2.5"));
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("results.csv");
        ResultLog::open(&path).unwrap();
        assert_eq!(lines(&path), vec!["Timestamp,Scenario,Metric,Value"]);
    }

    #[test]
    fn test_non_numeric_value_becomes_marker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let log = ResultLog::open(&path).unwrap();

        let row = log
            .append_raw(Scenario::Baseline, Metric::Latency, "abc")
            .unwrap();
        assert_eq!(row.value, Value::Missing);

        let rows = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, MISSING_MARKER);
        assert_eq!(rows[0].numeric(), None);
    }

    #[test]
    fn test_status_values_are_persisted_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let log = ResultLog::open(&path).unwrap();

        log.append(
            Scenario::FileTransfer,
            Metric::FileTransferUpload,
            Value::Status(Status::Completed),
        )
        .unwrap();
        log.append_raw(Scenario::FileTransfer, Metric::FileTransferDownload, "Failed")
            .unwrap();
        log.append(
            Scenario::Baseline,
            Metric::ThroughputTcp,
            Value::Number(f64::NAN),
        )
        .unwrap();

        let values: Vec<String> = read_rows(&path)
            .unwrap()
            .into_iter()
            .map(|row| row.value)
            .collect();
        assert_eq!(values, ["Completed", "Failed", "nan"]);
    }

    #[test]
    fn test_timestamp_column_is_parseable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let log = ResultLog::open(&path).unwrap();
        log.append(Scenario::HighLatency, Metric::Latency, Value::Number(110.2))
            .unwrap();

        let rows = read_rows(&path).unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(
            &rows[0].timestamp,
            schema::TIMESTAMP_FORMAT
        )
        .is_ok());
    }

    #[test]
    fn test_read_skips_short_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        std::fs::write(
            &path,
            "Timestamp,Scenario,Metric,Value\n\
             2026-01-01 00:00:00.000000,baseline,latency,12.5\n\
             garbage\n\
             2026-01-01 00:00:01.000000,baseline,jitter,2.5\n",
        )
        .unwrap();

        let rows = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].metric, "jitter");
    }

    #[test]
    fn test_read_missing_table() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_rows(&dir.path().join("absent.csv")),
            Err(StorageError::NotFound(_))
        ));
    }
}
