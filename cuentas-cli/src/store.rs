//! Monthly CSV ledger files.

use anyhow::{Context, Result, bail};
use cuentas_core::LEDGER_HEADER;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::info;

pub trait LedgerStore {
    /// Append one row to the `MM/YYYY` partition, creating it with the
    /// header row when absent.
    fn append(&self, partition: &str, row: &[String]) -> Result<()>;
}

pub struct CsvStore {
    output_dir: PathBuf,
}

impl CsvStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// "01/2026" → `<output_dir>/01-2026.csv`
    pub fn partition_path(&self, partition: &str) -> Result<PathBuf> {
        let valid = partition.len() == 7
            && partition.as_bytes()[2] == b'/'
            && partition
                .char_indices()
                .all(|(i, c)| i == 2 || c.is_ascii_digit());
        if !valid {
            bail!("invalid partition key '{partition}', expected MM/YYYY");
        }
        Ok(self
            .output_dir
            .join(format!("{}.csv", partition.replace('/', "-"))))
    }
}

impl LedgerStore for CsvStore {
    fn append(&self, partition: &str, row: &[String]) -> Result<()> {
        if row.len() != LEDGER_HEADER.len() {
            bail!("ledger row has {} columns, expected {}", row.len(), LEDGER_HEADER.len());
        }
        let path = self.partition_path(partition)?;
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("create {}", self.output_dir.display()))?;

        let is_new = !path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open {}", path.display()))?;
        let mut w = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if is_new {
            w.write_record(LEDGER_HEADER)?;
            info!(partition, path = %path.display(), "created ledger partition");
        }
        w.write_record(row)?;
        w.flush().with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(date: &str, detail: &str) -> Vec<String> {
        vec![
            date.to_string(),
            "-4,000.00".to_string(),
            "Domicilios/restaurantes".to_string(),
            detail.to_string(),
            "11721252".to_string(),
            "COLON COSTA RICA".to_string(),
            "9282".to_string(),
        ]
    }

    #[test]
    fn test_creates_partition_with_header_then_appends() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("ledger"));
        store.append("01/2026", &row("16/01/2026 22:31:15", "LA CALI, SAN JOSE")).unwrap();
        store.append("01/2026", &row("17/01/2026 08:00:00", "SODA TICA")).unwrap();

        let path = dir.path().join("ledger/01-2026.csv");
        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), LEDGER_HEADER.to_vec());
        let records = rdr.records().map(|r| r.unwrap()).collect::<Vec<_>>();
        assert_eq!(records.len(), 2);
        assert_eq!(&records[0][3], "LA CALI, SAN JOSE");
        assert_eq!(&records[1][0], "17/01/2026 08:00:00");
    }

    #[test]
    fn test_partitions_are_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path());
        store.append("12/2025", &row("25/12/2025 14:30:00", "x")).unwrap();
        store.append("01/2026", &row("16/01/2026 22:31:15", "y")).unwrap();
        assert!(dir.path().join("12-2025.csv").exists());
        assert!(dir.path().join("01-2026.csv").exists());
    }

    #[test]
    fn test_rejects_bad_partition_and_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path());
        assert!(store.append("2026-01", &row("16/01/2026", "x")).is_err());
        assert!(store.append("../2026", &row("16/01/2026", "x")).is_err());
        assert!(store.append("01/2026", &["only".to_string()]).is_err());
    }
}
