//! Append-only text log of scan results.
//!
//! Every scan batch shares one timestamp. Lines are written in the order the
//! radio reported them and the file is never truncated or rewritten.

use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::{Local, NaiveDateTime};
use tracing::debug;

use crate::model::{format_timestamp, NetworkRecord, ScanLogEntry};

pub const LOG_FILE_NAME: &str = "wifi_scan_logs.txt";

/// Result of a successful append
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistReport {
    /// true when this call created the file
    pub created: bool,
    pub lines: usize,
}

#[derive(Debug, Clone)]
pub struct ScanLogFile {
    path: PathBuf,
}

impl ScanLogFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(LOG_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the batch stamped with the current local time.
    pub fn persist(&self, records: &[NetworkRecord]) -> io::Result<PersistReport> {
        self.append(records, Local::now().naive_local())
    }

    /// Append one line per record, all stamped with `at`.
    ///
    /// Lines written before a failing write stay in the file. The handle is
    /// closed on every return path.
    pub fn append(&self, records: &[NetworkRecord], at: NaiveDateTime) -> io::Result<PersistReport> {
        let created = !self.path.exists();
        if created {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let timestamp = format_timestamp(at);
        for record in records {
            let line = ScanLogEntry::new(&timestamp, record);
            debug!(path = %self.path.display(), "writing {line}");
            writeln!(file, "{line}")?;
        }
        file.flush()?;

        Ok(PersistReport {
            created,
            lines: records.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tempfile::tempdir;

    use super::*;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn records() -> Vec<NetworkRecord> {
        vec![
            NetworkRecord::new("Home", "AA:BB:CC:DD:EE:FF".parse().unwrap(), -45),
            NetworkRecord::new("Guest", "11:22:33:44:55:66".parse().unwrap(), -71),
            NetworkRecord::new("", "DE:AD:BE:EF:CA:FE".parse().unwrap(), -88),
        ]
    }

    #[test]
    fn creates_file_and_parent() {
        let dir = tempdir().unwrap();
        let log = ScanLogFile::in_dir(&dir.path().join("nested").join("data"));

        let report = log.append(&records()[..1], noon()).unwrap();
        assert_eq!(report, PersistReport { created: true, lines: 1 });

        let contents = fs::read_to_string(log.path()).unwrap();
        assert_eq!(
            contents,
            "2024-01-01 12:00:00, SSID: Home, BSSID: AA:BB:CC:DD:EE:FF, Signal Level: -45\n"
        );
    }

    #[test]
    fn keeps_existing_content_as_prefix() {
        let dir = tempdir().unwrap();
        let log = ScanLogFile::in_dir(dir.path());
        fs::write(log.path(), "earlier line\n").unwrap();

        let report = log.append(&records(), noon()).unwrap();
        assert!(!report.created);
        assert_eq!(report.lines, 3);

        let contents = fs::read_to_string(log.path()).unwrap();
        assert!(contents.starts_with("earlier line\n"));
        let lines: Vec<_> = contents.lines().skip(1).collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("SSID: Home"));
        assert!(lines[1].contains("SSID: Guest"));
        assert!(lines[2].contains("SSID: , BSSID: DE:AD:BE:EF:CA:FE"));
    }

    #[test]
    fn batch_shares_one_timestamp() {
        let dir = tempdir().unwrap();
        let log = ScanLogFile::in_dir(dir.path());
        log.persist(&records()).unwrap();

        let contents = fs::read_to_string(log.path()).unwrap();
        let stamps: Vec<_> = contents
            .lines()
            .map(|line| line.split(", SSID:").next().unwrap())
            .collect();
        assert_eq!(stamps.len(), 3);
        assert!(stamps.iter().all(|s| *s == stamps[0]));
        assert_eq!(stamps[0].len(), "yyyy-MM-dd HH:mm:ss".len());
    }

    #[test]
    fn appending_twice_duplicates_lines() {
        let dir = tempdir().unwrap();
        let log = ScanLogFile::in_dir(dir.path());
        log.append(&records(), noon()).unwrap();
        let first = fs::read_to_string(log.path()).unwrap();
        log.append(&records(), noon()).unwrap();
        let second = fs::read_to_string(log.path()).unwrap();

        assert_eq!(second, format!("{first}{first}"));
    }

    #[test]
    fn empty_batch_appends_nothing() {
        let dir = tempdir().unwrap();
        let log = ScanLogFile::in_dir(dir.path());
        fs::write(log.path(), "x\n").unwrap();

        let report = log.append(&[], noon()).unwrap();
        assert_eq!(report.lines, 0);
        assert_eq!(fs::read_to_string(log.path()).unwrap(), "x\n");
    }

    #[test]
    fn unopenable_path_is_an_error() {
        let dir = tempdir().unwrap();
        // a directory where the file should be
        let log = ScanLogFile::new(dir.path());
        assert!(log.append(&records(), noon()).is_err());
    }
}
