//! Completion ledger
//!
//! An append-only JSON-lines file in the output root recording every unit
//! that was fully written. A re-run consults it to skip detail pages that
//! are already on disk and to keep previously assigned filenames stable.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One completed output unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Directory segment the unit was written into
    pub directory: String,
    /// Filename assigned to the unit
    pub filename: String,
    /// Detail page the content came from
    pub url: String,
}

/// Completed units keyed by (directory, source URL)
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    completed: HashMap<(String, String), String>,
}

impl Ledger {
    pub const FILE_NAME: &'static str = ".harvest-ledger.jsonl";

    /// Ledger location for an output root
    pub fn path_in(root: &Path) -> PathBuf {
        root.join(Self::FILE_NAME)
    }

    /// Load the ledger under `root`; a missing file is an empty ledger
    pub fn open(root: &Path) -> Result<Self> {
        let path = Self::path_in(root);
        let mut completed = HashMap::new();

        if path.exists() {
            let content = fs::read_to_string(&path)?;
            for (lineno, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<LedgerEntry>(line) {
                    Ok(entry) => {
                        completed.insert((entry.directory, entry.url), entry.filename);
                    }
                    Err(e) => warn!("Skipping unreadable ledger line {}: {}", lineno + 1, e),
                }
            }
            info!("Loaded {} completed units from {:?}", completed.len(), path);
        }

        Ok(Self { path, completed })
    }

    /// Remove the ledger under `root` so the next run starts from scratch
    pub fn reset(root: &Path) -> Result<()> {
        let path = Self::path_in(root);
        if path.exists() {
            fs::remove_file(&path)?;
            info!("Removed ledger {:?}", path);
        }
        Ok(())
    }

    /// Filename recorded for `url` in `directory`, if that unit is complete
    pub fn lookup(&self, directory: &str, url: &str) -> Option<&str> {
        self.completed
            .get(&(directory.to_string(), url.to_string()))
            .map(String::as_str)
    }

    /// Append a completed unit and remember it
    pub fn record(&mut self, entry: LedgerEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;

        debug!("Recorded {}/{}", entry.directory, entry.filename);
        self.completed
            .insert((entry.directory, entry.url), entry.filename);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(dir: &str, file: &str, url: &str) -> LedgerEntry {
        LedgerEntry {
            directory: dir.to_string(),
            filename: file.to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn test_missing_ledger_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(tmp.path()).unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_records_survive_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::open(tmp.path()).unwrap();
        ledger
            .record(entry("Cardio", "Aspirin_NDC1.txt", "https://x.org/drug/1"))
            .unwrap();
        ledger
            .record(entry("Cardio", "Aspirin_NDC1-2.txt", "https://x.org/drug/2"))
            .unwrap();

        let reopened = Ledger::open(tmp.path()).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(
            reopened.lookup("Cardio", "https://x.org/drug/2"),
            Some("Aspirin_NDC1-2.txt")
        );
        assert_eq!(reopened.lookup("Renal", "https://x.org/drug/2"), None);
    }

    #[test]
    fn test_corrupt_lines_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let good = serde_json::to_string(&entry("A", "a.txt", "https://x.org/a")).unwrap();
        fs::write(Ledger::path_in(tmp.path()), format!("{}\n{{not json\n", good)).unwrap();

        let ledger = Ledger::open(tmp.path()).unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.lookup("A", "https://x.org/a"), Some("a.txt"));
    }

    #[test]
    fn test_reset_removes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::open(tmp.path()).unwrap();
        ledger.record(entry("A", "a.txt", "https://x.org/a")).unwrap();

        Ledger::reset(tmp.path()).unwrap();
        assert!(!Ledger::path_in(tmp.path()).exists());
        assert!(Ledger::open(tmp.path()).unwrap().is_empty());
    }
}
