//! Hierarchical file store
//!
//! One directory per hierarchy root, one UTF-8 text file per output unit.
//! Writes overwrite in place; there is no atomic rename or backup.

use crate::sanitize::{self, truncate};
use crate::Result;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Location of one persisted unit, relative to the store root
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputUnit {
    /// Sanitized hierarchy-root label
    pub directory: String,
    /// Sanitized, collision-free filename
    pub filename: String,
}

impl OutputUnit {
    pub fn path(&self, root: &Path) -> PathBuf {
        root.join(&self.directory).join(&self.filename)
    }
}

/// Filenames already handed out within one directory during a run
#[derive(Debug)]
pub struct NameRegistry {
    used: HashSet<String>,
    budget: usize,
}

impl NameRegistry {
    pub fn new(budget: usize) -> Self {
        Self {
            used: HashSet::new(),
            budget,
        }
    }

    /// Mark a name as taken without changing it (e.g. a unit completed by an earlier run)
    pub fn reserve(&mut self, name: &str) {
        self.used.insert(name.to_string());
    }

    /// Claim `candidate`, or the first free `<stem>-N.<ext>` (N >= 2) if it is taken
    pub fn assign(&mut self, candidate: &str) -> String {
        if self.used.insert(candidate.to_string()) {
            return candidate.to_string();
        }

        let (stem, ext) = match candidate.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
            _ => (candidate, None),
        };
        let ext_len = ext.map(|e| e.len() + 1).unwrap_or(0);

        let mut n = 2usize;
        loop {
            let suffix = format!("-{}", n);
            let room = self.budget.saturating_sub(ext_len + suffix.len());
            let name = match ext {
                Some(ext) => format!("{}{}.{}", truncate(stem, room), suffix, ext),
                None => format!("{}{}", truncate(stem, room), suffix),
            };
            if self.used.insert(name.clone()) {
                debug!("Filename {} already used, assigned {}", candidate, name);
                return name;
            }
            n += 1;
        }
    }
}

/// Output tree rooted at a fixed directory
#[derive(Debug)]
pub struct OutputStore {
    root: PathBuf,
    budget: usize,
    registries: HashMap<String, NameRegistry>,
}

impl OutputStore {
    pub fn new(root: impl Into<PathBuf>, budget: usize) -> Self {
        Self {
            root: root.into(),
            budget,
            registries: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Directory segment for a hierarchy-root label
    pub fn directory_for(&self, label: &str) -> String {
        sanitize::sanitize(label, self.budget)
    }

    /// Registry of names used so far in `directory`
    pub fn registry(&mut self, directory: &str) -> &mut NameRegistry {
        let budget = self.budget;
        self.registries
            .entry(directory.to_string())
            .or_insert_with(|| NameRegistry::new(budget))
    }

    /// Derive a unique unit for `candidate` inside `directory`
    pub fn allocate(&mut self, directory: &str, candidate: &str) -> OutputUnit {
        let filename = self.registry(directory).assign(candidate);
        OutputUnit {
            directory: directory.to_string(),
            filename,
        }
    }

    /// Create the unit's directory if needed and write `text`, replacing any existing file
    pub fn write(&self, unit: &OutputUnit, text: &str) -> Result<PathBuf> {
        write_unit(&self.root.join(&unit.directory), &unit.filename, text)
    }
}

/// Ensure `dir` exists and write `text` to `dir/filename`
pub fn write_unit(dir: &Path, filename: &str, text: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(filename);
    fs::write(&path, text)?;
    trace!("Wrote {} bytes to {:?}", text.len(), path);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_suffixes_collisions_in_order() {
        let mut registry = NameRegistry::new(255);
        assert_eq!(registry.assign("Aspirin_NDC1.txt"), "Aspirin_NDC1.txt");
        assert_eq!(registry.assign("Aspirin_NDC1.txt"), "Aspirin_NDC1-2.txt");
        assert_eq!(registry.assign("Aspirin_NDC1.txt"), "Aspirin_NDC1-3.txt");
        assert_eq!(registry.assign("Other.txt"), "Other.txt");
    }

    #[test]
    fn test_registry_skips_reserved_names() {
        let mut registry = NameRegistry::new(255);
        registry.reserve("a.txt");
        registry.reserve("a-2.txt");
        assert_eq!(registry.assign("a.txt"), "a-3.txt");
    }

    #[test]
    fn test_registry_suffix_stays_within_budget() {
        let mut registry = NameRegistry::new(16);
        let name = "abcdefghijkl.txt";
        assert_eq!(registry.assign(name), name);
        let second = registry.assign(name);
        assert_eq!(second, "abcdefghij-2.txt");
        assert!(second.len() <= 16);
    }

    #[test]
    fn test_many_collisions_fit_smallest_budget() {
        let mut registry = NameRegistry::new(sanitize::MIN_BUDGET);
        for _ in 0..120 {
            let name = registry.assign("Lasix_NDC12.txt");
            assert!(name.len() <= sanitize::MIN_BUDGET, "{} too long", name);
            assert!(name.ends_with(".txt"));
        }
    }

    #[test]
    fn test_registries_are_per_directory() {
        let mut store = OutputStore::new("/unused", 255);
        let a = store.allocate("Cardio", "x.txt");
        let b = store.allocate("Renal", "x.txt");
        assert_eq!(a.filename, "x.txt");
        assert_eq!(b.filename, "x.txt");
        assert_eq!(store.allocate("Cardio", "x.txt").filename, "x-2.txt");
    }

    #[test]
    fn test_write_creates_directories_and_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let store = OutputStore::new(tmp.path().join("out"), 255);
        let unit = OutputUnit {
            directory: store.directory_for("Cardio Drugs"),
            filename: "Aspirin_NDC123.txt".to_string(),
        };

        let path = store.write(&unit, "first").unwrap();
        assert_eq!(path, tmp.path().join("out/Cardio_Drugs/Aspirin_NDC123.txt"));
        assert_eq!(path, unit.path(store.root()));
        store.write(&unit, "second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn test_empty_text_still_creates_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_unit(tmp.path(), "empty.txt", "").unwrap();
        assert!(path.exists());
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }
}
