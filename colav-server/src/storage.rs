//! Persistence for the ship-domain table
//!
//! `cbf_domains.json` lives in the platform data directory unless a path is
//! given on the command line. A missing or corrupt file falls back to the
//! built-in default table; writes go to a temp file in the same directory
//! and are renamed into place so a crash never leaves a half-written table.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::PathBuf;

use colav_core::domain::DomainTable;
use log::{info, warn};

pub struct DomainStore {
    path: PathBuf,
}

impl DomainStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Platform default: `<data_dir>/colav/cbf_domains.json`.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("", "", "colav")
            .map(|dirs| dirs.data_dir().join("cbf_domains.json"))
            .unwrap_or_else(|| PathBuf::from("cbf_domains.json"))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Load the table, falling back to the built-in default on any failure.
    pub fn load(&self) -> DomainTable {
        match fs::read_to_string(&self.path) {
            Ok(contents) => match serde_json::from_str::<DomainTable>(&contents) {
                Ok(table) => match table.validate() {
                    Ok(()) => {
                        info!("Loaded domain table from {}", self.path.display());
                        table
                    }
                    Err(e) => {
                        warn!(
                            "Domain table {} is invalid ({}); using defaults",
                            self.path.display(),
                            e
                        );
                        DomainTable::default()
                    }
                },
                Err(e) => {
                    warn!(
                        "Failed to parse domain table {} ({}); using defaults",
                        self.path.display(),
                        e
                    );
                    DomainTable::default()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(
                    "No domain table at {}; using defaults",
                    self.path.display()
                );
                DomainTable::default()
            }
            Err(e) => {
                warn!(
                    "Failed to read domain table {} ({}); using defaults",
                    self.path.display(),
                    e
                );
                DomainTable::default()
            }
        }
    }

    /// Persist atomically: write-to-temp then rename.
    pub fn save(&self, table: &DomainTable) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut contents = serde_json::to_vec_pretty(table)
            .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?;
        contents.push(b'\n');

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &contents)?;
        fs::rename(&tmp, &self.path)?;
        info!("Stored domain table at {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colav_core::encounter::EncounterClass;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_reload_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = DomainStore::new(dir.path().join("cbf_domains.json"));

        let table = DomainTable::default();
        store.save(&table).unwrap();
        assert!(store.path().exists());
        // No temp file left behind
        assert!(!dir.path().join("cbf_domains.json.tmp").exists());

        let loaded = store.load();
        assert_eq!(loaded, table);
    }

    #[test]
    fn test_missing_file_yields_default() {
        let dir = TempDir::new().unwrap();
        let store = DomainStore::new(dir.path().join("nope.json"));
        let table = store.load();
        assert!(table.validate().is_ok());
        assert!(!table.get(EncounterClass::Headon).is_empty());
    }

    #[test]
    fn test_corrupt_file_yields_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cbf_domains.json");
        fs::write(&path, b"{ not json").unwrap();
        let store = DomainStore::new(path);
        assert!(store.load().validate().is_ok());
    }

    #[test]
    fn test_incomplete_table_yields_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cbf_domains.json");
        // Only one class present: parses but fails validation
        fs::write(
            &path,
            br#"{"SAFE": {"d": [1.0], "z1": [0.0], "z2": [1.0]}}"#,
        )
        .unwrap();
        let store = DomainStore::new(path);
        let table = store.load();
        assert!(table.validate().is_ok());
        assert!(table.get(EncounterClass::Giveway).len() > 1);
    }
}
