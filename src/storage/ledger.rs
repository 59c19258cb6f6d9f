use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Newline-delimited record of detail-page URLs that have been attempted.
/// Append-only across runs; one process writes it at a time.
pub struct ProcessedLedger {
    path: PathBuf,
}

impl ProcessedLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current contents; a missing file is an empty ledger.
    pub fn load(&self) -> Result<HashSet<String>> {
        if !self.path.exists() {
            return Ok(HashSet::new());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read ledger {:?}", self.path))?;

        Ok(raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub fn append(&self, url: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Could not create dir {:?}", parent))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open ledger {:?}", self.path))?;
        writeln!(file, "{}", url).with_context(|| format!("Failed to append to {:?}", self.path))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.load()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let ledger = ProcessedLedger::new(dir.path().join("processed-stocks.txt"));
        assert!(ledger.load().unwrap().is_empty());
        assert_eq!(ledger.len().unwrap(), 0);
    }

    #[test]
    fn appends_survive_reload_and_blank_lines_are_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("processed-stocks.txt");
        let ledger = ProcessedLedger::new(&path);

        ledger.append("https://x/company/A/consolidated/").unwrap();
        ledger.append("https://x/company/B/consolidated/").unwrap();
        fs::write(
            &path,
            fs::read_to_string(&path).unwrap() + "\n   \n  https://x/company/C/consolidated/  \r\n",
        )
        .unwrap();

        let reopened = ProcessedLedger::new(&path);
        let set = reopened.load().unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.contains("https://x/company/A/consolidated/"));
        assert!(set.contains("https://x/company/C/consolidated/"));
    }
}
