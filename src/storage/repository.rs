//! CSV-backed match index repository.
//!
//! The index is read once, merged in memory and written back once. Writes go
//! to a temporary file in the same directory which then replaces the index,
//! so a crash never leaves a half-written table behind.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::merge::{merge, MergeCounts};
use crate::types::{MatchRecord, INDEX_COLUMNS};

/// Outcome of one load → merge → save cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitSummary {
    pub counts: MergeCounts,
    /// Rows in the index after the write
    pub total: usize,
}

/// Repository for the persisted match index
pub struct MatchIndexRepository {
    path: PathBuf,
}

impl MatchIndexRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every row; a missing file is an empty index
    pub fn load(&self) -> Result<Vec<MatchRecord>> {
        if !self.path.exists() {
            debug!("No index at {}, starting empty", self.path.display());
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_path(&self.path)
            .with_context(|| format!("Failed to open index {}", self.path.display()))?;

        let rows = reader
            .deserialize::<MatchRecord>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to parse index {}", self.path.display()))?;

        Ok(rows)
    }

    /// Replace the index with `rows` atomically
    pub fn save(&self, rows: &[MatchRecord]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).context("Failed to create index directory")?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .context("Failed to create temporary index file")?;
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(tmp.as_file_mut());
            writer.write_record(INDEX_COLUMNS)?;
            for row in rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        tmp.as_file_mut().flush()?;
        tmp.as_file().sync_all()?;

        tmp.persist(&self.path)
            .with_context(|| format!("Failed to replace index {}", self.path.display()))?;
        Ok(())
    }

    /// Load the index, merge `discovered` into it and write it back
    pub fn commit(&self, discovered: Vec<MatchRecord>) -> Result<CommitSummary> {
        let existing = self.load()?;
        let before = existing.len();
        let (merged, counts) = merge(existing, discovered);
        self.save(&merged)?;

        info!(
            "Wrote {} ({} rows, was {}; {} new, {} upgraded)",
            self.path.display(),
            merged.len(),
            before,
            counts.added,
            counts.updated
        );

        Ok(CommitSummary {
            counts,
            total: merged.len(),
        })
    }
}
