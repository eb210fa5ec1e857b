//! Temporary source and output trees.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use renamer_core::{Field, Row, Target};
use tempfile::TempDir;

/// A scratch directory with `source/` and `output/` subdirectories.
///
/// Everything is removed when the workspace is dropped.
#[derive(Debug)]
pub struct Workspace {
    temp: TempDir,
}

impl Workspace {
    /// Create the scratch tree.
    ///
    /// # Errors
    ///
    /// Returns an error when the temporary directory cannot be created.
    pub fn new() -> Result<Self> {
        let temp = TempDir::new().context("failed to create temp workspace")?;
        fs::create_dir_all(temp.path().join("source"))?;
        fs::create_dir_all(temp.path().join("output"))?;
        Ok(Self { temp })
    }

    /// Workspace root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Directory holding source targets.
    #[must_use]
    pub fn source_dir(&self) -> PathBuf {
        self.root().join("source")
    }

    /// Directory meant as the output base.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.root().join("output")
    }

    /// Write `contents` to `source/<relative>`, creating parents.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub fn write_source(&self, relative: &str, contents: &[u8]) -> Result<PathBuf> {
        let path = self.source_dir().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Row for `source/<relative>` with the given fields.
    ///
    /// # Errors
    ///
    /// Returns an error when the fields contain duplicate names.
    pub fn row(&self, relative: &str, fields: Vec<Field>) -> Result<Row> {
        let target = Target::new(self.source_dir().join(relative)).with_root(self.source_dir());
        Ok(Row::new(target, fields)?)
    }

    /// Write one file per `(name, batch)` pair and build a row whose
    /// destination name is `<batch>.<ext>`.
    ///
    /// # Errors
    ///
    /// Returns an error when a file cannot be written.
    pub fn batch_rows(&self, entries: &[(&str, &str)]) -> Result<Vec<Row>> {
        entries
            .iter()
            .map(|(name, batch)| {
                self.write_source(name, format!("contents of {name}").as_bytes())?;
                self.row(name, vec![Field::new("Batch", *batch)])
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_rows_write_sources_and_name_destinations() -> Result<()> {
        let workspace = Workspace::new()?;
        let rows = workspace.batch_rows(&[("a.lsm", "B1"), ("b.lsm", "B2")])?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].destination_file_name(), "B1.lsm");
        assert!(rows[1].target().path().exists());
        assert_eq!(rows[1].target().relative_path(), Path::new("b.lsm"));
        assert!(workspace.output_dir().is_dir());
        Ok(())
    }
}
