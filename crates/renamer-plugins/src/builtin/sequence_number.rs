use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use regex::Regex;
use renamer_core::{Plugin, PluginConfig, PluginError, PluginRow, RowEvent, RowListener};
use tracing::{debug, error};

const DEFAULT_WIDTH: usize = 3;

/// Row listener that numbers targets by their position in their directory.
///
/// On `StartRow` the target's directory is listed once; every matching entry
/// is numbered in file-name order and cached by path. Later rows from the same
/// directory, in this or any concurrent session sharing the instance, read
/// from the cache.
///
/// Properties: `field` (required), `width` (zero padding, default 3),
/// `pattern` (optional file-name regex restricting which entries count).
#[derive(Debug, Default)]
pub struct SequenceNumber {
    field: String,
    width: usize,
    pattern: Option<Regex>,
    cache: Mutex<HashMap<PathBuf, String>>,
}

impl SequenceNumber {
    /// Registry kind.
    pub const KIND: &'static str = "sequence_number";

    fn lock_cache(&self) -> MutexGuard<'_, HashMap<PathBuf, String>> {
        self.cache.lock().unwrap_or_else(|poisoned| {
            error!(plugin = Self::KIND, "sequence cache mutex poisoned; clearing");
            let mut guard = poisoned.into_inner();
            guard.clear();
            guard
        })
    }

    fn number_for(&self, target: &Path) -> Result<String, PluginError> {
        let mut cache = self.lock_cache();
        if let Some(value) = cache.get(target) {
            return Ok(value.clone());
        }

        let directory = target.parent().unwrap_or_else(|| Path::new("."));
        let names = match self.list(directory) {
            Ok(names) => names,
            Err(err) => {
                cache.clear();
                return Err(PluginError::system(
                    Self::KIND,
                    format!("failed to list {}", directory.display()),
                    err,
                ));
            }
        };
        debug!(
            plugin = Self::KIND,
            directory = %directory.display(),
            entries = names.len(),
            "numbered directory"
        );
        for (index, name) in names.into_iter().enumerate() {
            let value = format!("{:0width$}", index + 1, width = self.width);
            cache.insert(directory.join(name), value);
        }

        cache.get(target).cloned().ok_or_else(|| {
            PluginError::data(
                Self::KIND,
                format!("{} is excluded by the sequence pattern", target.display()),
            )
        })
    }

    fn list(&self, directory: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(directory)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if self.pattern.as_ref().is_none_or(|pattern| pattern.is_match(&name)) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

impl Plugin for SequenceNumber {
    fn name(&self) -> &str {
        Self::KIND
    }

    fn init(&mut self, config: &PluginConfig) -> Result<(), PluginError> {
        self.field = config.require("field")?.to_string();
        self.width = match config.get("width") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                PluginError::configuration(Self::KIND, "width", "must be a non-negative integer")
            })?,
            None => DEFAULT_WIDTH,
        };
        self.pattern = config
            .get("pattern")
            .map(Regex::new)
            .transpose()
            .map_err(|err| {
                PluginError::configuration(
                    Self::KIND,
                    "pattern",
                    format!("is not a valid regular expression: {err}"),
                )
            })?;
        Ok(())
    }

    fn as_row_listener(&self) -> Option<&dyn RowListener> {
        Some(self)
    }
}

impl RowListener for SequenceNumber {
    fn process_event(&self, event: RowEvent, row: &mut PluginRow<'_>) -> Result<(), PluginError> {
        if event != RowEvent::StartRow {
            return Ok(());
        }
        let value = self.number_for(row.source())?;
        row.set_plugin_value(&self.field, value)
            .map_err(|err| PluginError::from_row(Self::KIND, &err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use renamer_core::{Field, FieldLookup, PluginErrorKind, Row, Target};
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn plugin(properties: &[(&str, &str)]) -> Result<SequenceNumber> {
        let mut config = PluginConfig::new(SequenceNumber::KIND).with("field", "Seq");
        for (key, value) in properties {
            config = config.with(*key, *value);
        }
        let mut plugin = SequenceNumber::default();
        plugin.init(&config)?;
        Ok(plugin)
    }

    fn scan_dir(names: &[&str]) -> Result<TempDir> {
        let temp = TempDir::new()?;
        for name in names {
            fs::write(temp.path().join(name), name.as_bytes())?;
        }
        Ok(temp)
    }

    fn start_row(plugin: &SequenceNumber, path: &Path) -> Result<Option<String>, PluginError> {
        let mut row = Row::new(
            Target::new(path),
            vec![Field::new("Batch", "B1"), Field::plugin("Seq")],
        )
        .map_err(|err| PluginError::from_row("test", &err))?;
        plugin.process_event(RowEvent::StartRow, &mut PluginRow::new(0, &mut row))?;
        Ok(row.core_value("Seq").map(str::to_string))
    }

    #[test]
    fn numbers_follow_file_name_order() -> Result<()> {
        let dir = scan_dir(&["c.lsm", "a.lsm", "b.lsm"])?;
        let plugin = plugin(&[])?;
        assert_eq!(
            start_row(&plugin, &dir.path().join("c.lsm"))?.as_deref(),
            Some("003")
        );
        assert_eq!(
            start_row(&plugin, &dir.path().join("a.lsm"))?.as_deref(),
            Some("001")
        );
        assert_eq!(plugin.lock_cache().len(), 3);
        Ok(())
    }

    #[test]
    fn pattern_and_width_shape_the_sequence() -> Result<()> {
        let dir = scan_dir(&["a.lsm", "notes.txt", "b.lsm"])?;
        let plugin = plugin(&[("width", "1"), ("pattern", r"\.lsm$")])?;
        assert_eq!(
            start_row(&plugin, &dir.path().join("b.lsm"))?.as_deref(),
            Some("2")
        );
        let err = start_row(&plugin, &dir.path().join("notes.txt")).expect_err("excluded");
        assert_eq!(err.kind(), PluginErrorKind::Data);
        Ok(())
    }

    #[test]
    fn listing_failure_clears_the_cache() -> Result<()> {
        let dir = scan_dir(&["a.lsm"])?;
        let plugin = plugin(&[])?;
        start_row(&plugin, &dir.path().join("a.lsm"))?;
        assert_eq!(plugin.lock_cache().len(), 1);

        let err = start_row(&plugin, &dir.path().join("missing").join("x.lsm"))
            .expect_err("listing fails");
        assert_eq!(err.kind(), PluginErrorKind::System);
        assert!(plugin.lock_cache().is_empty());
        Ok(())
    }

    #[test]
    fn operator_fields_cannot_be_overwritten() -> Result<()> {
        let dir = scan_dir(&["a.lsm"])?;
        let plugin = plugin(&[])?;
        let mut row = Row::new(
            Target::new(dir.path().join("a.lsm")),
            vec![Field::new("Seq", "fixed")],
        )?;
        let err = plugin
            .process_event(RowEvent::StartRow, &mut PluginRow::new(0, &mut row))
            .expect_err("operator field");
        assert_eq!(err.kind(), PluginErrorKind::Data);
        Ok(())
    }

    #[test]
    fn concurrent_sessions_share_one_consistent_cache() -> Result<()> {
        let names: Vec<String> = (0..20).map(|i| format!("img{i:02}.lsm")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let dir = scan_dir(&refs)?;
        let plugin = Arc::new(plugin(&[])?);

        let handles: Vec<_> = (0..4)
            .map(|session| {
                let plugin = Arc::clone(&plugin);
                let paths: Vec<PathBuf> = if session % 2 == 0 {
                    names.iter().map(|name| dir.path().join(name)).collect()
                } else {
                    names.iter().rev().map(|name| dir.path().join(name)).collect()
                };
                thread::spawn(move || -> Result<Vec<(PathBuf, String)>, PluginError> {
                    paths
                        .into_iter()
                        .map(|path| {
                            let value = start_row(&plugin, &path)?.unwrap_or_default();
                            Ok((path, value))
                        })
                        .collect()
                })
            })
            .collect();

        for handle in handles {
            let results = handle.join().expect("session thread panicked")?;
            for (path, value) in results {
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                let index = names.iter().position(|n| n == name).unwrap_or(usize::MAX);
                assert_eq!(value, format!("{:03}", index + 1));
            }
        }
        Ok(())
    }
}
