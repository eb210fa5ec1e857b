//! Turning a source directory into session rows.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use renamer_core::{Field, Row, Target};

/// Compile `--include` patterns. No patterns means every entry is included.
///
/// # Errors
///
/// Returns an error naming the first invalid pattern.
pub fn include_set(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .with_context(|| format!("invalid include pattern '{pattern}'"))?;
        builder.add(glob);
    }
    Ok(Some(builder.build()?))
}

/// Entries directly under `root` whose file names match `include`, sorted by
/// file name.
///
/// # Errors
///
/// Returns an error when the directory cannot be listed.
pub fn scan_targets(root: &Path, include: Option<&GlobSet>) -> Result<Vec<Target>> {
    let mut names = Vec::new();
    let entries =
        fs::read_dir(root).with_context(|| format!("failed to list {}", root.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to list {}", root.display()))?;
        let name = entry.file_name();
        if include.is_none_or(|set| set.is_match(Path::new(&name))) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names
        .into_iter()
        .map(|name| Target::new(root.join(name)).with_root(root))
        .collect())
}

/// One row per target carrying the given `(display name, value)` fields,
/// followed by empty plugin-writable fields named by `plugin_fields`.
///
/// # Errors
///
/// Returns an error when two fields share a display name.
pub fn build_rows(
    targets: Vec<Target>,
    fields: &[(String, String)],
    plugin_fields: &[String],
) -> Result<Vec<Row>> {
    targets
        .into_iter()
        .map(|target| {
            let fields = fields
                .iter()
                .map(|(name, value)| Field::new(name.clone(), value.clone()))
                .chain(plugin_fields.iter().map(|name| Field::plugin(name.clone())))
                .collect();
            Row::new(target, fields).context("invalid field arguments")
        })
        .collect()
}

/// Parse a `NAME=VALUE` argument.
///
/// # Errors
///
/// Returns a message when the separator is missing or the name is blank.
pub fn parse_field(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("field name is blank in '{raw}'"));
    }
    Ok((name.to_string(), value.to_string()))
}
