//! Domain models for rename sessions.
//!
//! # Design
//! - Targets are immutable once scanned; rows own their target.
//! - Field edits happen outside the engine; plugins only touch rows through
//!   [`Row::set_plugin_value`].

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::RowError;

/// The file or directory being renamed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    name: String,
    path: PathBuf,
    root: Option<PathBuf>,
}

impl Target {
    /// Build a target from a path, using its final component as the name.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self {
            name,
            path,
            root: None,
        }
    }

    /// Record the scan root the target was discovered under.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Display name of the target.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Underlying filesystem path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scan root, when one was recorded.
    #[must_use]
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Path relative to the scan root, or the full path when it lives elsewhere.
    #[must_use]
    pub fn relative_path(&self) -> &Path {
        self.root
            .as_deref()
            .and_then(|root| self.path.strip_prefix(root).ok())
            .unwrap_or(&self.path)
    }

    /// Extension of the target when it is a file.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        if self.is_directory() {
            return None;
        }
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
    }

    /// Whether the target currently resolves to a directory.
    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.path.is_dir()
    }

    /// Last modification time reported by the filesystem.
    ///
    /// # Errors
    ///
    /// Returns the IO error raised while reading metadata.
    pub fn modified(&self) -> io::Result<SystemTime> {
        fs::metadata(&self.path)?.modified()
    }

    /// Size of the target in bytes; directories report the sum of their files.
    ///
    /// Entries that cannot be read count as zero.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        if !self.is_directory() {
            return fs::metadata(&self.path).map_or(0, |meta| meta.len());
        }
        WalkDir::new(&self.path)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| entry.metadata().ok())
            .map(|meta| meta.len())
            .sum()
    }
}

/// A named value collected for a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    display_name: String,
    core_value: Option<String>,
    file_name_value: Option<String>,
    plugin_writable: bool,
}

impl Field {
    /// Field whose core value is also used verbatim in the destination name.
    pub fn new(display_name: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            display_name: display_name.into(),
            core_value: Some(value.clone()),
            file_name_value: Some(value),
            plugin_writable: false,
        }
    }

    /// Field with a distinct file-name rendering (padding, casing, ...).
    pub fn with_file_name_value(
        display_name: impl Into<String>,
        core_value: impl Into<String>,
        file_name_value: impl Into<String>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            core_value: Some(core_value.into()),
            file_name_value: Some(file_name_value.into()),
            plugin_writable: false,
        }
    }

    /// Field that carries a value but never contributes to the destination name.
    pub fn metadata(display_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            core_value: Some(value.into()),
            file_name_value: None,
            plugin_writable: false,
        }
    }

    /// Empty field reserved for a plugin-derived value that is part of the name.
    pub fn plugin(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            core_value: None,
            file_name_value: None,
            plugin_writable: true,
        }
    }

    /// Unique display name within the row.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Cleaned value, `None` when undefined or empty.
    #[must_use]
    pub fn core_value(&self) -> Option<&str> {
        self.core_value.as_deref().filter(|value| !value.is_empty())
    }

    /// Value formatted for the destination file name.
    #[must_use]
    pub fn file_name_value(&self) -> Option<&str> {
        self.file_name_value
            .as_deref()
            .filter(|value| !value.is_empty())
    }

    /// Whether plugins may overwrite this field.
    #[must_use]
    pub const fn is_plugin_writable(&self) -> bool {
        self.plugin_writable
    }
}

/// Read access to field core values by display name.
pub trait FieldLookup {
    /// Core value for `display_name`, `None` when undefined or empty.
    fn core_value(&self, display_name: &str) -> Option<&str>;
}

/// One unit of work: a target with its ordered fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    target: Target,
    fields: Vec<Field>,
}

impl Row {
    /// Build a row, rejecting duplicate display names.
    ///
    /// # Errors
    ///
    /// Returns [`RowError::DuplicateField`] when two fields share a name.
    pub fn new(target: Target, fields: Vec<Field>) -> Result<Self, RowError> {
        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if !seen.insert(field.display_name.as_str()) {
                return Err(RowError::DuplicateField {
                    display_name: field.display_name.clone(),
                });
            }
        }
        Ok(Self { target, fields })
    }

    /// Target processed by this row.
    #[must_use]
    pub const fn target(&self) -> &Target {
        &self.target
    }

    /// Fields in their configured order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Field with the given display name.
    #[must_use]
    pub fn field(&self, display_name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|field| field.display_name == display_name)
    }

    /// Store a plugin-derived value keyed by display name.
    ///
    /// Unknown names are appended as plugin-owned metadata fields.
    ///
    /// # Errors
    ///
    /// Returns [`RowError::FieldNotWritable`] when the field belongs to the operator.
    pub fn set_plugin_value(
        &mut self,
        display_name: &str,
        value: impl Into<String>,
    ) -> Result<(), RowError> {
        let value = value.into();
        match self
            .fields
            .iter_mut()
            .find(|field| field.display_name == display_name)
        {
            Some(field) if field.plugin_writable => {
                field.file_name_value = Some(value.clone());
                field.core_value = Some(value);
                Ok(())
            }
            Some(_) => Err(RowError::FieldNotWritable {
                display_name: display_name.to_string(),
            }),
            None => {
                self.fields.push(Field {
                    display_name: display_name.to_string(),
                    core_value: Some(value),
                    file_name_value: None,
                    plugin_writable: true,
                });
                Ok(())
            }
        }
    }

    /// Destination file name composed from the fields' file-name values.
    ///
    /// Falls back to the source name when no field contributes.
    #[must_use]
    pub fn destination_file_name(&self) -> String {
        let stem: String = self
            .fields
            .iter()
            .filter_map(Field::file_name_value)
            .collect();
        if stem.is_empty() {
            return self.target.name().to_string();
        }
        match self.target.extension() {
            Some(ext) => format!("{stem}.{ext}"),
            None => stem,
        }
    }
}

impl FieldLookup for Row {
    fn core_value(&self, display_name: &str) -> Option<&str> {
        self.field(display_name).and_then(Field::core_value)
    }
}
