//! Output directory rules.
//!
//! A recipe is an ordered list of [`PathComponent`]s whose derived values are
//! concatenated verbatim. Separators only appear where a literal carries one
//! or where a modification-time component adds its own leading separator.
//!
//! # Design
//! - Verification happens once, before any row is touched.
//! - Derivation is pure given the field values and the timestamp, and never
//!   fails for missing field values.

use std::path::{MAIN_SEPARATOR, Path, PathBuf};
use std::time::SystemTime;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use renamer_core::{FieldLookup, Row};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// One fragment of an output directory recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PathComponent {
    /// Fixed text.
    Literal {
        /// Text contributed verbatim.
        value: String,
    },
    /// Core value of a row field, optionally wrapped.
    FieldValue {
        /// Display name of the field to read.
        display_name: String,
        /// Text placed before a non-empty value.
        #[serde(default)]
        prefix: String,
        /// Text placed after a non-empty value.
        #[serde(default)]
        suffix: String,
    },
    /// Source modification time, formatted with a strftime pattern.
    ModificationTime {
        /// `chrono` strftime pattern.
        pattern: String,
    },
}

impl PathComponent {
    /// Literal component.
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal {
            value: value.into(),
        }
    }

    /// Field-value component without prefix or suffix.
    pub fn field(display_name: impl Into<String>) -> Self {
        Self::FieldValue {
            display_name: display_name.into(),
            prefix: String::new(),
            suffix: String::new(),
        }
    }

    /// Field-value component wrapped by `prefix` and `suffix`.
    pub fn wrapped_field(
        display_name: impl Into<String>,
        prefix: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Self {
        Self::FieldValue {
            display_name: display_name.into(),
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// Modification-time component.
    pub fn modified(pattern: impl Into<String>) -> Self {
        Self::ModificationTime {
            pattern: pattern.into(),
        }
    }

    fn derive(&self, fields: &dyn FieldLookup, modified: Option<&DateTime<Local>>) -> String {
        match self {
            Self::Literal { value } => value.clone(),
            Self::FieldValue {
                display_name,
                prefix,
                suffix,
            } => fields
                .core_value(display_name)
                .map(|value| format!("{prefix}{value}{suffix}"))
                .unwrap_or_default(),
            Self::ModificationTime { pattern } => modified
                .map(|time| format!("{MAIN_SEPARATOR}{}", time.format(pattern)))
                .unwrap_or_default(),
        }
    }
}

/// Output directory recipe as written in the project file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDirectoryConfig {
    /// Ordered components; the first must be a literal base path.
    pub components: Vec<PathComponent>,
    /// The operator picked the base directory explicitly.
    #[serde(default)]
    pub manually_chosen: bool,
    /// Derive once per session instead of once per row.
    #[serde(default)]
    pub derive_for_session: bool,
}

impl OutputDirectoryConfig {
    /// Recipe consisting of a single explicitly chosen directory.
    pub fn manual(directory: impl Into<PathBuf>) -> Self {
        Self {
            components: vec![PathComponent::literal(
                directory.into().to_string_lossy().into_owned(),
            )],
            manually_chosen: true,
            derive_for_session: true,
        }
    }

    /// Human-readable recipe, e.g. `/data/out[Batch]_x/[modified:%Y%m%d]`.
    #[must_use]
    pub fn description(&self) -> String {
        let mut text = String::new();
        for component in &self.components {
            match component {
                PathComponent::Literal { value } => text.push_str(value),
                PathComponent::FieldValue {
                    display_name,
                    prefix,
                    suffix,
                } => text.push_str(&format!("{prefix}[{display_name}]{suffix}")),
                PathComponent::ModificationTime { pattern } => {
                    text.push_str(&format!("{MAIN_SEPARATOR}[modified:{pattern}]"));
                }
            }
        }
        text
    }

    /// Validate the recipe and resolve its base path.
    ///
    /// A relative base is resolved against `cwd` and rewritten in place.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidOutputDirectory`] when the recipe does not start
    ///   with a non-blank literal.
    /// - [`ConfigError::OutputDirectoryUnavailable`] when the base is missing,
    ///   not a directory, or not writable (skipped for manually chosen bases).
    /// - [`ConfigError::InvalidTimePattern`] for unusable date patterns.
    /// - [`ConfigError::InvalidField`] for field components without a name.
    pub fn verify(&self, cwd: &Path) -> ConfigResult<VerifiedOutputDirectory> {
        let mut components = self.components.clone();
        let base = match components.first_mut() {
            Some(PathComponent::Literal { value }) if !value.trim().is_empty() => value,
            Some(PathComponent::Literal { .. }) => {
                return Err(ConfigError::InvalidOutputDirectory {
                    reason: "base path must not be blank",
                    value: None,
                });
            }
            Some(other) => {
                return Err(ConfigError::InvalidOutputDirectory {
                    reason: "first component must be a literal base path",
                    value: Some(format!("{other:?}")),
                });
            }
            None => {
                return Err(ConfigError::InvalidOutputDirectory {
                    reason: "at least one component is required",
                    value: None,
                });
            }
        };

        if Path::new(base.as_str()).is_relative() {
            let resolved = cwd.join(base.as_str());
            debug!(
                relative = %base,
                resolved = %resolved.display(),
                "resolved relative output base"
            );
            *base = resolved.to_string_lossy().into_owned();
        }
        let base_path = PathBuf::from(base.as_str());

        if !self.manually_chosen {
            ensure_writable_directory(&base_path)?;
        }

        for component in &components {
            match component {
                PathComponent::ModificationTime { pattern } => validate_pattern(pattern)?,
                PathComponent::FieldValue { display_name, .. }
                    if display_name.trim().is_empty() =>
                {
                    return Err(ConfigError::InvalidField {
                        section: "output_directory",
                        field: "display_name".into(),
                        value: None,
                        reason: "must not be blank",
                    });
                }
                _ => {}
            }
        }

        Ok(VerifiedOutputDirectory {
            components,
            base: base_path,
            manually_chosen: self.manually_chosen,
            session_scoped: self.derive_for_session,
        })
    }
}

fn ensure_writable_directory(base: &Path) -> ConfigResult<()> {
    if !base.exists() {
        return Err(ConfigError::OutputDirectoryUnavailable {
            path: base.to_path_buf(),
            reason: "does not exist",
        });
    }
    if !base.is_dir() {
        return Err(ConfigError::OutputDirectoryUnavailable {
            path: base.to_path_buf(),
            reason: "is not a directory",
        });
    }
    tempfile::NamedTempFile::new_in(base).map_err(|_| {
        ConfigError::OutputDirectoryUnavailable {
            path: base.to_path_buf(),
            reason: "is not writable",
        }
    })?;
    Ok(())
}

fn validate_pattern(pattern: &str) -> ConfigResult<()> {
    let invalid = pattern.trim().is_empty()
        || StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error));
    if invalid {
        return Err(ConfigError::InvalidTimePattern {
            pattern: pattern.to_string(),
        });
    }
    Ok(())
}

/// A recipe that passed [`OutputDirectoryConfig::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedOutputDirectory {
    components: Vec<PathComponent>,
    base: PathBuf,
    manually_chosen: bool,
    session_scoped: bool,
}

impl VerifiedOutputDirectory {
    /// Absolute base path.
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Components with the base rewritten to an absolute path.
    #[must_use]
    pub fn components(&self) -> &[PathComponent] {
        &self.components
    }

    /// Whether the destination is computed once per session.
    #[must_use]
    pub const fn is_session_scoped(&self) -> bool {
        self.session_scoped
    }

    /// Whether the operator chose the base explicitly.
    #[must_use]
    pub const fn manually_chosen(&self) -> bool {
        self.manually_chosen
    }

    /// Concatenate every component's value.
    ///
    /// Missing fields contribute nothing; a missing timestamp makes
    /// modification-time components contribute nothing.
    #[must_use]
    pub fn derive(&self, fields: &dyn FieldLookup, modified: Option<SystemTime>) -> String {
        let modified = modified.map(DateTime::<Local>::from);
        self.components
            .iter()
            .map(|component| component.derive(fields, modified.as_ref()))
            .collect()
    }

    /// Directory for `row`, using its target's modification time.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the target metadata cannot be read
    /// and the recipe needs it.
    pub fn derive_for_row(&self, row: &Row) -> ConfigResult<PathBuf> {
        let modified = if self.needs_modification_time() {
            Some(
                row.target()
                    .modified()
                    .map_err(|err| ConfigError::io("derive.modified", row.target().path(), err))?,
            )
        } else {
            None
        };
        Ok(PathBuf::from(self.derive(row, modified)))
    }

    /// Directory shared by every row of a session.
    ///
    /// A manually chosen base is used as is. Otherwise the recipe is derived
    /// from the earliest-modified target: its row's fields and its
    /// modification time. Ties keep the earlier row.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when target metadata cannot be read and the
    /// recipe needs it. Without a modification-time component unreadable
    /// targets are skipped, falling back to the first row.
    pub fn derive_for_session(&self, rows: &[Row]) -> ConfigResult<PathBuf> {
        if self.manually_chosen {
            return Ok(self.base.clone());
        }
        let needs_time = self.needs_modification_time();
        let mut earliest: Option<(SystemTime, &Row)> = None;
        for row in rows {
            let modified = match row.target().modified() {
                Ok(modified) => modified,
                Err(err) if needs_time => {
                    return Err(ConfigError::io("derive.modified", row.target().path(), err));
                }
                Err(_) => continue,
            };
            if earliest.is_none_or(|(current, _)| modified < current) {
                earliest = Some((modified, row));
            }
        }
        let derived = match (earliest, rows.first()) {
            (Some((modified, row)), _) => self.derive(row, needs_time.then_some(modified)),
            (None, Some(first)) => self.derive(first, None),
            (None, None) => self.derive(&NoFields, None),
        };
        debug!(directory = %derived, rows = rows.len(), "session directory derived");
        Ok(PathBuf::from(derived))
    }

    fn needs_modification_time(&self) -> bool {
        self.components
            .iter()
            .any(|component| matches!(component, PathComponent::ModificationTime { .. }))
    }
}

struct NoFields;

impl FieldLookup for NoFields {
    fn core_value(&self, _display_name: &str) -> Option<&str> {
        None
    }
}
