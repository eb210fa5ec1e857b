//! Typed project configuration.

use std::fs;
use std::path::Path;

use renamer_core::PluginConfig;
use renamer_fsops::{DigestAlgorithm, SafeTransfer};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ConfigError, ConfigResult};
use crate::output::OutputDirectoryConfig;

/// Whether the source survives a transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    /// Copy and keep the source.
    #[default]
    Copy,
    /// Rename when possible, otherwise copy, verify, and delete the source.
    Move,
}

impl TransferMode {
    /// Stable label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Move => "move",
        }
    }
}

/// How each row's target reaches its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferSettings {
    /// Copy or move.
    pub mode: TransferMode,
    /// Replace an existing destination instead of failing the row.
    pub overwrite_allowed: bool,
    /// Digest used for verification.
    pub digest: DigestAlgorithm,
    /// Try an atomic rename before falling back to copy in move mode.
    pub atomic_rename: bool,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            mode: TransferMode::Copy,
            overwrite_allowed: false,
            digest: DigestAlgorithm::default(),
            atomic_rename: true,
        }
    }
}

impl TransferSettings {
    /// Transfer primitive configured from these settings.
    #[must_use]
    pub const fn safe_transfer(&self) -> SafeTransfer {
        SafeTransfer::new(self.digest).with_atomic_rename(self.atomic_rename)
    }
}

/// A project file: output recipe, transfer settings, and plugin chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project (session) name.
    pub name: String,
    /// Destination directory recipe.
    pub output_directory: OutputDirectoryConfig,
    /// Transfer behaviour.
    #[serde(default)]
    pub transfer: TransferSettings,
    /// Plugins in invocation order.
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,
}

impl ProjectConfig {
    /// Read, parse, and validate a JSON project file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read,
    /// [`ConfigError::Parse`] for malformed JSON, and any error from
    /// [`Self::validate`].
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let contents =
            fs::read_to_string(path).map_err(|err| ConfigError::io("project.read", path, err))?;
        let config: Self = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        info!(
            project = %config.name,
            path = %path.display(),
            plugins = config.plugins.len(),
            "loaded project configuration"
        );
        Ok(config)
    }

    /// Structural checks that do not touch the filesystem.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] for a blank name or plugin kind
    /// and [`ConfigError::InvalidOutputDirectory`] for an empty recipe.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                section: "project",
                field: "name".into(),
                value: None,
                reason: "must not be blank",
            });
        }
        if self.output_directory.components.is_empty() {
            return Err(ConfigError::InvalidOutputDirectory {
                reason: "at least one component is required",
                value: None,
            });
        }
        if let Some(index) = self
            .plugins
            .iter()
            .position(|plugin| plugin.kind.trim().is_empty())
        {
            return Err(ConfigError::InvalidField {
                section: "plugins",
                field: "kind".into(),
                value: Some(index.to_string()),
                reason: "must not be blank",
            });
        }
        Ok(())
    }
}
