use std::fs;
use std::path::PathBuf;

use renamer_core::{
    Plugin, PluginConfig, PluginError, SessionInfo, SessionListener, SessionOutcome,
};
use tracing::info;

/// Session listener that persists the final summary as plain text.
///
/// Writes `<directory>/<session name>-<session id>.txt` when a session ends.
/// Characters outside `[A-Za-z0-9._-]` in the name become `_`.
#[derive(Debug, Default)]
pub struct SummaryFile {
    directory: PathBuf,
}

impl SummaryFile {
    /// Registry kind.
    pub const KIND: &'static str = "summary_file";

    fn path_for(&self, session: &SessionInfo) -> PathBuf {
        self.directory
            .join(format!("{}-{}.txt", file_stem(&session.name), session.id))
    }
}

/// Session name reduced to one safe path component.
fn file_stem(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "session".to_string()
    } else {
        cleaned.to_string()
    }
}

impl Plugin for SummaryFile {
    fn name(&self) -> &str {
        Self::KIND
    }

    fn init(&mut self, config: &PluginConfig) -> Result<(), PluginError> {
        let directory = PathBuf::from(config.require("directory")?);
        fs::create_dir_all(&directory).map_err(|err| {
            PluginError::system(
                Self::KIND,
                format!("failed to create {}", directory.display()),
                err,
            )
        })?;
        self.directory = directory;
        Ok(())
    }

    fn as_session_listener(&self) -> Option<&dyn SessionListener> {
        Some(self)
    }
}

impl SessionListener for SummaryFile {
    fn session_started(&self, _session: &SessionInfo) -> Result<(), PluginError> {
        Ok(())
    }

    fn session_ended(
        &self,
        session: &SessionInfo,
        outcome: &SessionOutcome,
    ) -> Result<(), PluginError> {
        let path = self.path_for(session);
        fs::write(&path, &outcome.summary).map_err(|err| {
            PluginError::system(
                Self::KIND,
                format!("failed to write {}", path.display()),
                err,
            )
        })?;
        info!(
            plugin = Self::KIND,
            session = %session.id,
            path = %path.display(),
            "summary written"
        );
        Ok(())
    }
}
