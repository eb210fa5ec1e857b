//! # Design
//!
//! - Provide structured, constant-message errors for verified transfers.
//! - Capture operation context (paths, digests) so failures are diagnosable
//!   without re-running the session.
//! - Keep integrity and partial-success failures distinct from plain IO.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::digest::Digest;

/// Result type for filesystem operations.
pub type FsOpsResult<T> = Result<T, FsOpsError>;

/// Errors produced by safe transfers.
#[derive(Debug, Error)]
pub enum FsOpsError {
    /// The source path does not exist.
    #[error("fsops source missing")]
    MissingSource {
        /// Path that was expected to exist.
        path: PathBuf,
    },
    /// The destination exists and overwriting was not allowed.
    #[error("fsops destination already exists")]
    DestinationExists {
        /// Existing destination path.
        path: PathBuf,
    },
    /// Source and destination resolve to the same filesystem entry.
    #[error("fsops source and destination are identical")]
    SamePath {
        /// Shared path.
        path: PathBuf,
    },
    /// IO failures while interacting with the filesystem.
    #[error("fsops io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Walkdir traversal failures.
    #[error("fsops walkdir failure")]
    Walkdir {
        /// Operation that triggered the walkdir failure.
        operation: &'static str,
        /// Path involved in the walkdir failure.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// The destination digest did not match the source digest; the
    /// destination has been removed.
    #[error("fsops integrity check failed")]
    Integrity {
        /// Destination that failed verification.
        destination: PathBuf,
        /// Digest computed while reading the source.
        expected: Digest,
        /// Digest computed while re-reading the destination.
        actual: Digest,
    },
    /// The copy was verified but the source could not be removed afterwards.
    #[error("fsops source retained after verified copy")]
    SourceRetained {
        /// Source that still exists.
        source_path: PathBuf,
        /// Verified destination.
        destination: PathBuf,
        /// Underlying IO error raised by the removal.
        source: io::Error,
    },
}

impl FsOpsError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walkdir(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: walkdir::Error,
    ) -> Self {
        Self::Walkdir {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Whether the failure is a post-copy digest mismatch.
    #[must_use]
    pub const fn is_integrity_failure(&self) -> bool {
        matches!(self, Self::Integrity { .. })
    }

    /// Whether the data was safely duplicated but the source survived.
    #[must_use]
    pub const fn is_partial_success(&self) -> bool {
        matches!(self, Self::SourceRetained { .. })
    }

    /// One-line rendering with the captured context.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::MissingSource { path } => format!("source {} does not exist", path.display()),
            Self::DestinationExists { path } => {
                format!("destination {} already exists", path.display())
            }
            Self::SamePath { path } => {
                format!("source and destination are both {}", path.display())
            }
            Self::Io {
                operation,
                path,
                source,
            } => format!("{operation} failed for {}: {source}", path.display()),
            Self::Walkdir {
                operation,
                path,
                source,
            } => format!("{operation} failed for {}: {source}", path.display()),
            Self::Integrity {
                destination,
                expected,
                actual,
            } => format!(
                "integrity check failed for {} (expected {expected}, found {actual}); destination removed",
                destination.display()
            ),
            Self::SourceRetained {
                source_path,
                destination,
                source,
            } => format!(
                "copied and verified to {} but could not remove source {}: {source}; manual cleanup required",
                destination.display(),
                source_path.display()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::DigestAlgorithm;
    use std::error::Error;
    use std::io;
    use tempfile::TempDir;
    use walkdir::WalkDir;

    fn io_error() -> io::Error {
        io::Error::other("io")
    }

    #[test]
    fn fsops_error_helpers_build_variants() -> anyhow::Result<()> {
        let io_err = FsOpsError::io("copy.open_source", "path", io_error());
        assert!(matches!(io_err, FsOpsError::Io { .. }));
        assert!(io_err.source().is_some());
        assert_eq!(io_err.detail(), "copy.open_source failed for path: io");

        let temp = TempDir::new()?;
        let missing = temp.path().join("missing");
        let walkdir_error = WalkDir::new(&missing)
            .into_iter()
            .next()
            .and_then(Result::err)
            .ok_or_else(|| io::Error::other("expected walkdir error"))?;
        let walk_err = FsOpsError::walkdir("digest.walk", &missing, walkdir_error);
        assert!(matches!(walk_err, FsOpsError::Walkdir { .. }));
        assert!(walk_err.source().is_some());
        Ok(())
    }

    #[test]
    fn classification_helpers_distinguish_failures() {
        let integrity = FsOpsError::Integrity {
            destination: PathBuf::from("/out/a.lsm"),
            expected: DigestAlgorithm::Sha256.digest_bytes(b"a"),
            actual: DigestAlgorithm::Sha256.digest_bytes(b"b"),
        };
        assert!(integrity.is_integrity_failure());
        assert!(!integrity.is_partial_success());
        assert!(integrity.detail().contains("destination removed"));

        let retained = FsOpsError::SourceRetained {
            source_path: PathBuf::from("/in/a.lsm"),
            destination: PathBuf::from("/out/a.lsm"),
            source: io_error(),
        };
        assert!(retained.is_partial_success());
        assert!(retained.detail().contains("manual cleanup required"));
        assert!(retained.source().is_some());
    }
}
