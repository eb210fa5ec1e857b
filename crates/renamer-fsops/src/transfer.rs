//! Verified copy and move of files and directory trees.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::digest::{Digest, DigestAlgorithm, DigestContext, digest_path, tree_files};
use crate::error::{FsOpsError, FsOpsResult};

/// Read/write buffer size used when streaming file contents.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Outcome of a successful transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    /// Bytes of file content moved or copied.
    pub bytes: u64,
    /// Verified digest; `None` when an atomic rename made hashing unnecessary.
    pub digest: Option<Digest>,
    /// Whether the fast rename path was taken.
    pub renamed: bool,
}

/// Copy and move primitive that never leaves an unverified destination behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafeTransfer {
    algorithm: DigestAlgorithm,
    buffer_size: usize,
    atomic_rename: bool,
}

impl Default for SafeTransfer {
    fn default() -> Self {
        Self::new(DigestAlgorithm::default())
    }
}

impl SafeTransfer {
    /// Transfer primitive hashing with `algorithm`.
    #[must_use]
    pub const fn new(algorithm: DigestAlgorithm) -> Self {
        Self {
            algorithm,
            buffer_size: DEFAULT_BUFFER_SIZE,
            atomic_rename: true,
        }
    }

    /// Override the streaming buffer size. Zero is treated as one byte.
    #[must_use]
    pub const fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = if buffer_size == 0 { 1 } else { buffer_size };
        self
    }

    /// Enable or disable the rename fast path used by [`Self::move_path`].
    #[must_use]
    pub const fn with_atomic_rename(mut self, enabled: bool) -> Self {
        self.atomic_rename = enabled;
        self
    }

    /// Digest algorithm used for verification.
    #[must_use]
    pub const fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Copy `source` to `destination` and verify the result.
    ///
    /// Directories are copied recursively; one digest covers the whole tree.
    ///
    /// # Errors
    ///
    /// - [`FsOpsError::MissingSource`] when the source is absent.
    /// - [`FsOpsError::DestinationExists`] when the destination exists and
    ///   `overwrite_allowed` is false; nothing is read or written.
    /// - [`FsOpsError::Integrity`] when re-reading the destination yields a
    ///   different digest; the destination has been removed.
    /// - [`FsOpsError::Io`] / [`FsOpsError::Walkdir`] for filesystem failures;
    ///   anything already written to the destination has been removed.
    pub fn copy(
        &self,
        source: &Path,
        destination: &Path,
        overwrite_allowed: bool,
    ) -> FsOpsResult<TransferReport> {
        Self::preflight(source, destination, overwrite_allowed)?;
        Self::prepare_destination(destination)?;
        let (bytes, expected) = self.write_verified(source, destination)?;
        debug!(
            source = %source.display(),
            destination = %destination.display(),
            bytes,
            digest = %expected,
            "verified copy complete"
        );
        Ok(TransferReport {
            bytes,
            digest: Some(expected),
            renamed: false,
        })
    }

    /// Move `source` to `destination`.
    ///
    /// Tries an atomic rename first. When that is unavailable the source is
    /// copied, verified and only then removed.
    ///
    /// # Errors
    ///
    /// Every error of [`Self::copy`], plus [`FsOpsError::SourceRetained`] when
    /// the verified copy succeeded but the source could not be removed.
    pub fn move_path(
        &self,
        source: &Path,
        destination: &Path,
        overwrite_allowed: bool,
    ) -> FsOpsResult<TransferReport> {
        Self::preflight(source, destination, overwrite_allowed)?;
        Self::prepare_destination(destination)?;

        if self.atomic_rename {
            let bytes = tree_size(source)?;
            match fs::rename(source, destination) {
                Ok(()) => {
                    debug!(
                        source = %source.display(),
                        destination = %destination.display(),
                        bytes,
                        "moved by rename"
                    );
                    return Ok(TransferReport {
                        bytes,
                        digest: None,
                        renamed: true,
                    });
                }
                Err(err) => {
                    debug!(
                        source = %source.display(),
                        destination = %destination.display(),
                        error = %err,
                        "rename unavailable; falling back to verified copy"
                    );
                }
            }
        }

        let (bytes, expected) = self.write_verified(source, destination)?;
        remove_path(source).map_err(|source_err| FsOpsError::SourceRetained {
            source_path: source.to_path_buf(),
            destination: destination.to_path_buf(),
            source: source_err,
        })?;
        debug!(
            source = %source.display(),
            destination = %destination.display(),
            bytes,
            digest = %expected,
            "verified move complete"
        );
        Ok(TransferReport {
            bytes,
            digest: Some(expected),
            renamed: false,
        })
    }

    fn preflight(source: &Path, destination: &Path, overwrite_allowed: bool) -> FsOpsResult<()> {
        if fs::symlink_metadata(source).is_err() {
            return Err(FsOpsError::MissingSource {
                path: source.to_path_buf(),
            });
        }
        if fs::symlink_metadata(destination).is_err() {
            return Ok(());
        }
        let canonical_source = fs::canonicalize(source)
            .map_err(|err| FsOpsError::io("transfer.canonicalize", source, err))?;
        let canonical_destination = fs::canonicalize(destination)
            .map_err(|err| FsOpsError::io("transfer.canonicalize", destination, err))?;
        if canonical_source == canonical_destination {
            return Err(FsOpsError::SamePath {
                path: canonical_source,
            });
        }
        if !overwrite_allowed {
            return Err(FsOpsError::DestinationExists {
                path: destination.to_path_buf(),
            });
        }
        Ok(())
    }

    fn prepare_destination(destination: &Path) -> FsOpsResult<()> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| FsOpsError::io("transfer.create_parent", parent, err))?;
        }
        if fs::symlink_metadata(destination).is_ok() {
            remove_path(destination)
                .map_err(|err| FsOpsError::io("transfer.remove_existing", destination, err))?;
        }
        Ok(())
    }

    /// Write and verify `destination`; on any failure nothing is left there.
    fn write_verified(&self, source: &Path, destination: &Path) -> FsOpsResult<(u64, Digest)> {
        let result = self
            .write_tree(source, destination)
            .and_then(|(bytes, expected)| {
                self.verify(destination, &expected)?;
                Ok((bytes, expected))
            });
        if result.is_err()
            && fs::symlink_metadata(destination).is_ok()
            && let Err(err) = remove_path(destination)
        {
            warn!(
                destination = %destination.display(),
                error = %err,
                "failed to remove partial destination"
            );
        }
        result
    }

    /// Copy every entry and hash the source bytes as they are written.
    pub(crate) fn write_tree(
        &self,
        source: &Path,
        destination: &Path,
    ) -> FsOpsResult<(u64, Digest)> {
        let mut context = DigestContext::new(self.algorithm);
        let mut buffer = vec![0u8; self.buffer_size];
        let mut bytes = 0u64;

        for entry in WalkDir::new(source).sort_by_file_name() {
            let entry =
                entry.map_err(|err| FsOpsError::walkdir("copy_tree.walk", source, err))?;
            let target_path = if entry.depth() == 0 {
                destination.to_path_buf()
            } else {
                let relative = entry.path().strip_prefix(source).map_err(|_| {
                    FsOpsError::io(
                        "copy_tree.relative_path",
                        entry.path(),
                        io::Error::other("entry outside source tree"),
                    )
                })?;
                destination.join(relative)
            };

            if entry.file_type().is_dir() {
                fs::create_dir_all(&target_path)
                    .map_err(|err| FsOpsError::io("copy_tree.create_dir", &target_path, err))?;
                continue;
            }
            bytes += copy_file(entry.path(), &target_path, &mut context, &mut buffer)?;
        }

        Ok((bytes, context.finish()))
    }

    /// Re-read `destination` and compare against `expected`.
    ///
    /// A mismatching destination is removed before the error is returned.
    pub(crate) fn verify(&self, destination: &Path, expected: &Digest) -> FsOpsResult<()> {
        let actual = digest_path(destination, self.algorithm)?;
        if &actual == expected {
            return Ok(());
        }
        if let Err(err) = remove_path(destination) {
            warn!(
                destination = %destination.display(),
                error = %err,
                "failed to remove destination after integrity mismatch"
            );
        }
        Err(FsOpsError::Integrity {
            destination: destination.to_path_buf(),
            expected: expected.clone(),
            actual,
        })
    }
}

fn copy_file(
    source: &Path,
    destination: &Path,
    context: &mut DigestContext,
    buffer: &mut [u8],
) -> FsOpsResult<u64> {
    let mut reader =
        File::open(source).map_err(|err| FsOpsError::io("copy_file.open_source", source, err))?;
    let mut writer = File::create(destination)
        .map_err(|err| FsOpsError::io("copy_file.create_destination", destination, err))?;
    let mut total = 0u64;
    loop {
        let read = reader
            .read(buffer)
            .map_err(|err| FsOpsError::io("copy_file.read", source, err))?;
        if read == 0 {
            break;
        }
        context.update(&buffer[..read]);
        writer
            .write_all(&buffer[..read])
            .map_err(|err| FsOpsError::io("copy_file.write", destination, err))?;
        total += read as u64;
    }
    writer
        .sync_all()
        .map_err(|err| FsOpsError::io("copy_file.sync", destination, err))?;
    Ok(total)
}

fn tree_size(path: &Path) -> FsOpsResult<u64> {
    tree_files(path).try_fold(0u64, |total, file| {
        let file = file?;
        let meta =
            fs::metadata(&file).map_err(|err| FsOpsError::io("tree_size.metadata", &file, err))?;
        Ok(total + meta.len())
    })
}

fn remove_path(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    fn sample_tree(root: &Path) -> Result<()> {
        write_file(&root.join("b.tif"), b"second")?;
        write_file(&root.join("a.tif"), b"first")?;
        write_file(&root.join("nested").join("c.tif"), b"third")?;
        Ok(())
    }

    #[test]
    fn copy_produces_matching_digest() -> Result<()> {
        let temp = TempDir::new()?;
        let source = temp.path().join("in").join("a.lsm");
        let destination = temp.path().join("out").join("deep").join("B1.lsm");
        write_file(&source, &vec![7u8; 200_000])?;

        let report = SafeTransfer::default()
            .with_buffer_size(4096)
            .copy(&source, &destination, false)?;

        assert_eq!(report.bytes, 200_000);
        assert!(!report.renamed);
        let expected = digest_path(&source, DigestAlgorithm::Sha256)?;
        assert_eq!(report.digest, Some(expected.clone()));
        assert_eq!(digest_path(&destination, DigestAlgorithm::Sha256)?, expected);
        assert!(source.exists());
        Ok(())
    }

    #[test]
    fn copy_recurses_into_directories() -> Result<()> {
        let temp = TempDir::new()?;
        let source = temp.path().join("set");
        sample_tree(&source)?;
        let destination = temp.path().join("out").join("set-copy");

        let report = SafeTransfer::new(DigestAlgorithm::Sha512).copy(&source, &destination, false)?;

        assert_eq!(report.bytes, 16);
        assert_eq!(fs::read(destination.join("nested").join("c.tif"))?, b"third");
        assert_eq!(
            report.digest,
            Some(DigestAlgorithm::Sha512.digest_bytes(b"firstsecondthird"))
        );
        Ok(())
    }

    #[test]
    fn existing_destination_is_left_untouched_without_overwrite() -> Result<()> {
        let temp = TempDir::new()?;
        let source = temp.path().join("a.lsm");
        let destination = temp.path().join("b.lsm");
        write_file(&source, b"new")?;
        write_file(&destination, b"old")?;

        let err = SafeTransfer::default()
            .copy(&source, &destination, false)
            .expect_err("existing destination must be refused");
        assert!(matches!(err, FsOpsError::DestinationExists { .. }));
        assert_eq!(fs::read(&destination)?, b"old");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn existing_destination_is_refused_before_source_is_read() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new()?;
        let source = temp.path().join("unreadable.lsm");
        let destination = temp.path().join("b.lsm");
        write_file(&source, b"secret")?;
        write_file(&destination, b"old")?;
        fs::set_permissions(&source, fs::Permissions::from_mode(0o000))?;

        let result = SafeTransfer::default().copy(&source, &destination, false);
        fs::set_permissions(&source, fs::Permissions::from_mode(0o644))?;

        assert!(matches!(result, Err(FsOpsError::DestinationExists { .. })));
        Ok(())
    }

    #[test]
    fn overwrite_replaces_existing_destination() -> Result<()> {
        let temp = TempDir::new()?;
        let source = temp.path().join("a.lsm");
        let destination = temp.path().join("b");
        write_file(&source, b"new")?;
        write_file(&destination.join("stale.txt"), b"old")?;

        SafeTransfer::default().copy(&source, &destination, true)?;
        assert_eq!(fs::read(&destination)?, b"new");
        Ok(())
    }

    #[test]
    fn corruption_before_verification_removes_destination() -> Result<()> {
        let temp = TempDir::new()?;
        let source = temp.path().join("a.lsm");
        let destination = temp.path().join("out").join("a.lsm");
        write_file(&source, b"pristine bytes")?;
        fs::create_dir_all(temp.path().join("out"))?;

        let transfer = SafeTransfer::default();
        let (_, expected) = transfer.write_tree(&source, &destination)?;
        fs::write(&destination, b"corrupted bytes")?;

        let err = transfer
            .verify(&destination, &expected)
            .expect_err("corruption must be detected");
        assert!(err.is_integrity_failure());
        assert!(!destination.exists());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn failed_copy_leaves_no_partial_destination() -> Result<()> {
        let temp = TempDir::new()?;
        let source = temp.path().join("set");
        write_file(&source.join("a.tif"), b"first")?;
        std::os::unix::fs::symlink(temp.path().join("gone.tif"), source.join("b_dangling"))?;
        let destination = temp.path().join("out").join("set");

        let err = SafeTransfer::default()
            .copy(&source, &destination, false)
            .expect_err("dangling entry cannot be read");
        assert!(matches!(err, FsOpsError::Io { .. }));
        assert!(!destination.exists());

        fs::remove_file(source.join("b_dangling"))?;
        SafeTransfer::default().copy(&source, &destination, false)?;
        assert_eq!(fs::read(destination.join("a.tif"))?, b"first");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn move_reports_partial_success_when_source_survives() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new()?;
        let locked = temp.path().join("locked");
        let source = locked.join("a.lsm");
        write_file(&source, b"keep me")?;
        let destination = temp.path().join("out").join("B1.lsm");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555))?;
        if fs::write(locked.join("write-check"), b"").is_ok() {
            // Permission bits are not enforced for this user.
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755))?;
            return Ok(());
        }

        let result = SafeTransfer::default().move_path(&source, &destination, false);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755))?;

        let err = result.expect_err("source removal must fail");
        assert!(err.is_partial_success());
        assert!(err.detail().ends_with("manual cleanup required"));
        assert_eq!(fs::read(&source)?, b"keep me");
        assert_eq!(fs::read(&destination)?, b"keep me");
        Ok(())
    }

    #[test]
    fn directory_move_uses_rename_when_available() -> Result<()> {
        let temp = TempDir::new()?;
        let source = temp.path().join("set");
        sample_tree(&source)?;
        let destination = temp.path().join("out").join("moved");

        let report = SafeTransfer::default().move_path(&source, &destination, false)?;

        assert!(report.renamed);
        assert_eq!(report.digest, None);
        assert_eq!(report.bytes, 16);
        assert!(!source.exists());
        assert_eq!(fs::read(destination.join("a.tif"))?, b"first");
        Ok(())
    }

    #[test]
    fn directory_move_without_rename_verifies_whole_tree() -> Result<()> {
        let temp = TempDir::new()?;
        let source = temp.path().join("set");
        sample_tree(&source)?;
        let expected = digest_path(&source, DigestAlgorithm::Sha256)?;
        let destination = temp.path().join("out").join("moved");

        let report = SafeTransfer::default()
            .with_atomic_rename(false)
            .move_path(&source, &destination, false)?;

        assert!(!report.renamed);
        assert_eq!(report.digest, Some(expected.clone()));
        assert_eq!(digest_path(&destination, DigestAlgorithm::Sha256)?, expected);
        assert!(!source.exists());
        Ok(())
    }

    #[test]
    fn missing_source_and_same_path_are_rejected() -> Result<()> {
        let temp = TempDir::new()?;
        let missing = temp.path().join("missing.lsm");
        let err = SafeTransfer::default()
            .copy(&missing, &temp.path().join("out.lsm"), true)
            .expect_err("missing source");
        assert!(matches!(err, FsOpsError::MissingSource { .. }));

        let source = temp.path().join("a.lsm");
        write_file(&source, b"data")?;
        let err = SafeTransfer::default()
            .move_path(&source, &temp.path().join(".").join("a.lsm"), true)
            .expect_err("same path");
        assert!(matches!(err, FsOpsError::SamePath { .. }));
        assert_eq!(fs::read(&source)?, b"data");
        Ok(())
    }
}
