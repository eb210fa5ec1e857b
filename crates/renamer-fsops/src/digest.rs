//! Streaming content digests for files and directory trees.
//!
//! A tree digest is a fold of every file's bytes, in [`TreeFiles`] order, into
//! a single hash context. Siblings are visited sorted by file name, so the
//! order is stable for a given tree regardless of how the filesystem returns
//! directory entries.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256, Sha512};
use walkdir::WalkDir;

use crate::error::{FsOpsError, FsOpsResult};

/// Hash algorithm used for transfer verification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// SHA-256.
    #[default]
    Sha256,
    /// SHA-512.
    Sha512,
}

impl DigestAlgorithm {
    /// Stable label used in configuration and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// Digest an in-memory buffer.
    #[must_use]
    pub fn digest_bytes(self, bytes: &[u8]) -> Digest {
        let mut context = DigestContext::new(self);
        context.update(bytes);
        context.finish()
    }
}

/// Opaque fixed-length hash of some content.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    algorithm: DigestAlgorithm,
    bytes: Vec<u8>,
}

impl Digest {
    /// Algorithm that produced the digest.
    #[must_use]
    pub const fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.bytes {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({}:{self})", self.algorithm.as_str())
    }
}

/// Incremental hash context.
pub(crate) enum DigestContext {
    Sha256(Sha256),
    Sha512(Sha512),
}

impl DigestContext {
    pub(crate) fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            DigestAlgorithm::Sha512 => Self::Sha512(Sha512::new()),
        }
    }

    pub(crate) fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Sha256(hasher) => hasher.update(bytes),
            Self::Sha512(hasher) => hasher.update(bytes),
        }
    }

    pub(crate) fn finish(self) -> Digest {
        match self {
            Self::Sha256(hasher) => Digest {
                algorithm: DigestAlgorithm::Sha256,
                bytes: hasher.finalize().to_vec(),
            },
            Self::Sha512(hasher) => Digest {
                algorithm: DigestAlgorithm::Sha512,
                bytes: hasher.finalize().to_vec(),
            },
        }
    }
}

/// Lazily yields the files under a path in deterministic pre-order.
///
/// A file path yields itself. Directories are descended, siblings sorted by
/// file name; only non-directory entries are produced.
pub struct TreeFiles {
    root: PathBuf,
    inner: walkdir::IntoIter,
}

impl Iterator for TreeFiles {
    type Item = FsOpsResult<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Ok(entry) if entry.file_type().is_dir() => {}
                Ok(entry) => return Some(Ok(entry.into_path())),
                Err(source) => {
                    return Some(Err(FsOpsError::walkdir("tree_files.walk", &self.root, source)));
                }
            }
        }
    }
}

/// Files under `root` in digest order.
#[must_use]
pub fn tree_files(root: &Path) -> TreeFiles {
    TreeFiles {
        root: root.to_path_buf(),
        inner: WalkDir::new(root).sort_by_file_name().into_iter(),
    }
}

/// Feed one file into `context`, returning the number of bytes read.
pub(crate) fn feed_file(
    context: &mut DigestContext,
    path: &Path,
    buffer: &mut [u8],
) -> FsOpsResult<u64> {
    let mut file =
        File::open(path).map_err(|source| FsOpsError::io("digest.open", path, source))?;
    let mut total = 0u64;
    loop {
        let read = file
            .read(buffer)
            .map_err(|source| FsOpsError::io("digest.read", path, source))?;
        if read == 0 {
            break;
        }
        context.update(&buffer[..read]);
        total += read as u64;
    }
    Ok(total)
}

/// Digest of a file, or of every file under a directory folded in
/// [`tree_files`] order.
///
/// # Errors
///
/// Returns an error when the path is missing or any file cannot be read.
pub fn digest_path(path: &Path, algorithm: DigestAlgorithm) -> FsOpsResult<Digest> {
    if !path.exists() {
        return Err(FsOpsError::MissingSource {
            path: path.to_path_buf(),
        });
    }
    let mut buffer = vec![0u8; crate::transfer::DEFAULT_BUFFER_SIZE];
    let context = tree_files(path).try_fold(
        DigestContext::new(algorithm),
        |mut context, file| -> FsOpsResult<DigestContext> {
            feed_file(&mut context, &file?, &mut buffer)?;
            Ok(context)
        },
    )?;
    Ok(context.finish())
}
