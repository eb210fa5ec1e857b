//! Verified filesystem transfers for rename sessions.
#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions, clippy::multiple_crate_versions)]

pub mod digest;
pub mod error;
pub mod transfer;

pub use digest::{Digest, DigestAlgorithm, TreeFiles, digest_path, tree_files};
pub use error::{FsOpsError, FsOpsResult};
pub use transfer::{DEFAULT_BUFFER_SIZE, SafeTransfer, TransferReport};
