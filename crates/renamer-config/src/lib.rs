#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Project configuration for rename sessions.
//!
//! Layout: `model.rs` (project file and transfer settings), `output.rs`
//! (output directory rules, verification and derivation), `error.rs`.

pub mod error;
pub mod model;
pub mod output;

pub use error::{ConfigError, ConfigResult};
pub use model::{ProjectConfig, TransferMode, TransferSettings};
pub use output::{OutputDirectoryConfig, PathComponent, VerifiedOutputDirectory};
pub use renamer_core::PluginConfig;
