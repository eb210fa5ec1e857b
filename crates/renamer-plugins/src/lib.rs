#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Plugin event pipeline and the built-in plugins.
//!
//! Layout: `pipeline.rs` (role dispatch), `registry.rs` (kind to factory
//! table, initialisation), `builtin/` (shipped plugins).

pub mod builtin;
pub mod pipeline;
pub mod registry;

pub use builtin::{FieldPattern, RequiredFields, SequenceNumber, SummaryFile};
pub use pipeline::PluginPipeline;
pub use registry::{PluginFactory, PluginRegistry};
