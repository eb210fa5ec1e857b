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
#![allow(clippy::module_name_repetitions)]

//! Engine-agnostic rename interfaces and DTOs.
//!
//! Layout: `model/` (targets, fields, rows), `plugin.rs` (plugin capability
//! contracts and the plugin-facing row view), `error.rs` (row and plugin
//! errors).

pub mod error;
pub mod model;
pub mod plugin;

pub use error::{PluginError, PluginErrorKind, RowError};
pub use model::{Field, FieldLookup, Row, Target};
pub use plugin::{
    Plugin, PluginConfig, PluginRoles, PluginRow, RowEvent, RowListener, RowValidator,
    SessionInfo, SessionListener, SessionOutcome,
};
