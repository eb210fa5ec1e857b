//! Rename session engine: per-row state machine, cancellation, and summary.
//!
//! A [`TaskBuilder`] checks configuration synchronously and yields a
//! [`Task`]. Starting the task notifies session listeners and hands the row
//! loop to a dedicated worker thread; the caller observes it through the
//! [`renamer_events`] channel in the returned [`TaskHandle`].
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

pub mod cancel;
pub mod engine;
pub mod error;
pub mod progress;
pub mod summary;

pub use cancel::CancelToken;
pub use engine::{Task, TaskBuilder, TaskHandle, TaskReport};
pub use error::{TaskError, TaskResult};
pub use progress::ProgressTracker;
pub use summary::{FailureKind, RowOutcome, RowReport, TaskSummary};
pub use renamer_events::TaskState;
