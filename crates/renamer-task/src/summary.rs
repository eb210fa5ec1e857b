//! Per-row outcomes and the plain-text session summary.

use std::path::PathBuf;

/// Why a row failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// A plugin rejected the row content, or the transfer preconditions
    /// (missing source, existing destination) were not met.
    Data,
    /// A plugin or the filesystem reported an infrastructure failure.
    System,
    /// A plugin reported a configuration problem while processing the row.
    Configuration,
    /// The destination digest did not match; the destination was removed.
    Integrity,
    /// The move was verified but the source could not be removed.
    PartialSuccess,
}

impl FailureKind {
    /// Stable label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::System => "system",
            Self::Configuration => "configuration",
            Self::Integrity => "integrity",
            Self::PartialSuccess => "partial_success",
        }
    }
}

/// Result of processing one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// The target reached its destination and every plugin step passed.
    Succeeded {
        /// Bytes transferred.
        bytes: u64,
        /// Whether the move was a plain rename.
        renamed: bool,
    },
    /// The row stopped at the first failing step.
    Failed {
        /// Failure classification.
        kind: FailureKind,
        /// One-line reason shown in the summary.
        reason: String,
    },
}

/// Outcome of one row together with its paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowReport {
    /// Position of the row in the session.
    pub index: usize,
    /// Source path.
    pub source: PathBuf,
    /// Destination path, when it was computed.
    pub destination: Option<PathBuf>,
    /// What happened.
    pub outcome: RowOutcome,
}

impl RowReport {
    /// Whether the row succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, RowOutcome::Succeeded { .. })
    }

    /// Summary line: `OK   <source> -> <destination>` or `FAIL <source>: <reason>`.
    #[must_use]
    pub fn summary_line(&self) -> String {
        match &self.outcome {
            RowOutcome::Succeeded { .. } => {
                let destination = self
                    .destination
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_default();
                format!("OK   {} -> {destination}", self.source.display())
            }
            RowOutcome::Failed { reason, .. } => {
                format!("FAIL {}: {reason}", self.source.display())
            }
        }
    }

    /// Status line published with progress.
    #[must_use]
    pub fn status_line(&self, total: usize) -> String {
        let name = self
            .source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let verdict = if self.is_success() { "done" } else { "failed" };
        format!("{} of {total}: {name} {verdict}", self.index + 1)
    }
}

/// Running summary of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSummary {
    session: String,
    total: usize,
    succeeded: usize,
    failed: usize,
    lines: Vec<String>,
}

impl TaskSummary {
    /// Empty summary for `total` scheduled rows.
    pub fn new(session: impl Into<String>, total: usize) -> Self {
        Self {
            session: session.into(),
            total,
            succeeded: 0,
            failed: 0,
            lines: Vec::with_capacity(total),
        }
    }

    /// Append the line for `report`.
    pub fn record(&mut self, report: &RowReport) {
        if report.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.lines.push(report.summary_line());
    }

    /// Rows that succeeded so far.
    #[must_use]
    pub const fn succeeded(&self) -> usize {
        self.succeeded
    }

    /// Rows that failed so far.
    #[must_use]
    pub const fn failed(&self) -> usize {
        self.failed
    }

    /// Header line followed by one line per processed row.
    #[must_use]
    pub fn render(&self) -> String {
        let mut text = format!(
            "{}: {} succeeded, {} failed of {}\n",
            self.session, self.succeeded, self.failed, self.total
        );
        for line in &self.lines {
            text.push_str(line);
            text.push('\n');
        }
        text
    }
}
