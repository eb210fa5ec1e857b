//! Event payload types carried from a running task to its observer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier assigned to each event published by a task.
pub type EventId = u64;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Prepared but not yet running.
    NotStarted,
    /// Processing rows on the worker.
    Running,
    /// Every row was attempted.
    Completed,
    /// Stopped early on request.
    Cancelled,
}

impl TaskState {
    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the state is final.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// Progress published after each processed row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Zero-based index of the last row processed.
    pub row_index: usize,
    /// Number of rows in the session.
    pub total_rows: usize,
    /// Percent complete, 0 to 100.
    pub percent: u8,
    /// Human-readable status line.
    pub status: String,
}

/// Terminal notice published once when a task finishes or is cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionNotice {
    /// Final state.
    pub state: TaskState,
    /// Number of failed rows.
    pub failures: usize,
    /// Rendered plain-text summary.
    pub summary: String,
}

/// Typed events published by a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// A row finished processing.
    Progress(ProgressSnapshot),
    /// The task reached a terminal state.
    Completed(CompletionNotice),
}

impl TaskEvent {
    /// Machine-friendly discriminator for consumers.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Progress(_) => "progress",
            Self::Completed(_) => "completed",
        }
    }

    /// Whether this is the terminal notice.
    #[must_use]
    pub const fn is_completion(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id, the
/// publishing task, and emission timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Sequential identifier assigned to the wrapped event, starting at 1.
    pub id: EventId,
    /// Task that published the event.
    pub task_id: Uuid,
    /// Timestamp recording when the envelope was produced.
    pub timestamp: DateTime<Utc>,
    /// Wrapped event payload.
    pub event: TaskEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_maps_variants() {
        let progress = TaskEvent::Progress(ProgressSnapshot {
            row_index: 0,
            total_rows: 2,
            percent: 50,
            status: "copied a.lsm".into(),
        });
        assert_eq!(progress.kind(), "progress");
        assert!(!progress.is_completion());

        let done = TaskEvent::Completed(CompletionNotice {
            state: TaskState::Cancelled,
            failures: 1,
            summary: String::new(),
        });
        assert_eq!(done.kind(), "completed");
        assert!(done.is_completion());
    }

    #[test]
    fn task_events_serialize_with_type_tag() -> anyhow::Result<()> {
        let event = TaskEvent::Completed(CompletionNotice {
            state: TaskState::Completed,
            failures: 0,
            summary: "done".into(),
        });
        let json = serde_json::to_value(&event)?;
        assert_eq!(json["type"], "completed");
        assert_eq!(json["state"], "completed");
        Ok(())
    }

    #[test]
    fn terminal_states_are_final() {
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Cancelled.is_terminal());
        assert!(!TaskState::Running.is_terminal());
        assert_eq!(TaskState::NotStarted.as_str(), "not_started");
    }
}
