//! Notification channel error primitives.

use crate::payloads::EventId;
use std::fmt::{self, Display, Formatter};

/// Error emitted when publishing a task event fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventBusError {
    /// The completion notice was already published; the channel is sealed.
    AfterCompletion {
        /// Event kind that was refused.
        event_kind: &'static str,
    },
    /// The consumer dropped its end of the channel.
    SendFailed {
        /// Identifier assigned to the event.
        event_id: EventId,
        /// Event kind string for filtering in logs.
        event_kind: &'static str,
    },
}

impl EventBusError {
    /// Identifier assigned to the event, when one was allocated.
    #[must_use]
    pub const fn event_id(&self) -> Option<EventId> {
        match self {
            Self::AfterCompletion { .. } => None,
            Self::SendFailed { event_id, .. } => Some(*event_id),
        }
    }

    /// Event kind string associated with the failed delivery.
    #[must_use]
    pub const fn event_kind(&self) -> &'static str {
        match self {
            Self::AfterCompletion { event_kind } | Self::SendFailed { event_kind, .. } => {
                event_kind
            }
        }
    }
}

impl Display for EventBusError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::AfterCompletion { .. } => formatter.write_str("event published after completion"),
            Self::SendFailed { .. } => formatter.write_str("event channel send failed"),
        }
    }
}

impl std::error::Error for EventBusError {}

/// Result wrapper for notification operations.
pub type EventBusResult<T> = Result<T, EventBusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_bus_error_exposes_fields() {
        let err = EventBusError::SendFailed {
            event_id: 42,
            event_kind: "progress",
        };
        assert_eq!(err.event_id(), Some(42));
        assert_eq!(err.event_kind(), "progress");
        assert_eq!(err.to_string(), "event channel send failed");

        let sealed = EventBusError::AfterCompletion {
            event_kind: "progress",
        };
        assert_eq!(sealed.event_id(), None);
        assert_eq!(sealed.to_string(), "event published after completion");
    }
}
