//! Progress and completion notification for rename tasks.
//!
//! A task publishes onto an unbounded channel so the worker never waits on a
//! slow or absent observer. Each envelope carries a sequential identifier.
//! The completion notice is the terminal message on the same channel: once it
//! has been published the publisher refuses everything else, so an observer
//! never sees progress after completion.
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

pub mod error;
pub mod payloads;

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::mpsc::error::TryRecvError;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

pub use error::{EventBusError, EventBusResult};
pub use payloads::{
    CompletionNotice, EventEnvelope, EventId, ProgressSnapshot, TaskEvent, TaskState,
};

/// Create a connected publisher/stream pair for `task_id`.
#[must_use]
pub fn channel(task_id: Uuid) -> (EventPublisher, EventStream) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        EventPublisher {
            task_id,
            sender,
            state: Mutex::new(PublisherState {
                next_id: 1,
                completed: false,
            }),
        },
        EventStream { receiver },
    )
}

/// Producer half owned by the task worker.
#[derive(Debug)]
pub struct EventPublisher {
    task_id: Uuid,
    sender: UnboundedSender<EventEnvelope>,
    state: Mutex<PublisherState>,
}

/// Sequencing state; held across the send so ids and the completion seal
/// match channel order.
#[derive(Debug)]
struct PublisherState {
    next_id: EventId,
    completed: bool,
}

impl EventPublisher {
    /// Task the publisher belongs to.
    #[must_use]
    pub const fn task_id(&self) -> Uuid {
        self.task_id
    }

    /// Whether the completion notice has been published.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.lock_state().completed
    }

    fn lock_state(&self) -> MutexGuard<'_, PublisherState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish a progress snapshot.
    ///
    /// # Errors
    ///
    /// See [`Self::publish`].
    pub fn progress(&self, snapshot: ProgressSnapshot) -> EventBusResult<EventId> {
        self.publish(TaskEvent::Progress(snapshot))
    }

    /// Publish the terminal completion notice.
    ///
    /// # Errors
    ///
    /// See [`Self::publish`].
    pub fn complete(&self, notice: CompletionNotice) -> EventBusResult<EventId> {
        self.publish(TaskEvent::Completed(notice))
    }

    /// Publish an event, assigning it the next sequential identifier.
    ///
    /// Never waits on the consumer. The completion check and the send happen
    /// under one lock.
    ///
    /// # Errors
    ///
    /// - [`EventBusError::AfterCompletion`] once a completion has been published.
    /// - [`EventBusError::SendFailed`] when the stream has been dropped.
    pub fn publish(&self, event: TaskEvent) -> EventBusResult<EventId> {
        let event_kind = event.kind();
        let mut state = self.lock_state();
        if state.completed {
            return Err(EventBusError::AfterCompletion { event_kind });
        }
        if event.is_completion() {
            state.completed = true;
        }

        let id = state.next_id;
        state.next_id += 1;
        let envelope = EventEnvelope {
            id,
            task_id: self.task_id,
            timestamp: Utc::now(),
            event,
        };
        let sent = self.sender.send(envelope);
        drop(state);
        sent.map_err(|_| EventBusError::SendFailed {
            event_id: id,
            event_kind,
        })?;
        Ok(id)
    }
}

/// Everything that was queued when the observer last looked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBatch {
    /// Most recent progress envelope in the batch.
    pub latest_progress: Option<EventEnvelope>,
    /// Completion envelope, when the batch contains it.
    pub completion: Option<EventEnvelope>,
    /// Number of envelopes the batch coalesced.
    pub received: usize,
}

impl EventBatch {
    /// Whether the batch ends the task's event sequence.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        self.completion.is_some()
    }

    /// Latest progress payload, when present.
    #[must_use]
    pub fn progress(&self) -> Option<&ProgressSnapshot> {
        match self.latest_progress.as_ref().map(|envelope| &envelope.event) {
            Some(TaskEvent::Progress(snapshot)) => Some(snapshot),
            _ => None,
        }
    }

    /// Completion payload, when present.
    #[must_use]
    pub fn notice(&self) -> Option<&CompletionNotice> {
        match self.completion.as_ref().map(|envelope| &envelope.event) {
            Some(TaskEvent::Completed(notice)) => Some(notice),
            _ => None,
        }
    }

    fn absorb(&mut self, envelope: EventEnvelope) {
        self.received += 1;
        if envelope.event.is_completion() {
            self.completion = Some(envelope);
        } else {
            self.latest_progress = Some(envelope);
        }
    }
}

/// Consumer half held by the observer.
#[derive(Debug)]
pub struct EventStream {
    receiver: UnboundedReceiver<EventEnvelope>,
}

impl EventStream {
    /// Receive the next envelope; `None` once the publisher is gone and the
    /// queue is drained.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        self.receiver.recv().await
    }

    /// Wait for at least one envelope, then drain everything already queued.
    ///
    /// Only the latest progress snapshot is kept. Returns `None` once the
    /// publisher is gone and nothing remains.
    pub async fn next_batch(&mut self) -> Option<EventBatch> {
        let first = self.receiver.recv().await?;
        let mut batch = EventBatch {
            latest_progress: None,
            completion: None,
            received: 0,
        };
        batch.absorb(first);
        loop {
            match self.receiver.try_recv() {
                Ok(envelope) => batch.absorb(envelope),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        Some(batch)
    }

    /// Adapt into a `tokio_stream::Stream`.
    #[must_use]
    pub fn into_stream(self) -> UnboundedReceiverStream<EventEnvelope> {
        UnboundedReceiverStream::new(self.receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tokio_stream::StreamExt;

    fn snapshot(row_index: usize) -> ProgressSnapshot {
        ProgressSnapshot {
            row_index,
            total_rows: 10,
            percent: u8::try_from((row_index + 1) * 10).unwrap_or(100),
            status: format!("row {row_index}"),
        }
    }

    fn notice() -> CompletionNotice {
        CompletionNotice {
            state: TaskState::Completed,
            failures: 0,
            summary: "done".into(),
        }
    }

    #[tokio::test]
    async fn envelopes_carry_sequential_ids_and_task() -> anyhow::Result<()> {
        let task_id = Uuid::new_v4();
        let (publisher, mut stream) = channel(task_id);
        assert_eq!(publisher.progress(snapshot(0))?, 1);
        assert_eq!(publisher.progress(snapshot(1))?, 2);

        let first = stream.next().await.expect("first envelope");
        assert_eq!(first.id, 1);
        assert_eq!(first.task_id, task_id);
        let second = stream.next().await.expect("second envelope");
        assert_eq!(second.id, 2);
        Ok(())
    }

    #[tokio::test]
    async fn nothing_is_published_after_completion() -> anyhow::Result<()> {
        let (publisher, mut stream) = channel(Uuid::new_v4());
        publisher.progress(snapshot(0))?;
        publisher.complete(notice())?;
        assert!(publisher.is_completed());

        let err = publisher
            .progress(snapshot(1))
            .expect_err("progress after completion");
        assert!(matches!(err, EventBusError::AfterCompletion { .. }));
        let err = publisher.complete(notice()).expect_err("second completion");
        assert_eq!(err.event_kind(), "completed");
        drop(publisher);

        let mut kinds = Vec::new();
        while let Some(envelope) = stream.next().await {
            kinds.push(envelope.event.kind());
        }
        assert_eq!(kinds, ["progress", "completed"]);
        Ok(())
    }

    #[tokio::test]
    async fn batches_keep_latest_progress_and_completion() -> anyhow::Result<()> {
        let (publisher, mut stream) = channel(Uuid::new_v4());
        for row in 0..5 {
            publisher.progress(snapshot(row))?;
        }
        publisher.complete(notice())?;

        let batch = stream.next_batch().await.expect("batch");
        assert_eq!(batch.received, 6);
        assert_eq!(batch.progress().map(|p| p.row_index), Some(4));
        assert!(batch.is_final());
        assert_eq!(batch.notice().map(|n| n.failures), Some(0));

        drop(publisher);
        assert!(stream.next_batch().await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn dropped_consumer_never_blocks_the_publisher() {
        let (publisher, stream) = channel(Uuid::new_v4());
        drop(stream);
        let err = publisher
            .progress(snapshot(0))
            .expect_err("send to dropped stream");
        assert_eq!(err.event_id(), Some(1));
        assert!(matches!(err, EventBusError::SendFailed { .. }));
    }

    #[tokio::test]
    async fn racing_publishers_never_follow_completion() -> anyhow::Result<()> {
        let (publisher, stream) = channel(Uuid::new_v4());
        let publisher = std::sync::Arc::new(publisher);
        let senders: Vec<_> = (0..4)
            .map(|_| {
                let publisher = std::sync::Arc::clone(&publisher);
                thread::spawn(move || {
                    for row in 0..200 {
                        if publisher.progress(snapshot(row)).is_err() {
                            break;
                        }
                    }
                })
            })
            .collect();
        publisher.complete(notice())?;
        for sender in senders {
            sender.join().expect("sender panicked");
        }
        drop(publisher);

        let envelopes: Vec<_> = stream.into_stream().collect().await;
        let last = envelopes.last().expect("completion envelope");
        assert!(last.event.is_completion());
        assert_eq!(
            envelopes
                .iter()
                .filter(|envelope| envelope.event.is_completion())
                .count(),
            1
        );
        assert!(envelopes.windows(2).all(|pair| pair[0].id < pair[1].id));
        Ok(())
    }

    #[tokio::test]
    async fn worker_thread_progress_arrives_in_order() -> anyhow::Result<()> {
        let (publisher, stream) = channel(Uuid::new_v4());
        let worker = thread::spawn(move || -> EventBusResult<()> {
            for row in 0..100 {
                publisher.progress(snapshot(row))?;
            }
            publisher.complete(notice())?;
            Ok(())
        });

        let envelopes: Vec<_> = stream.into_stream().collect().await;
        worker.join().expect("worker panicked")?;

        assert_eq!(envelopes.len(), 101);
        let rows: Vec<_> = envelopes
            .iter()
            .filter_map(|envelope| match &envelope.event {
                TaskEvent::Progress(snapshot) => Some(snapshot.row_index),
                TaskEvent::Completed(_) => None,
            })
            .collect();
        assert!(rows.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(envelopes.last().is_some_and(|e| e.event.is_completion()));
        Ok(())
    }
}
