//! Log entry streams
//!
//! The live channel between a provider (producer) and a caller
//! (consumer):
//! - Bounded buffering: when the consumer falls behind, `emit` suspends
//!   rather than dropping entries
//! - Two terminal signals distinct from entries: complete and error;
//!   after either, the stream is inert and late emissions are rejected
//! - Cooperative cancellation: the consumer can withdraw interest at any
//!   time, and dropping the consumer counts as cancellation
//!
//! Entries reach the consumer in exact emission order; the stream never
//! reorders.

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::warn;

use crate::domain::ServiceLogEntry;
use crate::provider::ProviderError;

/// How a stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTerminal {
    /// The producer finished delivering all requested entries.
    Completed,
    /// The producer failed; entries streamed beforehand remain valid.
    Failed(ProviderError),
    /// The consumer withdrew interest.
    Cancelled,
}

/// Why an emission was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitError {
    /// A terminal signal was already recorded; the stream is inert.
    #[error("stream already terminated")]
    Terminated,
    /// The consumer cancelled or went away.
    #[error("stream cancelled by the consumer")]
    Cancelled,
}

enum Event {
    Entry(ServiceLogEntry),
    Complete,
    Error(ProviderError),
}

/// State shared between the two ends: the single terminal outcome.
struct Shared {
    terminal: Mutex<Option<StreamTerminal>>,
}

impl Shared {
    fn terminal(&self) -> Option<StreamTerminal> {
        self.terminal.lock().unwrap().clone()
    }

    /// Records a terminal outcome if none exists yet. Returns whether
    /// this call won; losers are no-ops, so at most one terminal is
    /// ever observable.
    fn set_terminal(&self, terminal: StreamTerminal) -> bool {
        let mut slot = self.terminal.lock().unwrap();
        if slot.is_some() {
            return false;
        }
        *slot = Some(terminal);
        true
    }
}

/// Creates a connected sink/stream pair with the given buffer capacity.
///
/// Capacity must be at least 1; it bounds how far the producer can run
/// ahead of the consumer before `emit` suspends.
pub fn log_stream(capacity: usize) -> (LogSink, LogStream) {
    let (tx, rx) = mpsc::channel(capacity);
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let shared = Arc::new(Shared {
        terminal: Mutex::new(None),
    });

    let sink = LogSink {
        tx,
        cancel_rx,
        shared: Arc::clone(&shared),
    };
    let stream = LogStream {
        rx,
        cancel_tx,
        shared,
    };
    (sink, stream)
}

/// Producer end of a log stream, handed to the provider.
pub struct LogSink {
    tx: mpsc::Sender<Event>,
    cancel_rx: watch::Receiver<bool>,
    shared: Arc<Shared>,
}

impl LogSink {
    /// Pushes one entry to the consumer, suspending while the buffer is
    /// full. A suspended emit still observes cancellation and returns
    /// instead of waiting for the consumer to drain.
    ///
    /// Fails once the stream is terminal or the consumer is gone; a
    /// provider receiving an error must stop producing.
    pub async fn emit(&self, entry: ServiceLogEntry) -> Result<(), EmitError> {
        match self.shared.terminal() {
            Some(StreamTerminal::Cancelled) => return Err(EmitError::Cancelled),
            Some(_) => {
                warn!(
                    service = %entry.service_name,
                    "log entry emitted after stream terminal; dropping"
                );
                return Err(EmitError::Terminated);
            }
            None => {}
        }
        if self.is_cancelled() {
            self.shared.set_terminal(StreamTerminal::Cancelled);
            return Err(EmitError::Cancelled);
        }

        let mut cancel_rx = self.cancel_rx.clone();
        tokio::select! {
            sent = self.tx.send(Event::Entry(entry)) => sent.map_err(|_| {
                self.shared.set_terminal(StreamTerminal::Cancelled);
                EmitError::Cancelled
            }),
            _ = cancel_rx.wait_for(|cancelled| *cancelled) => {
                self.shared.set_terminal(StreamTerminal::Cancelled);
                Err(EmitError::Cancelled)
            }
        }
    }

    /// Signals that no more entries will follow, and reports the
    /// terminal that actually holds: a cancellation observed first wins
    /// over completion, and an earlier terminal is left untouched.
    pub async fn complete(&self) -> StreamTerminal {
        let won = if self.is_cancelled() {
            self.shared.set_terminal(StreamTerminal::Cancelled);
            false
        } else {
            self.shared.set_terminal(StreamTerminal::Completed)
        };
        if won {
            self.send_event(Event::Complete).await;
        }
        self.shared
            .terminal()
            .unwrap_or(StreamTerminal::Completed)
    }

    /// Signals a producer failure. No-op after any terminal.
    pub async fn fail(&self, error: ProviderError) {
        if !self
            .shared
            .set_terminal(StreamTerminal::Failed(error.clone()))
        {
            return;
        }
        self.send_event(Event::Error(error)).await;
    }

    /// Delivery failure is fine here: the terminal is already recorded
    /// in shared state, and the consumer's fallback paths read it from
    /// there.
    async fn send_event(&self, event: Event) {
        let mut cancel_rx = self.cancel_rx.clone();
        tokio::select! {
            _ = self.tx.send(event) => {}
            _ = cancel_rx.wait_for(|cancelled| *cancelled) => {}
        }
    }

    /// Whether the consumer has cancelled or gone away.
    pub fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow() || self.tx.is_closed()
    }

    /// Whether a terminal signal has been recorded.
    pub fn is_terminated(&self) -> bool {
        self.shared.terminal().is_some()
    }

    /// Resolves once the consumer cancels or drops the stream. Pending
    /// indefinitely otherwise; intended for `select!` against the
    /// provider's own I/O.
    pub async fn cancelled(&self) {
        let mut cancel_rx = self.cancel_rx.clone();
        tokio::select! {
            _ = self.tx.closed() => {}
            // An Err from wait_for means the consumer end is gone, which
            // is cancellation as well.
            _ = cancel_rx.wait_for(|cancelled| *cancelled) => {}
        }
    }
}

/// Consumer end of a log stream.
pub struct LogStream {
    rx: mpsc::Receiver<Event>,
    cancel_tx: watch::Sender<bool>,
    shared: Arc<Shared>,
}

impl LogStream {
    /// Receives the next entry, suspending until one is available.
    ///
    /// Returns `None` once the stream is terminal; [`LogStream::terminal`]
    /// then reports how it ended. After cancellation, buffered entries
    /// are discarded rather than delivered.
    pub async fn next(&mut self) -> Option<ServiceLogEntry> {
        if matches!(self.shared.terminal(), Some(StreamTerminal::Cancelled)) {
            return None;
        }

        match self.rx.recv().await {
            Some(Event::Entry(entry)) => Some(entry),
            Some(Event::Complete) => {
                self.shared.set_terminal(StreamTerminal::Completed);
                None
            }
            Some(Event::Error(error)) => {
                self.shared.set_terminal(StreamTerminal::Failed(error));
                None
            }
            None => {
                // Producer dropped the sink without signaling.
                self.shared.set_terminal(StreamTerminal::Failed(
                    ProviderError::other("provider dropped the log sink without completing"),
                ));
                None
            }
        }
    }

    /// Withdraws interest. The producer observes this on its next emit,
    /// in an emit suspended on backpressure, or through a `cancelled()`
    /// poll. After a terminal signal the terminal is untouched, but a
    /// producer still blocked on the full buffer is released anyway.
    pub fn cancel(&self) {
        self.shared.set_terminal(StreamTerminal::Cancelled);
        let _ = self.cancel_tx.send(true);
    }

    /// The terminal outcome, once the stream has ended.
    pub fn terminal(&self) -> Option<StreamTerminal> {
        self.shared.terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn entry(msg: &str) -> ServiceLogEntry {
        ServiceLogEntry::now("api", msg)
    }

    #[tokio::test]
    async fn test_entries_delivered_in_emission_order() {
        let (sink, mut stream) = log_stream(8);

        for msg in ["one", "two", "three"] {
            sink.emit(entry(msg)).await.unwrap();
        }
        sink.complete().await;

        assert_eq!(stream.next().await.unwrap().msg, "one");
        assert_eq!(stream.next().await.unwrap().msg, "two");
        assert_eq!(stream.next().await.unwrap().msg, "three");
        assert_eq!(stream.next().await, None);
        assert_eq!(stream.terminal(), Some(StreamTerminal::Completed));
    }

    #[tokio::test]
    async fn test_emit_after_complete_rejected() {
        let (sink, mut stream) = log_stream(8);

        assert!(!sink.is_terminated());
        assert_eq!(sink.complete().await, StreamTerminal::Completed);
        assert!(sink.is_terminated());

        assert_eq!(sink.emit(entry("late")).await, Err(EmitError::Terminated));
        assert_eq!(stream.next().await, None);
        assert_eq!(stream.terminal(), Some(StreamTerminal::Completed));
    }

    #[tokio::test]
    async fn test_blocked_emit_observes_cancellation() {
        let (sink, stream) = log_stream(1);
        sink.emit(entry("fills the buffer")).await.unwrap();

        let producer = tokio::spawn(async move { sink.emit(entry("blocked")).await });
        tokio::task::yield_now().await;

        // The consumer cancels but keeps the stream alive and never
        // drains, so only the cancellation signal can free the producer.
        stream.cancel();

        let result = timeout(Duration::from_secs(1), producer)
            .await
            .expect("blocked emit must return promptly after cancellation")
            .unwrap();
        assert_eq!(result, Err(EmitError::Cancelled));
        assert_eq!(stream.terminal(), Some(StreamTerminal::Cancelled));
    }

    #[tokio::test]
    async fn test_complete_after_cancellation_reports_cancelled() {
        let (sink, stream) = log_stream(8);

        stream.cancel();

        assert_eq!(sink.complete().await, StreamTerminal::Cancelled);
        assert!(sink.is_terminated());
        assert_eq!(stream.terminal(), Some(StreamTerminal::Cancelled));
    }

    #[tokio::test]
    async fn test_first_terminal_wins() {
        let (sink, stream) = log_stream(8);

        sink.fail(ProviderError::other("boom")).await;
        sink.complete().await;
        stream.cancel();

        assert_eq!(
            stream.terminal(),
            Some(StreamTerminal::Failed(ProviderError::other("boom")))
        );
    }

    #[tokio::test]
    async fn test_cancellation_stops_delivery() {
        let (sink, mut stream) = log_stream(8);

        sink.emit(entry("buffered")).await.unwrap();
        stream.cancel();

        // Buffered entries are discarded after cancellation.
        assert_eq!(stream.next().await, None);
        assert_eq!(sink.emit(entry("late")).await, Err(EmitError::Cancelled));
        assert!(sink.is_cancelled());
        assert_eq!(stream.terminal(), Some(StreamTerminal::Cancelled));
    }

    #[tokio::test]
    async fn test_dropped_consumer_counts_as_cancellation() {
        let (sink, stream) = log_stream(1);
        drop(stream);

        assert_eq!(sink.emit(entry("orphan")).await, Err(EmitError::Cancelled));
        assert!(sink.is_cancelled());
        sink.cancelled().await;
    }

    #[tokio::test]
    async fn test_dropped_sink_without_terminal_is_failure() {
        let (sink, mut stream) = log_stream(8);

        sink.emit(entry("only")).await.unwrap();
        drop(sink);

        assert_eq!(stream.next().await.unwrap().msg, "only");
        assert_eq!(stream.next().await, None);
        assert!(matches!(
            stream.terminal(),
            Some(StreamTerminal::Failed(_))
        ));
    }

    #[tokio::test]
    async fn test_backpressure_suspends_without_dropping() {
        let (sink, mut stream) = log_stream(2);

        let producer = tokio::spawn(async move {
            for i in 0..20 {
                sink.emit(entry(&format!("line {i}"))).await.unwrap();
            }
            sink.complete().await;
        });

        let mut received = Vec::new();
        while let Some(entry) = stream.next().await {
            // Slow consumer: the producer must suspend, never drop.
            tokio::task::yield_now().await;
            received.push(entry.msg);
        }
        producer.await.unwrap();

        assert_eq!(received.len(), 20);
        assert_eq!(received[0], "line 0");
        assert_eq!(received[19], "line 19");
        assert_eq!(stream.terminal(), Some(StreamTerminal::Completed));
    }

    #[tokio::test]
    async fn test_cancelled_future_resolves() {
        let (sink, stream) = log_stream(1);

        assert!(!sink.is_cancelled());
        stream.cancel();

        sink.cancelled().await;
        assert!(sink.is_cancelled());
    }
}
