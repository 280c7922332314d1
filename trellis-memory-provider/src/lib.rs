//! In-memory log provider
//!
//! Reference implementation of the service-logs contract backed by
//! per-service in-memory history plus a live feed. Used as the test
//! double for the contract's scenario suite and as the template for
//! real backends: the tail window, start-time filter, follow loop, and
//! cancellation handling here are exactly what an environment-specific
//! provider must reproduce against its own log source.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use trellis_core::domain::{LogQuery, ServiceLogEntry};
use trellis_core::provider::{LogProvider, ProviderError};
use trellis_core::stream::LogSink;

/// Default number of buffered live entries per service before a slow
/// follower overflows the feed.
const FEED_CAPACITY: usize = 256;

struct ServiceLog {
    history: Vec<ServiceLogEntry>,
    feed: broadcast::Sender<ServiceLogEntry>,
}

impl ServiceLog {
    fn new(feed_capacity: usize) -> Self {
        let (feed, _) = broadcast::channel(feed_capacity);
        Self {
            history: Vec::new(),
            feed,
        }
    }
}

/// A [`LogProvider`] over in-memory per-service logs.
///
/// Entries pushed while a follow query is active reach its stream live;
/// entries pushed before are served as history. A single lock orders
/// pushes against subscription, so a follow stream sees every entry
/// exactly once. A follow stream that falls so far behind that the live
/// feed overflows is failed rather than silently thinned: log fidelity
/// wins over keeping a lossy stream open.
pub struct MemoryLogProvider {
    services: Mutex<HashMap<String, ServiceLog>>,
    feed_capacity: usize,
}

impl MemoryLogProvider {
    pub fn new() -> Self {
        Self::with_feed_capacity(FEED_CAPACITY)
    }

    /// Creates a provider with a specific per-service live-feed capacity.
    pub fn with_feed_capacity(feed_capacity: usize) -> Self {
        Self {
            services: Mutex::new(HashMap::new()),
            feed_capacity,
        }
    }

    /// Registers a service with no log history yet. Querying an
    /// unregistered service fails with [`ProviderError::ServiceNotFound`].
    pub fn register_service(&self, name: impl Into<String>) {
        let mut services = self.services.lock().unwrap();
        services
            .entry(name.into())
            .or_insert_with(|| ServiceLog::new(self.feed_capacity));
    }

    /// Appends an entry to its service's history and publishes it to any
    /// active followers. Registers the service if needed.
    pub fn push(&self, entry: ServiceLogEntry) {
        let mut services = self.services.lock().unwrap();
        let log = services
            .entry(entry.service_name.clone())
            .or_insert_with(|| ServiceLog::new(self.feed_capacity));
        log.history.push(entry.clone());
        // No receiver is fine: the entry is already in history.
        let _ = log.feed.send(entry);
    }

    /// Number of follow streams currently subscribed to a service.
    pub fn live_listeners(&self, service: &str) -> usize {
        let services = self.services.lock().unwrap();
        services
            .get(service)
            .map(|log| log.feed.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for MemoryLogProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LogProvider for MemoryLogProvider {
    async fn service_logs(&self, query: &LogQuery, sink: &LogSink) -> Result<(), ProviderError> {
        // Snapshot history and subscribe under one lock acquisition, so
        // every push lands either in the snapshot or on the feed.
        let (history, live) = {
            let services = self.services.lock().unwrap();
            let Some(log) = services.get(&query.service_name) else {
                return Err(ProviderError::ServiceNotFound(query.service_name.clone()));
            };
            let live = query.follow.then(|| log.feed.subscribe());
            (log.history.clone(), live)
        };

        let mut window: Vec<ServiceLogEntry> =
            history.into_iter().filter(|e| query.includes(e)).collect();
        if query.has_tail() {
            let keep = query.tail as usize;
            if window.len() > keep {
                // Most recent entries win; delivery stays oldest-first.
                window.drain(..window.len() - keep);
            }
        }

        for entry in window {
            if sink.emit(entry).await.is_err() {
                debug!(service = %query.service_name, "stream closed during history replay");
                return Ok(());
            }
        }

        let Some(mut live) = live else {
            return Ok(());
        };

        loop {
            tokio::select! {
                _ = sink.cancelled() => {
                    debug!(service = %query.service_name, "cancellation observed; leaving follow loop");
                    return Ok(());
                }
                received = live.recv() => match received {
                    Ok(entry) if query.includes(&entry) => {
                        if sink.emit(entry).await.is_err() {
                            return Ok(());
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(
                            service = %query.service_name,
                            skipped,
                            "follow stream overflowed the live feed; failing the stream"
                        );
                        return Err(ProviderError::other(format!(
                            "live log feed for {} overflowed; {} entries were lost",
                            query.service_name, skipped
                        )));
                    }
                    Err(broadcast::error::RecvError::Closed) => return Ok(()),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use trellis_core::domain::TAIL_ALL;
    use trellis_core::stream::{StreamTerminal, log_stream};

    fn entry_at(minute: u32, msg: &str) -> ServiceLogEntry {
        ServiceLogEntry {
            service_name: "api".to_string(),
            timestamp: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()),
            msg: msg.to_string(),
        }
    }

    fn seeded_provider() -> MemoryLogProvider {
        let provider = MemoryLogProvider::new();
        provider.push(entry_at(1, "first"));
        provider.push(entry_at(2, "second"));
        provider.push(entry_at(3, "third"));
        provider
    }

    async fn collect(provider: &MemoryLogProvider, query: &LogQuery) -> Vec<String> {
        let (sink, mut stream) = log_stream(8);
        provider.service_logs(query, &sink).await.unwrap();
        sink.complete().await;

        let mut messages = Vec::new();
        while let Some(entry) = stream.next().await {
            messages.push(entry.msg);
        }
        messages
    }

    #[tokio::test]
    async fn test_full_history_in_order() {
        let provider = seeded_provider();

        let messages = collect(&provider, &LogQuery::new("api")).await;

        assert_eq!(messages, ["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_tail_keeps_most_recent_oldest_first() {
        let provider = seeded_provider();
        let mut query = LogQuery::new("api");
        query.tail = 2;

        let messages = collect(&provider, &query).await;

        assert_eq!(messages, ["second", "third"]);
    }

    #[tokio::test]
    async fn test_start_time_filters_history() {
        let provider = seeded_provider();
        let mut query = LogQuery::new("api");
        query.start_time = Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 2, 0).unwrap());

        let messages = collect(&provider, &query).await;

        // The boundary entry is as-new-as start_time and stays.
        assert_eq!(messages, ["second", "third"]);
    }

    #[tokio::test]
    async fn test_tail_window_applies_after_start_time() {
        let provider = seeded_provider();
        let mut query = LogQuery::new("api");
        query.start_time = Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 2, 0).unwrap());
        query.tail = 1;

        let messages = collect(&provider, &query).await;

        assert_eq!(messages, ["third"]);
    }

    #[tokio::test]
    async fn test_unknown_service() {
        let provider = MemoryLogProvider::new();
        let (sink, _stream) = log_stream(8);

        let err = provider
            .service_logs(&LogQuery::new("ghost"), &sink)
            .await
            .unwrap_err();

        assert_eq!(err, ProviderError::ServiceNotFound("ghost".to_string()));
    }

    #[tokio::test]
    async fn test_registered_empty_service_completes_with_no_entries() {
        let provider = MemoryLogProvider::new();
        provider.register_service("api");

        let messages = collect(&provider, &LogQuery::new("api")).await;

        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_stream_ends_history_replay_early() {
        let provider = seeded_provider();
        let (sink, stream) = log_stream(8);
        stream.cancel();

        // Cancellation during replay is a clean stop, not an error.
        provider
            .service_logs(&LogQuery::new("api"), &sink)
            .await
            .unwrap();

        assert_eq!(stream.terminal(), Some(StreamTerminal::Cancelled));
    }

    #[tokio::test]
    async fn test_tail_all_sentinel_means_everything() {
        let provider = seeded_provider();
        let mut query = LogQuery::new("api");
        query.tail = TAIL_ALL;

        let messages = collect(&provider, &query).await;

        assert_eq!(messages.len(), 3);
    }
}
