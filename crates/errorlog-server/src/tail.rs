//! Tail queries: history replay followed by live delivery
//!
//! A query moves through [`TailPhase::ReplayingHistory`],
//! [`TailPhase::Live`] and [`TailPhase::Closed`], in that order.
//!
//! The live mailbox is registered before the history scan starts and the
//! scan stops at the log length observed at that moment. Live events for
//! blocks below that offset were already covered by the scan and are
//! skipped, so the switch between phases neither loses nor repeats a
//! record. History is delivered newest first, live records in arrival
//! order.

use std::fmt;

use async_trait::async_trait;
use errorlog_core::{
    Broadcaster, Listener, LogEvent, ServiceFilter, StoredRecord, TailSink, TransportError,
};
use errorlog_logging::spans;
use errorlog_storage::RecordLog;
use tokio::sync::{mpsc, watch};
use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;

use crate::error::ServerResult;

/// Phase of a tail query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailPhase {
    /// Sending matching records from the log, newest first
    ReplayingHistory,
    /// Forwarding matching records as they are published
    Live,
    /// Finished
    Closed,
}

impl fmt::Display for TailPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TailPhase::ReplayingHistory => "replaying_history",
            TailPhase::Live => "live",
            TailPhase::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Outcome of a finished tail query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TailSummary {
    pub query_id: Uuid,
    /// Records sent during history replay
    pub history_sent: usize,
    /// Records sent while live
    pub live_sent: usize,
}

/// One tail query under a fixed filter
pub struct TailQuery {
    id: Uuid,
    filter: ServiceFilter,
    max_history: usize,
    phase: watch::Sender<TailPhase>,
}

impl TailQuery {
    pub fn new(filter: ServiceFilter, max_history: usize) -> Self {
        let (phase, _) = watch::channel(TailPhase::ReplayingHistory);
        Self {
            id: Uuid::new_v4(),
            filter,
            max_history,
            phase,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn filter(&self) -> &ServiceFilter {
        &self.filter
    }

    pub fn phase(&self) -> TailPhase {
        *self.phase.borrow()
    }

    /// Watch phase transitions from another task
    pub fn watch_phase(&self) -> watch::Receiver<TailPhase> {
        self.phase.subscribe()
    }

    /// Run the query against `log` and `broadcaster` until `sink` closes
    ///
    /// A sink reporting [`TransportError::ConnectionClosed`] ends the query
    /// with `Ok`; any other sink error or a storage failure ends it with
    /// that error. The query is [`TailPhase::Closed`] afterwards either way.
    pub async fn run<S>(
        &mut self,
        log: &RecordLog,
        broadcaster: &Broadcaster<LogEvent>,
        sink: &mut S,
    ) -> ServerResult<TailSummary>
    where
        S: TailSink + ?Sized,
    {
        let span = info_span!(
            spans::READ_LOG,
            query_id = %self.id,
            services = ?self.filter.services(),
        );
        let result = self.run_phases(log, broadcaster, sink).instrument(span).await;
        self.set_phase(TailPhase::Closed);
        result
    }

    async fn run_phases<S>(
        &self,
        log: &RecordLog,
        broadcaster: &Broadcaster<LogEvent>,
        sink: &mut S,
    ) -> ServerResult<TailSummary>
    where
        S: TailSink + ?Sized,
    {
        let mut summary = TailSummary {
            query_id: self.id,
            history_sent: 0,
            live_sent: 0,
        };

        let subscription = broadcaster.register(format!("tail-{}", self.id));
        let boundary = log.len().await;
        info!(offset = boundary, "Tail query started");

        self.set_phase(TailPhase::ReplayingHistory);
        let replay = self
            .replay_history(log, boundary, sink, &mut summary)
            .instrument(info_span!(spans::REPLAY_HISTORY))
            .await;
        match replay {
            Ok(true) => {}
            Ok(false) => {
                info!(
                    matched = summary.history_sent,
                    "Tail sink closed during history replay"
                );
                return Ok(summary);
            }
            Err(e) => return Err(e),
        }

        self.set_phase(TailPhase::Live);
        let mut listener = LiveListener {
            filter: &self.filter,
            boundary,
            sink,
            sent: 0,
        };
        let result = subscription
            .run(&mut listener)
            .instrument(info_span!(spans::LIVE_TAIL))
            .await;
        summary.live_sent = listener.sent;

        info!(
            history = summary.history_sent,
            live = summary.live_sent,
            "Tail query finished"
        );
        result?;
        Ok(summary)
    }

    /// Returns `Ok(false)` if the sink closed
    async fn replay_history<S>(
        &self,
        log: &RecordLog,
        boundary: u64,
        sink: &mut S,
        summary: &mut TailSummary,
    ) -> ServerResult<bool>
    where
        S: TailSink + ?Sized,
    {
        let mut scan = log
            .history_scan_before(self.filter.clone(), boundary)
            .await?;

        while summary.history_sent < self.max_history {
            let Some(record) = scan.next_match().await? else {
                break;
            };
            match sink.send(&record).await {
                Ok(()) => summary.history_sent += 1,
                Err(e) if e.is_end_of_stream() => return Ok(false),
                Err(e) => return Err(e.into()),
            }
        }

        debug!(
            matched = summary.history_sent,
            scanned = scan.blocks_scanned(),
            "History replay complete"
        );
        Ok(true)
    }

    fn set_phase(&self, phase: TailPhase) {
        self.phase.send_replace(phase);
        debug!(phase = %phase, "Tail phase changed");
    }
}

/// Forwards published records that match the query filter
struct LiveListener<'a, S: ?Sized> {
    filter: &'a ServiceFilter,
    /// Blocks below this offset were covered by history replay
    boundary: u64,
    sink: &'a mut S,
    sent: usize,
}

#[async_trait]
impl<S> Listener<LogEvent> for LiveListener<'_, S>
where
    S: TailSink + ?Sized,
{
    async fn deliver(&mut self, event: LogEvent) -> Result<(), TransportError> {
        if event.offset < self.boundary || !self.filter.matches(&event.record) {
            return Ok(());
        }
        self.sink.send(&event.record).await?;
        self.sent += 1;
        Ok(())
    }
}

/// A [`TailSink`] feeding a bounded in-process channel
///
/// Dropping the receiver closes the sink.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<StoredRecord>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<StoredRecord>) -> Self {
        Self { tx }
    }
}

/// Create a [`ChannelSink`] and the receiver it feeds
pub fn channel_sink(capacity: usize) -> (ChannelSink, mpsc::Receiver<StoredRecord>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelSink::new(tx), rx)
}

#[async_trait]
impl TailSink for ChannelSink {
    async fn send(&mut self, record: &StoredRecord) -> Result<(), TransportError> {
        self.tx
            .send(record.clone())
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use errorlog_core::ErrorLogRequest;
    use errorlog_storage::RecordLogConfig;
    use tempfile::TempDir;

    fn record(service: &str, n: u32) -> StoredRecord {
        StoredRecord::new(ErrorLogRequest::new(service, "Call").with_timestamp(n))
    }

    async fn open_log(temp: &TempDir) -> RecordLog {
        RecordLog::open(RecordLogConfig::new(temp.path()).with_sync_on_write(false))
            .await
            .unwrap()
    }

    /// Sink that closes after accepting `limit` records
    struct LimitedSink {
        received: Vec<u32>,
        limit: usize,
    }

    #[async_trait]
    impl TailSink for LimitedSink {
        async fn send(&mut self, record: &StoredRecord) -> Result<(), TransportError> {
            if self.received.len() == self.limit {
                return Err(TransportError::ConnectionClosed);
            }
            self.received.push(record.request.timestamp);
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl TailSink for FailingSink {
        async fn send(&mut self, _record: &StoredRecord) -> Result<(), TransportError> {
            Err(TransportError::SendFailed("broken pipe".to_string()))
        }
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(TailPhase::ReplayingHistory.to_string(), "replaying_history");
        assert_eq!(TailPhase::Live.to_string(), "live");
        assert_eq!(TailPhase::Closed.to_string(), "closed");
    }

    #[tokio::test]
    async fn test_sink_closed_during_history() {
        let temp = TempDir::new().unwrap();
        let log = open_log(&temp).await;
        for i in 0..10 {
            log.append(&record("a.A", i)).await.unwrap();
        }
        let broadcaster = Broadcaster::new();

        let mut query = TailQuery::new(ServiceFilter::all(), 100);
        let mut sink = LimitedSink {
            received: vec![],
            limit: 3,
        };
        let summary = query.run(&log, &broadcaster, &mut sink).await.unwrap();

        assert_eq!(sink.received, vec![9, 8, 7]);
        assert_eq!(summary.history_sent, 3);
        assert_eq!(summary.live_sent, 0);
        assert_eq!(query.phase(), TailPhase::Closed);
        assert_eq!(broadcaster.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_sink_failure_is_returned() {
        let temp = TempDir::new().unwrap();
        let log = open_log(&temp).await;
        log.append(&record("a.A", 1)).await.unwrap();
        let broadcaster = Broadcaster::new();

        let mut query = TailQuery::new(ServiceFilter::all(), 100);
        let result = query.run(&log, &broadcaster, &mut FailingSink).await;

        assert!(matches!(
            result,
            Err(crate::ServerError::Transport(TransportError::SendFailed(_)))
        ));
        assert_eq!(query.phase(), TailPhase::Closed);
        assert_eq!(broadcaster.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_live_skips_events_below_boundary() {
        let temp = TempDir::new().unwrap();
        let log = open_log(&temp).await;
        let first = log.append(&record("a.A", 1)).await.unwrap();
        let filter = ServiceFilter::all();

        let mut sink = LimitedSink {
            received: vec![],
            limit: 10,
        };
        let mut listener = LiveListener {
            filter: &filter,
            boundary: log.len().await,
            sink: &mut sink,
            sent: 0,
        };

        listener
            .deliver(LogEvent::new(first, record("a.A", 1)))
            .await
            .unwrap();
        let second = log.append(&record("a.A", 2)).await.unwrap();
        listener
            .deliver(LogEvent::new(second, record("a.A", 2)))
            .await
            .unwrap();

        assert_eq!(listener.sent, 1);
        assert_eq!(sink.received, vec![2]);
    }

    #[tokio::test]
    async fn test_channel_sink_closes_with_receiver() {
        let (mut sink, rx) = channel_sink(1);
        drop(rx);
        let err = sink.send(&record("a.A", 1)).await.unwrap_err();
        assert!(err.is_end_of_stream());
    }
}
