//! The error-log service
//!
//! [`ErrorLogService::log`] is the submission path and
//! [`ErrorLogService::read_log`] the tail-query path. Both take `&self`, so
//! one service value behind an `Arc` serves any number of concurrent
//! submitters and tail queries.

use std::sync::Arc;

use errorlog_core::{
    Broadcaster, CallingService, ErrorLogRequest, IdentityResolver, LogEvent, MetricLabels,
    MetricsSink, ReadLogRequest, StoredRecord, TailSink, UserInfo,
};
use errorlog_logging::spans;
use errorlog_storage::{RecordLog, TextLogSet};
use tracing::{Instrument, debug, info, info_span, instrument, warn};

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::format::format_entry;
use crate::tail::{TailQuery, TailSummary};

/// The authenticated caller of a submission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    pub user: Option<UserInfo>,
    pub service: Option<CallingService>,
}

impl Caller {
    /// An unauthenticated caller
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: UserInfo) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_service(mut self, service: CallingService) -> Self {
        self.service = Some(service);
        self
    }
}

/// Collects error records, persists them and serves tail queries
pub struct ErrorLogService {
    config: ServerConfig,
    records: RecordLog,
    text_logs: TextLogSet,
    broadcaster: Broadcaster<LogEvent>,
    identity: Arc<dyn IdentityResolver>,
    metrics: Arc<dyn MetricsSink>,
}

impl ErrorLogService {
    /// Open the record log and text logs under `config.log_dir`
    ///
    /// Fails if the log directory or any log file cannot be opened.
    #[instrument(skip_all, fields(dir = %config.log_dir.display()))]
    pub async fn open(
        config: ServerConfig,
        identity: Arc<dyn IdentityResolver>,
        metrics: Arc<dyn MetricsSink>,
    ) -> ServerResult<Self> {
        let records = RecordLog::open(config.record_log()).await?;
        let text_logs = TextLogSet::open(&config.log_dir, config.text_log_max_bytes).await?;
        let broadcaster = Broadcaster::with_mailbox_capacity(config.mailbox_capacity);

        info!(
            max_history = config.max_history,
            mailbox_capacity = config.mailbox_capacity,
            "Error log service opened"
        );

        Ok(Self {
            config,
            records,
            text_logs,
            broadcaster,
            identity,
            metrics,
        })
    }

    /// Submit one error record
    ///
    /// The record is persisted and published to live tail queries, then
    /// written to the text logs. Only a failure to persist is returned;
    /// identity lookup and text log failures are logged.
    ///
    /// Returns the offset of the record in the record log.
    pub async fn log(&self, request: ErrorLogRequest, caller: Caller) -> ServerResult<u64> {
        let span = info_span!(
            spans::LOG_RECORD,
            service = %request.service_name,
            method = %request.method_name,
            status_code = request.error_code,
        );
        self.log_inner(request, caller).instrument(span).await
    }

    async fn log_inner(&self, request: ErrorLogRequest, caller: Caller) -> ServerResult<u64> {
        let user = self.resolve_user(&request.user_id).await;
        let email = user.as_ref().map_or("", |u| u.email.as_str());

        self.metrics.increment(&MetricLabels::for_request(&request));

        let text = format_entry(&request, email);
        let status = request.status();
        let user_id = request.user_id.clone();

        let record = StoredRecord {
            request,
            user: caller.user,
            service: caller.service,
        };
        let offset = self.records.append(&record).await?;

        let delivered = self.broadcaster.publish(LogEvent::new(offset, record));
        debug!(offset, delivered, "Record published");

        if let Err(e) = self
            .text_logs
            .write(&text, status, &user_id, user.as_ref())
            .await
        {
            warn!(error = %e, "Record persisted but text logs incomplete");
        }

        Ok(offset)
    }

    async fn resolve_user(&self, user_id: &str) -> Option<UserInfo> {
        if user_id.is_empty() {
            return None;
        }
        match self.identity.user_by_id(user_id).await {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(user_id, error = %e, "Unable to resolve user");
                None
            }
        }
    }

    /// Create a tail query for `request` bound to this service's history limit
    pub fn tail_query(&self, request: &ReadLogRequest) -> TailQuery {
        TailQuery::new(request.filter(), self.config.max_history)
    }

    /// Run `query` until `sink` closes
    pub async fn run_tail<S>(&self, query: &mut TailQuery, sink: &mut S) -> ServerResult<TailSummary>
    where
        S: TailSink + ?Sized,
    {
        query.run(&self.records, &self.broadcaster, sink).await
    }

    /// Stream matching history, newest first, then live records to `sink`
    ///
    /// Returns once the sink closes (`Ok`) or fails (`Err`).
    pub async fn read_log<S>(&self, request: ReadLogRequest, sink: &mut S) -> ServerResult<TailSummary>
    where
        S: TailSink + ?Sized,
    {
        info!(services = ?request.services, "Listener added");
        let mut query = self.tail_query(&request);
        self.run_tail(&mut query, sink).await
    }

    /// Number of tail queries currently registered for live records
    pub fn listener_count(&self) -> usize {
        self.broadcaster.listener_count()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn records(&self) -> &RecordLog {
        &self.records
    }

    pub fn text_logs(&self) -> &TextLogSet {
        &self.text_logs
    }

    /// End all live tail queries and close the record log
    ///
    /// Submissions after shutdown fail.
    pub async fn shutdown(&self) -> ServerResult<()> {
        self.broadcaster.close_all();
        self.records.close().await?;
        info!("Error log service shut down");
        Ok(())
    }
}
