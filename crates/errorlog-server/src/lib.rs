//! # ErrorLog Server
//!
//! Central collection point for RPC error records.
//!
//! [`ErrorLogService`] ties together:
//! - the framed record log (`errorlog-storage`), appended once per submission
//! - plain-text logs for humans (global, filtered-severity, all-users, per-user)
//! - a [`Broadcaster`](errorlog_core::Broadcaster) feeding live tail queries
//! - best-effort identity and metrics seams
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use errorlog_core::{ErrorLogRequest, ReadLogRequest, StatusCode};
//! use errorlog_server::{
//!     Caller, ErrorLogService, NoIdentityResolver, NoopMetrics, ServerConfig, channel_sink,
//! };
//!
//! let config = ServerConfig::with_log_dir("./logs");
//! let service = Arc::new(
//!     ErrorLogService::open(config, Arc::new(NoIdentityResolver), Arc::new(NoopMetrics)).await?,
//! );
//!
//! // Submit a record
//! let req = ErrorLogRequest::new("auth.Auth", "Login").with_code(StatusCode::Unavailable);
//! service.log(req, Caller::anonymous()).await?;
//!
//! // Tail records of one service
//! let (mut sink, mut rx) = channel_sink(16);
//! let tail = {
//!     let service = Arc::clone(&service);
//!     tokio::spawn(async move {
//!         service.read_log(ReadLogRequest::for_services(["auth"]), &mut sink).await
//!     })
//! };
//! while let Some(record) = rx.recv().await {
//!     print!("{}", errorlog_server::format::format_listing(&record));
//! }
//! ```

mod config;
mod error;
pub mod format;
mod identity;
mod metrics;
mod service;
pub mod tail;

pub use config::{DEFAULT_MAX_HISTORY, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use identity::{NoIdentityResolver, StaticIdentityResolver};
pub use metrics::{InMemoryMetrics, NoopMetrics};
pub use service::{Caller, ErrorLogService};
pub use tail::{ChannelSink, TailPhase, TailQuery, TailSummary, channel_sink};
