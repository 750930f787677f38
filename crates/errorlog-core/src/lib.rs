//! # ErrorLog Core
//!
//! Core types, traits, and errors for the centralized error-log service.
//!
//! ## Key Types
//!
//! - [`ErrorLogRequest`]: an error record as submitted by a producer
//! - [`StoredRecord`]: the record plus its authenticated caller, the unit
//!   persisted in the framed log
//! - [`ServiceFilter`]: the predicate shared by history replay and live tail
//! - [`Broadcaster`]: fan-out of new records to live subscribers
//!
//! ## Key Traits
//!
//! - [`IdentityResolver`]: user id to display identity
//! - [`MetricsSink`]: received-error counters
//! - [`TailSink`]: outbound stream of a tail query
//! - [`Listener`]: receiving side of a broadcaster subscription

pub mod broadcaster;
pub mod error;
pub mod filter;
pub mod identity;
pub mod record;
pub mod traits;

// Re-export main types
pub use broadcaster::{
    listener_fn, Broadcaster, FnListener, Listener, ListenerId, Subscription,
    DEFAULT_MAILBOX_CAPACITY,
};
pub use error::*;
pub use filter::ServiceFilter;
pub use identity::*;
pub use record::*;
pub use traits::*;
