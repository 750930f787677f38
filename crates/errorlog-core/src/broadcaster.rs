//! Fan-out of published events to live subscribers
//!
//! Any number of producers call [`Broadcaster::publish`]; each subscriber
//! runs its own processing loop inside [`Broadcaster::subscribe`] and
//! receives every event published while it is registered.
//!
//! Every listener owns a bounded mailbox. Publishing never waits: when a
//! listener's mailbox is full, that one event is dropped for that listener
//! only, and the listener stays subscribed.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::error::TransportError;

/// Default number of pending events a listener may hold
pub const DEFAULT_MAILBOX_CAPACITY: usize = 10;

/// Identifier of a registered listener
pub type ListenerId = u64;

/// Receiving side of a subscription
///
/// Returning [`TransportError::ConnectionClosed`] ends the subscription
/// normally; any other error ends it and is returned from
/// [`Broadcaster::subscribe`].
#[async_trait]
pub trait Listener<E: Send + 'static>: Send {
    /// Handle one published event
    async fn deliver(&mut self, event: E) -> Result<(), TransportError>;
}

/// Adapter turning an async closure into a [`Listener`]
pub struct FnListener<F>(F);

/// Wrap a closure returning a future as a [`Listener`]
pub fn listener_fn<F>(f: F) -> FnListener<F> {
    FnListener(f)
}

#[async_trait]
impl<E, F, Fut> Listener<E> for FnListener<F>
where
    E: Send + 'static,
    F: FnMut(E) -> Fut + Send,
    Fut: Future<Output = Result<(), TransportError>> + Send,
{
    async fn deliver(&mut self, event: E) -> Result<(), TransportError> {
        (self.0)(event).await
    }
}

struct Registration<E> {
    name: String,
    mailbox: mpsc::Sender<E>,
}

/// Publish/subscribe fan-out with drop-on-full backpressure
pub struct Broadcaster<E> {
    listeners: Mutex<HashMap<ListenerId, Registration<E>>>,
    next_id: AtomicU64,
    mailbox_capacity: usize,
}

impl<E: Clone + Send + 'static> Broadcaster<E> {
    /// Create a broadcaster with the default mailbox capacity
    pub fn new() -> Self {
        Self::with_mailbox_capacity(DEFAULT_MAILBOX_CAPACITY)
    }

    /// Create a broadcaster whose listeners buffer up to `capacity` events
    pub fn with_mailbox_capacity(capacity: usize) -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            mailbox_capacity: capacity.max(1),
        }
    }

    /// Number of currently registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Deliver `event` to every registered listener without waiting
    ///
    /// Returns how many mailboxes accepted the event.
    pub fn publish(&self, event: E) -> usize {
        // Deliver from a snapshot so the registry lock is never held across sends
        let snapshot: Vec<(ListenerId, String, mpsc::Sender<E>)> = self
            .listeners
            .lock()
            .iter()
            .map(|(id, reg)| (*id, reg.name.clone(), reg.mailbox.clone()))
            .collect();

        let mut delivered = 0;
        for (id, name, mailbox) in snapshot {
            match mailbox.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(listener = id, name = %name, "Listener mailbox full, dropping event");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(listener = id, name = %name, "Listener is shutting down");
                }
            }
        }
        delivered
    }

    /// Register `listener` and drive it until it finishes
    ///
    /// Blocks the calling task for the whole lifetime of the subscription.
    /// The listener is deregistered before this returns, and also when the
    /// returned future is dropped early.
    pub async fn subscribe<L>(&self, name: impl Into<String>, listener: &mut L) -> Result<(), TransportError>
    where
        L: Listener<E> + ?Sized,
    {
        self.register(name).run(listener).await
    }

    /// Register a mailbox without starting delivery
    ///
    /// Events published from now on are buffered in the mailbox (subject
    /// to the usual drop-on-full policy) until [`Subscription::run`] is
    /// called. Dropping the subscription deregisters it.
    pub fn register(&self, name: impl Into<String>) -> Subscription<'_, E> {
        let name = name.into();
        let (tx, rx) = mpsc::channel(self.mailbox_capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().insert(
            id,
            Registration {
                name: name.clone(),
                mailbox: tx,
            },
        );
        debug!(listener = id, name = %name, "Listener registered");

        Subscription {
            _registered: Registered {
                broadcaster: self,
                id,
            },
            id,
            name,
            rx,
        }
    }

    /// Deregister every listener; their subscriptions end with `Ok(())`
    /// once they drain their mailboxes.
    pub fn close_all(&self) {
        let removed = {
            let mut listeners = self.listeners.lock();
            let n = listeners.len();
            listeners.clear();
            n
        };
        debug!(count = removed, "Closed all listeners");
    }

    fn deregister(&self, id: ListenerId) {
        if self.listeners.lock().remove(&id).is_some() {
            debug!(listener = id, "Listener deregistered");
        }
    }
}

impl<E: Clone + Send + 'static> Default for Broadcaster<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered listener mailbox
pub struct Subscription<'a, E: Clone + Send + 'static> {
    _registered: Registered<'a, E>,
    id: ListenerId,
    name: String,
    rx: mpsc::Receiver<E>,
}

impl<E: Clone + Send + 'static> Subscription<'_, E> {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Drive `listener` with this mailbox until it finishes
    ///
    /// Returns `Ok(())` when the listener signals end of stream or the
    /// broadcaster closes, and the listener's error otherwise.
    pub async fn run<L>(mut self, listener: &mut L) -> Result<(), TransportError>
    where
        L: Listener<E> + ?Sized,
    {
        let (id, name) = (self.id, self.name.as_str());
        while let Some(event) = self.rx.recv().await {
            match listener.deliver(event).await {
                Ok(()) => {}
                Err(e) if e.is_end_of_stream() => {
                    debug!(listener = id, name = %name, "Listener reached end of stream");
                    return Ok(());
                }
                Err(e) => {
                    debug!(listener = id, name = %name, error = %e, "Listener failed");
                    return Err(e);
                }
            }
        }

        // Mailbox closed by close_all
        Ok(())
    }
}

/// Removes a listener from the registry when its subscription ends
struct Registered<'a, E: Clone + Send + 'static> {
    broadcaster: &'a Broadcaster<E>,
    id: ListenerId,
}

impl<E: Clone + Send + 'static> Drop for Registered<'_, E> {
    fn drop(&mut self) {
        self.broadcaster.deregister(self.id);
    }
}
