use crate::error::{AvrError, Result};
use crate::state::{Field, Value};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// State update from a subscription
#[derive(Debug, Clone, PartialEq)]
pub enum StateUpdate {
    /// An attribute took a new value
    Changed(Field, Value),

    /// The session closed; no further updates follow
    Disconnected,
}

/// Receiver for state updates
pub struct StateReceiver {
    rx: broadcast::Receiver<StateUpdate>,
}

impl StateReceiver {
    /// Create a new state receiver
    pub(crate) fn new(rx: broadcast::Receiver<StateUpdate>) -> Self {
        Self { rx }
    }

    /// Receive the next state update
    ///
    /// Returns `ConnectionLost` once the session is gone and the queue is
    /// drained.
    pub async fn recv(&mut self) -> Result<StateUpdate> {
        self.rx.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => AvrError::ConnectionLost,
            broadcast::error::RecvError::Lagged(n) => {
                AvrError::ChannelError(format!("Lagged by {} messages", n))
            }
        })
    }

    /// Try to receive a state update without blocking
    ///
    /// Returns `None` if no message is available.
    pub fn try_recv(&mut self) -> Result<Option<StateUpdate>> {
        match self.rx.try_recv() {
            Ok(update) => Ok(Some(update)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Closed) => Err(AvrError::ConnectionLost),
            Err(broadcast::error::TryRecvError::Lagged(n)) => {
                Err(AvrError::ChannelError(format!("Lagged by {} messages", n)))
            }
        }
    }
}

/// Callback invoked with every changed attribute
pub type Observer = Arc<dyn Fn(Field, &Value) + Send + Sync>;

/// Broadcast registry of observers
#[derive(Default)]
pub(crate) struct Observers {
    callbacks: Mutex<Vec<Observer>>,
}

impl Observers {
    pub fn add(&self, observer: Observer) {
        self.callbacks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(observer);
    }

    pub fn clear(&self) {
        self.callbacks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Call every observer in registration order. A panicking observer is
    /// logged and skipped.
    pub fn notify(&self, field: Field, value: &Value) {
        // Observers may subscribe from inside a callback, so call them
        // without holding the lock.
        let callbacks = self
            .callbacks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(field, value))).is_err() {
                tracing::warn!("Observer panicked while handling {} = {}", field, value);
            }
        }
    }
}
