//! Backend connection lifecycle.
//!
//! Tracks whether the Gremlin Server is reachable and republishes every
//! transition to registered observers. It has no reconnection policy of its
//! own: it only reflects what the transport (or a failed submission) reports.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::transport::TransportError;

type ConnectedObserver = Arc<dyn Fn() + Send + Sync>;
type DisconnectedObserver = Arc<dyn Fn(Option<&TransportError>) + Send + Sync>;

/// Connected/disconnected state plus its observers. Starts disconnected.
#[derive(Default)]
pub struct ConnectionTracker {
    connected: AtomicBool,
    on_connected: Mutex<Vec<ConnectedObserver>>,
    on_disconnected: Mutex<Vec<DisconnectedObserver>>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Run `observer` on every transition to connected.
    pub fn on_connected(&self, observer: impl Fn() + Send + Sync + 'static) {
        self.on_connected.lock().push(Arc::new(observer));
    }

    /// Run `observer` on every transition to disconnected. The error is
    /// absent when the connection was closed on purpose.
    pub fn on_disconnected(
        &self,
        observer: impl Fn(Option<&TransportError>) + Send + Sync + 'static,
    ) {
        self.on_disconnected.lock().push(Arc::new(observer));
    }

    /// Record a transition to connected.
    pub fn connected(&self) {
        if self.connected.swap(true, Ordering::AcqRel) {
            return;
        }
        // Observers run outside the lock so they may register further observers.
        let observers = self.on_connected.lock().clone();
        for observer in observers {
            observer();
        }
    }

    /// Record a transition to disconnected.
    pub fn disconnected(&self, error: Option<&TransportError>) {
        if !self.connected.swap(false, Ordering::AcqRel) {
            return;
        }
        let observers = self.on_disconnected.lock().clone();
        for observer in observers {
            observer(error);
        }
    }
}

impl std::fmt::Debug for ConnectionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionTracker")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}
