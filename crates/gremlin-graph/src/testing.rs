//! In-memory transport for tests.
//!
//! Answers submissions from a queue of canned results (an empty result once
//! the queue runs out) and records every request it receives.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::connection::ConnectionTracker;
use crate::transport::{ScriptRequest, Transport, TransportError};

#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<Vec<u8>, TransportError>>>,
    requests: Mutex<Vec<ScriptRequest>>,
    tracker: Mutex<Option<Arc<ConnectionTracker>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, data: impl Into<Vec<u8>>) {
        self.responses.lock().push_back(Ok(data.into()));
    }

    pub fn push_err(&self, err: TransportError) {
        self.responses.lock().push_back(Err(err));
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<ScriptRequest> {
        self.requests.lock().clone()
    }

    /// The script text of every request received so far.
    pub fn scripts(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .map(|r| r.gremlin.clone())
            .collect()
    }

    /// Report a lost connection, as the socket task of a real transport would.
    pub fn drop_connection(&self, err: Option<&TransportError>) {
        if let Some(tracker) = self.tracker.lock().clone() {
            tracker.disconnected(err);
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn start(&self, tracker: Arc<ConnectionTracker>) {
        *self.tracker.lock() = Some(tracker.clone());
        tracker.connected();
    }

    async fn stop(&self) {
        let tracker = self.tracker.lock().take();
        if let Some(tracker) = tracker {
            tracker.disconnected(None);
        }
    }

    async fn submit(&self, request: &ScriptRequest) -> Result<Vec<u8>, TransportError> {
        self.requests.lock().push(request.clone());
        self.responses.lock().pop_front().unwrap_or(Ok(Vec::new()))
    }
}
