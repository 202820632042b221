//! The seam between the graph client and the wire.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::connection::ConnectionTracker;
use crate::query::Bindings;

/// Language the server evaluates scripts in.
pub const GREMLIN_LANGUAGE: &str = "gremlin-groovy";

/// One script evaluation request.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptRequest {
    pub request_id: Uuid,
    pub gremlin: String,
    pub bindings: Bindings,
    /// Traversal source aliases, e.g. `g → my_graph`.
    pub aliases: Option<BTreeMap<String, String>>,
}

impl ScriptRequest {
    pub fn new(gremlin: impl Into<String>, bindings: Bindings) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            gremlin: gremlin.into(),
            bindings,
            aliases: None,
        }
    }
}

/// Errors reported by a transport.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Not connected to gremlin-server")]
    NotConnected,

    #[error("Connection to gremlin-server closed")]
    Closed,

    #[error("No response from gremlin-server within {0:?}")]
    Timeout(Duration),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Invalid request arguments: {0}")]
    InvalidArguments(String),

    #[error("Gremlin server error {code}: {message}")]
    Server { code: u16, message: String },

    #[error("Malformed gremlin-server message: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Whether the error means the connection itself is unusable.
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::Closed | Self::Timeout(_) | Self::WebSocket(_)
        )
    }
}

/// A connection to a Gremlin Server.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Begin connecting and return immediately. Connect and disconnect
    /// transitions are reported to `tracker` from the transport's own task.
    fn start(&self, tracker: Arc<ConnectionTracker>);

    /// Close the connection and wait until it is fully closed.
    async fn stop(&self);

    /// Submit a script and wait for its correlated result.
    async fn submit(&self, request: &ScriptRequest) -> Result<Vec<u8>, TransportError>;
}
