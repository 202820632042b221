//! Gremlin Server connection management and shared graph client.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::connection::ConnectionTracker;
use crate::query::{Bindings, QueryBuilder};
use crate::transport::{ScriptRequest, Transport, TransportError};
use crate::ws::WsTransport;

/// Name of the default traversal source on the server.
pub const DEFAULT_GRAPH_NAME: &str = "g";

/// Errors from graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The entity cannot be persisted as described; no script was sent.
    #[error("Incomplete entity: {0}")]
    IncompleteEntity(String),

    #[error("Gremlin rejected the request arguments: {0}")]
    InvalidArguments(String),

    #[error("Gremlin server error {code}: {message}")]
    Script { code: u16, message: String },

    #[error("Gremlin transport error: {0}")]
    Transport(TransportError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<TransportError> for GraphError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::InvalidArguments(message) => Self::InvalidArguments(message),
            TransportError::Server { code, message } => Self::Script { code, message },
            TransportError::Protocol(message) => Self::Serialization(message),
            other => Self::Transport(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;

/// Configuration for connecting to Gremlin Server.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub uri: String,
    /// Traversal source to alias `g` to; only sent when it differs from `g`.
    pub graph_name: String,
    pub request_timeout: Duration,
    pub reconnect_interval: Duration,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "ws://localhost:8182/gremlin".to_string(),
            graph_name: DEFAULT_GRAPH_NAME.to_string(),
            request_timeout: Duration::from_secs(30),
            reconnect_interval: Duration::from_secs(5),
        }
    }
}

/// Thread-safe Gremlin client.
///
/// This is the single point of access for all graph operations.
/// Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct GraphClient {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    tracker: Arc<ConnectionTracker>,
    aliases: Option<BTreeMap<String, String>>,
}

impl GraphClient {
    /// Client over an arbitrary transport. Nothing connects until [`start`](Self::start).
    pub fn new(transport: Arc<dyn Transport>, graph_name: &str) -> Self {
        let aliases = (graph_name != DEFAULT_GRAPH_NAME).then(|| {
            BTreeMap::from([(DEFAULT_GRAPH_NAME.to_string(), graph_name.to_string())])
        });
        Self {
            inner: Arc::new(Inner {
                transport,
                tracker: Arc::new(ConnectionTracker::new()),
                aliases,
            }),
        }
    }

    /// Client over the WebSocket transport described by `config`.
    pub fn from_config(config: &GraphConfig) -> Self {
        let transport = WsTransport::new(
            &config.uri,
            config.request_timeout,
            config.reconnect_interval,
        );
        Self::new(Arc::new(transport), &config.graph_name)
    }

    pub fn tracker(&self) -> &Arc<ConnectionTracker> {
        &self.inner.tracker
    }

    pub fn is_connected(&self) -> bool {
        self.inner.tracker.is_connected()
    }

    /// Run `observer` whenever the client gets connected.
    pub fn on_connected(&self, observer: impl Fn() + Send + Sync + 'static) {
        self.inner.tracker.on_connected(observer);
    }

    /// Run `observer` whenever the client gets disconnected.
    pub fn on_disconnected(
        &self,
        observer: impl Fn(Option<&TransportError>) + Send + Sync + 'static,
    ) {
        self.inner.tracker.on_disconnected(observer);
    }

    /// Start connecting in the background. Returns immediately.
    pub fn start(&self) {
        self.inner.transport.start(self.inner.tracker.clone());
    }

    /// Close the connection, waiting until it is fully closed.
    pub async fn stop(&self) {
        self.inner.transport.stop().await;
    }

    /// Submit a script and return the raw result bytes.
    ///
    /// A connection-level failure also marks the client disconnected so
    /// that callers fail over until the transport reports a new connection.
    pub async fn send(&self, script: &str, bindings: Bindings) -> Result<Vec<u8>> {
        let mut request = ScriptRequest::new(script, bindings);
        request.aliases = self.inner.aliases.clone();

        tracing::debug!(
            request_id = %request.request_id,
            script = %request.gremlin,
            "Submitting script"
        );

        match self.inner.transport.submit(&request).await {
            Ok(data) => Ok(data),
            Err(err) => {
                if let TransportError::InvalidArguments(_) = err {
                    tracing::error!(
                        script = %request.gremlin,
                        bindings = %serde_json::to_string(&request.bindings).unwrap_or_default(),
                        error = %err,
                        "Gremlin rejected script arguments"
                    );
                }
                if err.is_connection_failure() {
                    self.inner.tracker.disconnected(Some(&err));
                }
                Err(err.into())
            }
        }
    }

    /// Run a read query for an HTTP caller. An empty result is returned
    /// as the JSON literal `[]`.
    pub async fn execute(&self, query: &QueryBuilder, bindings: Bindings) -> Result<Vec<u8>> {
        let data = self.send(&query.build(), bindings).await?;
        if data.is_empty() {
            return Ok(b"[]".to_vec());
        }
        Ok(data)
    }
}
