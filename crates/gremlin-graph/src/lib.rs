//! gremlin-graph: Gremlin Server client for the synchronizer and the gateway.
//!
//! All graph reads and writes flow through [`GraphClient`]: scripts are
//! built from deterministic fragments with named bindings, vertices are
//! upserted with full property replacement, and edge sets are reconciled
//! against what the store currently holds.

pub mod client;
pub mod connection;
pub mod mutations;
pub mod query;
pub mod reconcile;
pub mod transport;
pub mod ws;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{GraphClient, GraphConfig, GraphError};
pub use connection::ConnectionTracker;
pub use query::{Bindings, QueryBuilder};
pub use reconcile::EdgeDiff;
pub use transport::{ScriptRequest, Transport, TransportError};
pub use ws::WsTransport;
