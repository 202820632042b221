//! gremlin-neutron: Neutron API gateway backed by the Gremlin graph.
//!
//! List requests the graph can answer are served from it; everything else,
//! and everything while the graph is unreachable, is forwarded to the
//! Contrail API unchanged.

pub mod app;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod server;

pub use app::App;
pub use config::GatewayConfig;
pub use dispatch::{DispatchTable, Handler, Implementation};
pub use error::{GatewayError, HandlerError, Result};
pub use server::{router, GatewayServer, ShutdownHandle};
