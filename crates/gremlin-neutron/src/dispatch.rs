//! Routing of decoded requests to resource handlers.
//!
//! The table is keyed by (operation, resource type) and filled once at
//! startup from the configured implementation names. A request with no
//! entry is not an error: the gateway forwards it upstream.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use gremlin_core::{Operation, Request, ResourceType};
use gremlin_graph::GraphClient;

use crate::error::HandlerError;
use crate::handlers;

/// Answers one kind of request from the graph.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Produce the JSON response body.
    async fn handle(&self, graph: &GraphClient, request: &Request) -> Result<Vec<u8>, HandlerError>;
}

/// Handlers shipped with the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Implementation {
    ListPorts,
    ListNetworks,
}

impl Implementation {
    pub const ALL: [Implementation; 2] = [Self::ListPorts, Self::ListNetworks];

    /// Configuration name: `<OPERATION>_<type>`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ListPorts => "READALL_port",
            Self::ListNetworks => "READALL_network",
        }
    }

    pub fn key(&self) -> (Operation, ResourceType) {
        match self {
            Self::ListPorts => (Operation::ReadAll, ResourceType::Port),
            Self::ListNetworks => (Operation::ReadAll, ResourceType::Network),
        }
    }
}

impl fmt::Display for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Implementation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|i| i.name() == s)
            .ok_or_else(|| format!("no implementation named {s}"))
    }
}

#[async_trait]
impl Handler for Implementation {
    async fn handle(
        &self,
        graph: &GraphClient,
        request: &Request,
    ) -> Result<Vec<u8>, HandlerError> {
        match self {
            Self::ListPorts => handlers::port::list_ports(graph, request).await,
            Self::ListNetworks => handlers::network::list_networks(graph, request).await,
        }
    }
}

/// (operation, resource type) → handler.
#[derive(Default, Clone)]
pub struct DispatchTable {
    handlers: HashMap<(Operation, ResourceType), Arc<dyn Handler>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable the named implementations. Unknown names are skipped.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let mut table = Self::new();
        for name in names {
            let name = name.as_ref();
            match name.parse::<Implementation>() {
                Ok(implementation) => {
                    tracing::info!(implementation = name, "Enabling implementation");
                    let (operation, resource) = implementation.key();
                    table.register(operation, resource, Arc::new(implementation));
                }
                Err(_) => {
                    tracing::warn!(implementation = name, "Implementation not available");
                }
            }
        }
        table
    }

    /// Add or replace the handler for a key.
    pub fn register(
        &mut self,
        operation: Operation,
        resource: ResourceType,
        handler: Arc<dyn Handler>,
    ) {
        self.handlers.insert((operation, resource), handler);
    }

    pub fn get(&self, operation: &Operation, resource: &ResourceType) -> Option<Arc<dyn Handler>> {
        self.handlers
            .get(&(operation.clone(), resource.clone()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}
