//! State shared by every request the gateway serves.

use std::time::Duration;

use gremlin_graph::GraphClient;

use crate::config::GatewayConfig;
use crate::dispatch::DispatchTable;
use crate::error::Result;

/// Graph client, upstream HTTP client and dispatch table.
///
/// Built once at startup and shared read-only across requests.
pub struct App {
    graph: GraphClient,
    upstream: reqwest::Client,
    upstream_base: String,
    dispatch: DispatchTable,
}

impl App {
    pub fn new(
        graph: GraphClient,
        upstream_base: impl Into<String>,
        forward_timeout: Duration,
        dispatch: DispatchTable,
    ) -> Result<Self> {
        let upstream = reqwest::Client::builder()
            .timeout(forward_timeout)
            .build()?;
        Ok(Self {
            graph,
            upstream,
            upstream_base: upstream_base.into(),
            dispatch,
        })
    }

    /// Build from configuration, enabling the configured implementations.
    pub fn from_config(config: &GatewayConfig, graph: GraphClient) -> Result<Self> {
        Self::new(
            graph,
            config.upstream_base(),
            config.forward_timeout(),
            DispatchTable::from_names(config.implementations.as_slice()),
        )
    }

    pub fn graph(&self) -> &GraphClient {
        &self.graph
    }

    pub fn upstream(&self) -> &reqwest::Client {
        &self.upstream
    }

    /// Upstream URL for an inbound request path.
    pub fn upstream_url(&self, path: &str) -> String {
        format!("{}{path}", self.upstream_base)
    }

    pub fn dispatch(&self) -> &DispatchTable {
        &self.dispatch
    }
}
