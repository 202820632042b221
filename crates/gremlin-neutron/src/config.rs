//! Configuration for the gremlin-neutron gateway.

use std::net::SocketAddr;
use std::time::Duration;

use gremlin_graph::GraphConfig;
use serde::{Deserialize, Serialize};

use crate::dispatch::Implementation;
use crate::error::{GatewayError, Result};

/// Environment prefix: `GREMLIN_NEUTRON__GATEWAY__<FIELD>`.
pub const ENV_PREFIX: &str = "GREMLIN_NEUTRON";

/// Gateway configuration.
///
/// Loaded from the `[gateway]` section of `<prefix>.toml` and
/// `GREMLIN_NEUTRON__GATEWAY__` environment variables, then overridden by
/// command-line flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Address the HTTP server listens on.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// host:port of the Gremlin Server.
    #[serde(default = "default_gremlin_server")]
    pub gremlin_server: String,

    /// Traversal source on the server to alias `g` to.
    #[serde(default = "default_graph_name")]
    pub graph_name: String,

    /// host:port (or URL) of the Contrail API requests are forwarded to.
    #[serde(default = "default_contrail_api")]
    pub contrail_api: String,

    /// Handlers to enable, e.g. `READALL_port`.
    #[serde(default = "default_implementations")]
    pub implementations: Vec<String>,

    #[serde(default = "default_forward_timeout")]
    pub forward_timeout_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            gremlin_server: default_gremlin_server(),
            graph_name: default_graph_name(),
            contrail_api: default_contrail_api(),
            implementations: default_implementations(),
            forward_timeout_secs: default_forward_timeout(),
            request_timeout_secs: default_request_timeout(),
            reconnect_interval_secs: default_reconnect_interval(),
        }
    }
}

impl GatewayConfig {
    /// Load from `<file_prefix>.toml` and the environment.
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = gremlin_core::config::layered(
            file_prefix,
            ENV_PREFIX,
            &["gateway.implementations"],
        )?;
        Ok(gremlin_core::config::section(&cfg, "gateway")?)
    }

    pub fn gremlin_uri(&self) -> String {
        format!("ws://{}/gremlin", self.gremlin_server)
    }

    pub fn graph_config(&self) -> GraphConfig {
        GraphConfig {
            uri: self.gremlin_uri(),
            graph_name: self.graph_name.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            reconnect_interval: Duration::from_secs(self.reconnect_interval_secs),
        }
    }

    /// Base URL requests are forwarded to, without a trailing slash.
    pub fn upstream_base(&self) -> String {
        let base = self.contrail_api.trim_end_matches('/');
        if base.contains("://") {
            base.to_string()
        } else {
            format!("http://{base}")
        }
    }

    pub fn forward_timeout(&self) -> Duration {
        Duration::from_secs(self.forward_timeout_secs)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse()
            .map_err(|e: std::net::AddrParseError| GatewayError::InvalidAddress {
                addr: self.listen.clone(),
                reason: e.to_string(),
            })
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_gremlin_server() -> String {
    "localhost:8182".to_string()
}

fn default_graph_name() -> String {
    gremlin_graph::client::DEFAULT_GRAPH_NAME.to_string()
}

fn default_contrail_api() -> String {
    "localhost:8082".to_string()
}

fn default_implementations() -> Vec<String> {
    Implementation::ALL
        .iter()
        .map(|i| i.name().to_string())
        .collect()
}

fn default_forward_timeout() -> u64 {
    15
}

fn default_request_timeout() -> u64 {
    30
}

fn default_reconnect_interval() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.listen_addr().unwrap().port(), 8080);
        assert_eq!(config.gremlin_uri(), "ws://localhost:8182/gremlin");
        assert_eq!(config.upstream_base(), "http://localhost:8082");
        assert_eq!(config.forward_timeout(), Duration::from_secs(15));
        assert_eq!(
            config.implementations,
            vec!["READALL_port".to_string(), "READALL_network".to_string()]
        );
    }

    #[test]
    fn test_upstream_base_keeps_scheme() {
        let config = GatewayConfig {
            contrail_api: "https://api.example:8082/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.upstream_base(), "https://api.example:8082");
    }

    #[test]
    fn test_graph_config() {
        let config = GatewayConfig {
            gremlin_server: "gremlin:8182".to_string(),
            graph_name: "contrail".to_string(),
            request_timeout_secs: 3,
            ..Default::default()
        };
        let graph = config.graph_config();
        assert_eq!(graph.uri, "ws://gremlin:8182/gremlin");
        assert_eq!(graph.graph_name, "contrail");
        assert_eq!(graph.request_timeout, Duration::from_secs(3));
        assert_eq!(graph.reconnect_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[gateway]\ncontrail_api = \"contrail:8082\"\nimplementations = [\"READALL_network\"]"
        )
        .unwrap();

        let prefix = dir.path().join("gateway");
        let config = GatewayConfig::load(prefix.to_str().unwrap()).unwrap();
        assert_eq!(config.contrail_api, "contrail:8082");
        assert_eq!(config.implementations, vec!["READALL_network".to_string()]);
        assert_eq!(config.listen, "0.0.0.0:8080");
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("absent");
        let config = GatewayConfig::load(prefix.to_str().unwrap()).unwrap();
        assert_eq!(config, GatewayConfig::default());
    }

    #[test]
    fn test_bad_listen_address() {
        let config = GatewayConfig {
            listen: "not an address".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.listen_addr(),
            Err(GatewayError::InvalidAddress { .. })
        ));
    }
}
