//! CLI entry point for the gremlin-neutron gateway.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use gremlin_graph::GraphClient;
use gremlin_neutron::{App, GatewayConfig, GatewayServer};

#[derive(Parser)]
#[command(name = "gremlin-neutron")]
#[command(about = "Neutron API gateway answering list requests from the Gremlin graph")]
struct Cli {
    /// Config file prefix (default: gremlin-neutron).
    #[arg(short, long, default_value = "gremlin-neutron")]
    config: String,

    /// Address to listen on.
    #[arg(long)]
    listen: Option<String>,

    /// host:port of gremlin server.
    #[arg(long)]
    gremlin: Option<String>,

    /// Name of the graph traversal to use on the server.
    #[arg(long)]
    gremlin_graph_name: Option<String>,

    /// host:port of contrail-api server.
    #[arg(long)]
    contrail_api: Option<String>,

    /// Implementation to enable (repeatable), e.g. READALL_port.
    #[arg(short = 'i', long = "implem")]
    implementations: Vec<String>,

    /// Log as JSON lines.
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    /// Flags take precedence over file and environment.
    fn apply(self, config: &mut GatewayConfig) {
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(gremlin) = self.gremlin {
            config.gremlin_server = gremlin;
        }
        if let Some(name) = self.gremlin_graph_name {
            config.graph_name = name;
        }
        if let Some(api) = self.contrail_api {
            config.contrail_api = api;
        }
        if !self.implementations.is_empty() {
            config.implementations = self.implementations;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.log_json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).init();
    }

    let mut config = GatewayConfig::load(&cli.config)?;
    cli.apply(&mut config);
    let addr = config.listen_addr()?;

    let graph = GraphClient::from_config(&config.graph_config());
    graph.on_connected(|| tracing::info!("Connected to gremlin-server"));
    graph.on_disconnected(|err| match err {
        Some(err) => tracing::warn!(error = %err, "Disconnected from gremlin-server"),
        None => tracing::info!("Disconnected from gremlin-server"),
    });

    let app = App::from_config(&config, graph)?;
    tracing::info!(
        gremlin = %config.gremlin_uri(),
        upstream = %config.upstream_base(),
        handlers = app.dispatch().len(),
        "Gateway configured"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    GatewayServer::new(Arc::new(app)).run(listener).await?;

    Ok(())
}
