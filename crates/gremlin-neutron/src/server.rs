//! HTTP front end: answer what the graph can, forward everything else.
//!
//! Every call under `/neutron/` goes through [`gateway`]. While the graph
//! backend is disconnected, or when no handler is registered for the
//! request, the call is passed to the upstream API unchanged.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, HeaderName};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::app::App;
use crate::error::{GatewayError, Result};

const MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

/// Connection-scoped headers each HTTP leg sets for itself.
const HOP_BY_HOP: [HeaderName; 4] = [
    header::HOST,
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::CONTENT_LENGTH,
];

pub fn router(app: Arc<App>) -> Router {
    Router::new()
        .route("/neutron/", any(gateway))
        .route("/neutron/{*path}", any(gateway))
        .with_state(app)
}

async fn gateway(State(app): State<Arc<App>>, request: axum::extract::Request) -> Response {
    let (parts, body) = request.into_parts();

    if !app.graph().is_connected() {
        let body = reqwest::Body::wrap_stream(body.into_data_stream());
        return forward(&app, &parts, body).await;
    }

    let bytes = match axum::body::to_bytes(body, MAX_BODY_SIZE).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "Failed to read request");
            return GatewayError::Body(e.to_string()).into_response();
        }
    };

    let decoded = match gremlin_core::Request::decode(&bytes) {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::error!(
                body = %String::from_utf8_lossy(&bytes),
                error = %e,
                "Failed to parse request"
            );
            return GatewayError::Decode(e).into_response();
        }
    };
    let ctx = &decoded.context;
    tracing::debug!(
        operation = %ctx.operation,
        resource = %ctx.resource,
        request_id = %ctx.request_id,
        "Request received"
    );

    let Some(handler) = app.dispatch().get(&ctx.operation, &ctx.resource) else {
        return forward(&app, &parts, bytes.into()).await;
    };

    match handler.handle(app.graph(), &decoded).await {
        Ok(body) => (
            [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(
                operation = %ctx.operation,
                resource = %ctx.resource,
                error = %e,
                "Handler hit an error"
            );
            GatewayError::from(e).into_response()
        }
    }
}

/// Replay the request upstream and stream the answer back.
async fn forward(app: &App, parts: &Parts, body: reqwest::Body) -> Response {
    let url = app.upstream_url(parts.uri.path());
    tracing::debug!(%url, method = %parts.method, "Forwarding upstream");

    let sent = app
        .upstream()
        .request(parts.method.clone(), &url)
        .headers(end_to_end(&parts.headers))
        .body(body)
        .send()
        .await;
    let upstream = match sent {
        Ok(upstream) => upstream,
        Err(e) => {
            tracing::error!(%url, error = %e, "Upstream request failed");
            return GatewayError::Upstream(e).into_response();
        }
    };

    let status = upstream.status();
    tracing::debug!(%url, status = status.as_u16(), "Upstream responded");

    let headers = end_to_end(upstream.headers());
    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

fn end_to_end(headers: &HeaderMap) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| !HOP_BY_HOP.contains(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

// ── Lifecycle ────────────────────────────────────────────────────

/// The gateway server and its shutdown plumbing.
pub struct GatewayServer {
    app: Arc<App>,
    cancel: CancellationToken,
    done: watch::Sender<bool>,
}

/// Stops a running [`GatewayServer`] from elsewhere.
#[derive(Clone)]
pub struct ShutdownHandle {
    cancel: CancellationToken,
    done: watch::Receiver<bool>,
}

impl ShutdownHandle {
    /// Request shutdown and wait until the server has drained and the
    /// graph connection is closed.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        let _ = self.done.wait_for(|done| *done).await;
    }
}

impl GatewayServer {
    pub fn new(app: Arc<App>) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            app,
            cancel: CancellationToken::new(),
            done,
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            cancel: self.cancel.clone(),
            done: self.done.subscribe(),
        }
    }

    /// Connect to the graph and serve until Ctrl-C or [`ShutdownHandle::stop`].
    ///
    /// In-flight requests finish before the graph connection is closed.
    pub async fn run(self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        let graph = self.app.graph().clone();
        graph.start();

        tracing::info!(%addr, "Starting HTTP server");
        let served = axum::serve(listener, router(self.app.clone()))
            .with_graceful_shutdown(shutdown_signal(self.cancel.clone()))
            .await;
        match &served {
            Ok(()) => tracing::info!("Stopped HTTP server"),
            Err(e) => tracing::error!(error = %e, "HTTP server error"),
        }

        graph.stop().await;
        self.done.send_replace(true);
        Ok(served?)
    }
}

async fn shutdown_signal(cancel: CancellationToken) {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for interrupt");
            std::future::pending::<()>().await;
        }
    };
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = interrupt => tracing::info!("Interrupt received"),
    }
}
