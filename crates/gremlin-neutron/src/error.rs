//! Error types for the gremlin-neutron gateway.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failure of a resource handler. Reported to the caller as a 500.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Graph error: {0}")]
    Graph(#[from] gremlin_graph::GraphError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Failed to decode request: {0}")]
    Decode(#[source] gremlin_core::CoreError),

    #[error("Failed to read request body: {0}")]
    Body(String),

    #[error("{0}")]
    Handler(#[from] HandlerError),

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Config error: {0}")]
    Config(#[from] gremlin_core::CoreError),

    #[error("Invalid listen address {addr}: {reason}")]
    InvalidAddress { addr: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Decode(_) | Self::Body(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (
            self.status(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}
