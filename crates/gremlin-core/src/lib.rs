//! gremlin-core: shared types for the gremlin synchronizer and the Neutron gateway.
//!
//! This crate provides the foundational types used by the other crates:
//! - Vertex and edge descriptions synchronized into the graph store
//! - The inbound Neutron request model, including filter normalization
//! - Layered configuration loading
//! - Common error types

pub mod config;
pub mod error;
pub mod filters;
pub mod request;
pub mod types;

pub use error::CoreError;
pub use filters::{FilterValue, Filters};
pub use request::{Operation, Request, RequestContext, RequestData, ResourceType};
pub use types::{
    Edge, EdgeAnchor, EdgeKey, EdgeProperties, Property, Vertex, VertexId, VertexProperties,
};
