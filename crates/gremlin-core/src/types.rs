//! Graph data model synchronized into the Gremlin store.
//!
//! Vertices and edges are transient descriptions of what the store should
//! contain. They are built per call; nothing here caches graph state.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use serde_json::Value;

/// Vertex properties: name → ordered values. More than one value means
/// list cardinality in the store.
pub type VertexProperties = BTreeMap<String, Vec<Property>>;

/// Edge properties: name → single value.
pub type EdgeProperties = BTreeMap<String, Value>;

/// Edges of a vertex grouped by edge label.
pub type EdgesByLabel = BTreeMap<String, Vec<Edge>>;

// ── Identifiers ───────────────────────────────────────────────────

/// Identifier of a vertex in the graph store.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(transparent)]
pub struct VertexId(pub Uuid);

impl VertexId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<Uuid> for VertexId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ── Properties ────────────────────────────────────────────────────

/// A single vertex property value.
///
/// Decodes from the GraphSON `{"id": .., "value": ..}` shape; the property
/// id assigned by the store is not kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub value: Value,
}

impl Property {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

// ── Vertex ────────────────────────────────────────────────────────

/// A vertex together with the edges it should have.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: VertexId,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub properties: VertexProperties,
    #[serde(default, rename = "outE")]
    pub out_edges: EdgesByLabel,
    #[serde(default, rename = "inE")]
    pub in_edges: EdgesByLabel,
}

impl Vertex {
    pub fn new(id: impl Into<VertexId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            properties: VertexProperties::new(),
            out_edges: EdgesByLabel::new(),
            in_edges: EdgesByLabel::new(),
        }
    }

    /// A vertex can only be persisted once it has a label.
    pub fn is_complete(&self) -> bool {
        !self.label.is_empty()
    }

    /// Append a value to the named property.
    pub fn add_property(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.properties
            .entry(name.into())
            .or_default()
            .push(Property::new(value));
        self
    }

    /// Declare an edge leaving this vertex.
    pub fn add_out_edge(&mut self, edge: Edge) -> &mut Self {
        self.out_edges
            .entry(edge.label.clone())
            .or_default()
            .push(edge);
        self
    }

    /// Declare an edge arriving at this vertex.
    pub fn add_in_edge(&mut self, edge: Edge) -> &mut Self {
        self.in_edges
            .entry(edge.label.clone())
            .or_default()
            .push(edge);
        self
    }

    /// All declared edges: outgoing first, then incoming.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.out_edges
            .values()
            .chain(self.in_edges.values())
            .flatten()
    }
}

// ── Edge ──────────────────────────────────────────────────────────

/// A directed, labeled edge between two vertices.
///
/// Field names follow GraphSON so edges read back from the store decode
/// into the same type callers declare.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(rename = "outV")]
    pub out_v: VertexId,
    #[serde(rename = "inV")]
    pub in_v: VertexId,
    pub label: String,
    #[serde(rename = "outVLabel", default, skip_serializing_if = "Option::is_none")]
    pub out_v_label: Option<String>,
    #[serde(rename = "inVLabel", default, skip_serializing_if = "Option::is_none")]
    pub in_v_label: Option<String>,
    #[serde(default)]
    pub properties: EdgeProperties,
}

/// Identity of an edge. No two edges in the store share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeKey<'a> {
    pub out_v: VertexId,
    pub in_v: VertexId,
    pub label: &'a str,
}

/// Which endpoint an edge operation starts from, and the label to give the
/// other endpoint if it has to be created as a stub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeAnchor<'a> {
    /// Start from the source vertex; the destination may be stubbed.
    Out { stub_label: &'a str },
    /// Start from the destination vertex; the source may be stubbed.
    In { stub_label: &'a str },
}

impl Edge {
    pub fn new(
        out_v: impl Into<VertexId>,
        in_v: impl Into<VertexId>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            out_v: out_v.into(),
            in_v: in_v.into(),
            label: label.into(),
            out_v_label: None,
            in_v_label: None,
            properties: EdgeProperties::new(),
        }
    }

    pub fn with_in_v_label(mut self, label: impl Into<String>) -> Self {
        self.in_v_label = Some(label.into());
        self
    }

    pub fn with_out_v_label(mut self, label: impl Into<String>) -> Self {
        self.out_v_label = Some(label.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn key(&self) -> EdgeKey<'_> {
        EdgeKey {
            out_v: self.out_v,
            in_v: self.in_v,
            label: &self.label,
        }
    }

    /// Resolve the anchor endpoint from the declared endpoint labels.
    ///
    /// Ref/parent edges carry only the destination label and are anchored
    /// on their source; children/back-ref edges carry only the source label
    /// and are anchored on their destination. With both labels the source
    /// is the anchor. Returns `None` when no stub label is known.
    pub fn anchor(&self) -> Option<EdgeAnchor<'_>> {
        let out_label = non_empty(&self.out_v_label);
        let in_label = non_empty(&self.in_v_label);
        match (out_label, in_label) {
            (_, Some(stub_label)) => Some(EdgeAnchor::Out { stub_label }),
            (Some(stub_label), None) => Some(EdgeAnchor::In { stub_label }),
            (None, None) => None,
        }
    }
}

fn non_empty(label: &Option<String>) -> Option<&str> {
    label.as_deref().filter(|l| !l.is_empty())
}
