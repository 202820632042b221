//! Write operations for the graph.
//!
//! Vertices are upserted by id with full property replacement. Edges are
//! created from their anchor endpoint; a missing opposite endpoint is
//! created as a stub vertex marked `_missing` so that a later sync of the
//! real entity completes it.

use gremlin_core::{Edge, EdgeAnchor, Vertex, VertexId};
use serde_json::Value;

use crate::client::{GraphClient, GraphError, Result};
use crate::query::{edge_properties_fragment, vertex_properties_fragment, Bindings, QueryBuilder};

impl GraphClient {
    // ── Vertices ─────────────────────────────────────────────────

    /// Create a vertex and its edges. Same as [`upsert_vertex`](Self::upsert_vertex).
    pub async fn create_vertex(&self, vertex: &Vertex) -> Result<()> {
        self.upsert_vertex(vertex).await
    }

    /// Create or replace a vertex, then reconcile its edges.
    ///
    /// Existing properties are all dropped and rewritten from `vertex`.
    pub async fn upsert_vertex(&self, vertex: &Vertex) -> Result<()> {
        ensure_complete(vertex)?;

        let (props, mut bindings) = vertex_properties_fragment(&vertex.properties);
        bindings.insert("_id".to_string(), id_value(vertex.id));
        bindings.insert("_label".to_string(), Value::String(vertex.label.clone()));

        let mut q = QueryBuilder::new();
        q.add("g.V().hasId(_id).fold()")
            .add(
                ".coalesce(unfold().sideEffect(properties().drop()), \
                 addV(_label).property(id, _id))",
            )
            .add(props)
            .add(".iterate()");
        self.send(&q.build(), bindings).await?;

        let diff = self.reconcile_edges(vertex).await?;
        tracing::debug!(
            vertex = %vertex.id,
            added = diff.to_add.len(),
            updated = diff.to_update.len(),
            removed = diff.to_remove.len(),
            "Vertex synchronized"
        );
        Ok(())
    }

    /// Set one property on an existing vertex, leaving everything else alone.
    pub async fn update_vertex_property(
        &self,
        vertex: &Vertex,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        ensure_complete(vertex)?;

        let bindings = Bindings::from([
            ("_id".to_string(), id_value(vertex.id)),
            ("_name".to_string(), Value::String(name.to_string())),
            ("_value".to_string(), value.into()),
        ]);
        self.send("g.V(_id).property(_name, _value).iterate()", bindings)
            .await?;
        Ok(())
    }

    /// Drop a vertex by id. Cascading is left to the store.
    pub async fn delete_vertex(&self, id: VertexId) -> Result<()> {
        let bindings = Bindings::from([("_id".to_string(), id_value(id))]);
        self.send("g.V(_id).drop()", bindings).await?;
        Ok(())
    }

    // ── Edges ────────────────────────────────────────────────────

    /// Create an edge, stubbing the opposite endpoint if it does not exist.
    pub async fn create_edge(&self, edge: &Edge) -> Result<()> {
        let anchor = edge.anchor().ok_or_else(|| {
            GraphError::IncompleteEntity(format!(
                "edge {} -[{}]-> {} has no endpoint label",
                edge.out_v, edge.label, edge.in_v
            ))
        })?;

        let (props, mut bindings) = edge_properties_fragment(&edge.properties);
        bindings.extend(endpoint_bindings(edge));

        let mut q = QueryBuilder::new();
        match anchor {
            EdgeAnchor::Out { stub_label } => {
                bindings.insert(
                    "_stub_label".to_string(),
                    Value::String(stub_label.to_string()),
                );
                q.add("g.V(_outv).as('outv')")
                    .add_fmt(format_args!(
                        ".coalesce(g.V(_inv), {})",
                        stub_vertex("_inv")
                    ))
                    .add(".addE(_label).from('outv')");
            }
            EdgeAnchor::In { stub_label } => {
                bindings.insert(
                    "_stub_label".to_string(),
                    Value::String(stub_label.to_string()),
                );
                q.add("g.V(_inv).as('inv')")
                    .add_fmt(format_args!(
                        ".coalesce(g.V(_outv), {})",
                        stub_vertex("_outv")
                    ))
                    .add(".addE(_label).to('inv')");
            }
        }
        q.add(props).add(".iterate()");

        self.send(&q.build(), bindings).await?;
        Ok(())
    }

    /// Replace all properties of the edge with this identity.
    pub async fn update_edge(&self, edge: &Edge) -> Result<()> {
        let (props, mut bindings) = edge_properties_fragment(&edge.properties);
        bindings.extend(endpoint_bindings(edge));

        let mut q = QueryBuilder::new();
        q.add("g.V(_outv).outE(_label).where(inV().hasId(_inv))")
            .add(".sideEffect(properties().drop())")
            .add(props)
            .add(".iterate()");

        self.send(&q.build(), bindings).await?;
        Ok(())
    }

    /// Drop every edge between the two endpoints of `edge`, whatever its label.
    pub async fn delete_edge(&self, edge: &Edge) -> Result<()> {
        let bindings = Bindings::from([
            ("_inv".to_string(), id_value(edge.in_v)),
            ("_outv".to_string(), id_value(edge.out_v)),
        ]);
        self.send(
            "g.V(_inv).bothE().where(otherV().hasId(_outv)).drop()",
            bindings,
        )
        .await?;
        Ok(())
    }

    /// Drop the edge with exactly this identity: source, destination and label.
    pub async fn remove_edge(&self, edge: &Edge) -> Result<()> {
        let bindings = endpoint_bindings(edge);
        self.send(
            "g.V(_outv).outE(_label).where(inV().hasId(_inv)).drop()",
            bindings,
        )
        .await?;
        Ok(())
    }
}

fn ensure_complete(vertex: &Vertex) -> Result<()> {
    if vertex.is_complete() {
        Ok(())
    } else {
        Err(GraphError::IncompleteEntity(format!(
            "vertex {} has no label",
            vertex.id
        )))
    }
}

fn id_value(id: VertexId) -> Value {
    Value::String(id.to_string())
}

fn endpoint_bindings(edge: &Edge) -> Bindings {
    Bindings::from([
        ("_outv".to_string(), id_value(edge.out_v)),
        ("_inv".to_string(), id_value(edge.in_v)),
        ("_label".to_string(), Value::String(edge.label.clone())),
    ])
}

/// Traversal creating the placeholder vertex bound to `id_binding`.
fn stub_vertex(id_binding: &str) -> String {
    format!(
        "g.addV(_stub_label).property(id, {id_binding})\
         .property('fq_name', ['_missing'])\
         .property('_missing', true)\
         .property('deleted', 0)"
    )
}
