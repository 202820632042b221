//! Edge reconciliation.
//!
//! After a vertex upsert the store's edges for that vertex are brought in
//! line with the declared ones: a three-way diff keyed on
//! (source, destination, label) followed by adds, then updates, then removes.
//! Nothing guards against a concurrent writer on the same vertex; callers
//! serialize writes per vertex id.

use std::collections::{HashMap, HashSet};

use gremlin_core::{Edge, EdgeKey, EdgeProperties, Vertex, VertexId};
use serde_json::Value;

use crate::client::{GraphClient, GraphError, Result};
use crate::query::Bindings;

/// Edge operations needed to go from the current edge set to the desired one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeDiff {
    /// Desired edges absent from the store.
    pub to_add: Vec<Edge>,
    /// Desired edges present in the store with different properties.
    pub to_update: Vec<Edge>,
    /// Stored edges no longer declared.
    pub to_remove: Vec<Edge>,
}

impl EdgeDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty() && self.to_remove.is_empty()
    }
}

/// Compute the diff between `desired` and `current` edges.
///
/// If `desired` repeats an identity only the first occurrence counts.
/// Null desired properties are ignored when comparing, matching the fact
/// that they are never written.
pub fn diff_edges<'a>(desired: impl IntoIterator<Item = &'a Edge>, current: &[Edge]) -> EdgeDiff {
    let current_by_key: HashMap<EdgeKey<'_>, &Edge> =
        current.iter().map(|e| (e.key(), e)).collect();

    let mut diff = EdgeDiff::default();
    let mut seen: HashSet<EdgeKey<'a>> = HashSet::new();

    for edge in desired {
        let key = edge.key();
        if !seen.insert(key) {
            tracing::warn!(
                out_v = %key.out_v,
                in_v = %key.in_v,
                label = key.label,
                "Duplicate edge declared, keeping the first"
            );
            continue;
        }
        match current_by_key.get(&key) {
            None => diff.to_add.push(edge.clone()),
            Some(stored) if non_null(&edge.properties) != stored.properties => {
                diff.to_update.push(edge.clone())
            }
            Some(_) => {}
        }
    }

    for edge in current {
        if !seen.contains(&edge.key()) {
            diff.to_remove.push(edge.clone());
        }
    }

    diff
}

fn non_null(properties: &EdgeProperties) -> EdgeProperties {
    properties
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

impl GraphClient {
    /// Every edge touching `id`, read fresh from the store.
    pub async fn current_edges(&self, id: VertexId) -> Result<Vec<Edge>> {
        let bindings = Bindings::from([("_id".to_string(), Value::String(id.to_string()))]);
        let data = self.send("g.V(_id).bothE()", bindings).await?;
        if data.is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&data)
            .map_err(|e| GraphError::Serialization(format!("edges of vertex {id}: {e}")))
    }

    /// Bring the stored edges of `vertex` in line with its declared edges.
    ///
    /// Stops at the first failing edge operation; operations already applied
    /// stay applied.
    pub async fn reconcile_edges(&self, vertex: &Vertex) -> Result<EdgeDiff> {
        let current = self.current_edges(vertex.id).await?;
        let diff = diff_edges(vertex.edges(), &current);

        for edge in &diff.to_add {
            self.create_edge(edge).await?;
        }
        for edge in &diff.to_update {
            self.update_edge(edge).await?;
        }
        for edge in &diff.to_remove {
            self.remove_edge(edge).await?;
        }

        Ok(diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use crate::transport::TransportError;
    use serde_json::json;
    use std::sync::Arc;

    fn ids() -> (VertexId, VertexId, VertexId) {
        (VertexId::new(), VertexId::new(), VertexId::new())
    }

    #[test]
    fn test_diff_add_and_update() {
        let (a, b, c) = ids();
        let desired = vec![
            Edge::new(a, b, "ref").with_property("p", 1),
            Edge::new(a, c, "ref"),
        ];
        let current = vec![Edge::new(a, b, "ref").with_property("p", 2)];

        let diff = diff_edges(&desired, &current);
        assert_eq!(diff.to_add, vec![desired[1].clone()]);
        assert_eq!(diff.to_update, vec![desired[0].clone()]);
        assert!(diff.to_remove.is_empty());
    }

    #[test]
    fn test_diff_removes_undeclared() {
        let (a, b, c) = ids();
        let desired = vec![Edge::new(a, b, "ref")];
        let current = vec![Edge::new(a, b, "ref"), Edge::new(a, c, "ref")];

        let diff = diff_edges(&desired, &current);
        assert!(diff.to_add.is_empty());
        assert!(diff.to_update.is_empty());
        assert_eq!(diff.to_remove, vec![current[1].clone()]);
    }

    #[test]
    fn test_diff_label_is_part_of_identity() {
        let (a, b, _) = ids();
        let desired = vec![Edge::new(a, b, "parent")];
        let current = vec![Edge::new(a, b, "ref")];

        let diff = diff_edges(&desired, &current);
        assert_eq!(diff.to_add.len(), 1);
        assert_eq!(diff.to_remove.len(), 1);
    }

    #[test]
    fn test_diff_ignores_null_desired_properties() {
        let (a, b, _) = ids();
        let desired = vec![Edge::new(a, b, "ref").with_property("attr", Value::Null)];
        let current = vec![Edge::new(a, b, "ref")];
        assert!(diff_edges(&desired, &current).is_empty());
    }

    #[test]
    fn test_diff_keeps_first_duplicate() {
        let (a, b, _) = ids();
        let desired = vec![
            Edge::new(a, b, "ref").with_property("p", 1),
            Edge::new(a, b, "ref").with_property("p", 2),
        ];
        let diff = diff_edges(&desired, &[]);
        assert_eq!(diff.to_add, vec![desired[0].clone()]);
    }

    #[tokio::test]
    async fn test_current_edges_decodes_graphson() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = GraphClient::new(transport.clone(), "g");
        let (a, b, _) = ids();
        transport.push_ok(
            serde_json::to_vec(&json!([{
                "id": "e1",
                "type": "edge",
                "label": "ref",
                "outV": a.to_string(),
                "inV": b.to_string(),
                "outVLabel": "virtual_machine_interface",
                "inVLabel": "virtual_network",
                "properties": {"attr": {"sequence": 1}}
            }]))
            .unwrap(),
        );

        let edges = client.current_edges(a).await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(
            edges[0].key(),
            EdgeKey {
                out_v: a,
                in_v: b,
                label: "ref"
            }
        );
        assert_eq!(edges[0].properties["attr"], json!({"sequence": 1}));
    }

    #[tokio::test]
    async fn test_current_edges_rejects_garbage() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = GraphClient::new(transport.clone(), "g");
        transport.push_ok(b"{not json".to_vec());
        let err = client.current_edges(VertexId::new()).await.unwrap_err();
        assert!(matches!(err, GraphError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_reconcile_applies_add_update_remove_in_order() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = GraphClient::new(transport.clone(), "g");
        let (a, b, c) = ids();
        let d = VertexId::new();

        let mut vertex = Vertex::new(a, "virtual_machine_interface");
        vertex.add_out_edge(
            Edge::new(a, b, "ref")
                .with_in_v_label("virtual_network")
                .with_property("p", 1),
        );
        vertex.add_out_edge(Edge::new(a, c, "ref").with_in_v_label("virtual_network"));

        let current = vec![
            Edge::new(a, b, "ref").with_property("p", 2),
            Edge::new(a, d, "ref"),
        ];
        transport.push_ok(serde_json::to_vec(&current).unwrap());

        let diff = client.reconcile_edges(&vertex).await.unwrap();
        assert_eq!(diff.to_add.len(), 1);
        assert_eq!(diff.to_update.len(), 1);
        assert_eq!(diff.to_remove.len(), 1);

        let requests = transport.requests();
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[0].gremlin, "g.V(_id).bothE()");
        assert!(requests[1].gremlin.contains(".addE(_label)"));
        assert_eq!(requests[1].bindings["_inv"], json!(c.to_string()));
        assert!(requests[2].gremlin.contains("sideEffect(properties().drop())"));
        assert_eq!(requests[2].bindings["_inv"], json!(b.to_string()));
        assert!(requests[3].gremlin.ends_with(".drop()"));
        assert_eq!(requests[3].bindings["_inv"], json!(d.to_string()));
    }

    #[tokio::test]
    async fn test_reconcile_removes_only_the_stale_direction() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = GraphClient::new(transport.clone(), "g");
        let (a, b, _) = ids();

        let mut vertex = Vertex::new(a, "virtual_network");
        vertex.add_in_edge(
            Edge::new(b, a, "ref")
                .with_out_v_label("virtual_machine_interface"),
        );
        let current = vec![Edge::new(a, b, "ref"), Edge::new(b, a, "ref")];
        transport.push_ok(serde_json::to_vec(&current).unwrap());

        let diff = client.reconcile_edges(&vertex).await.unwrap();
        assert_eq!(diff.to_remove, vec![current[0].clone()]);

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1].gremlin,
            "g.V(_outv).outE(_label).where(inV().hasId(_inv)).drop()"
        );
        assert_eq!(requests[1].bindings["_outv"], json!(a.to_string()));
        assert_eq!(requests[1].bindings["_inv"], json!(b.to_string()));
        assert_eq!(requests[1].bindings["_label"], json!("ref"));
    }

    #[tokio::test]
    async fn test_reconcile_stops_at_first_failure() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = GraphClient::new(transport.clone(), "g");
        let (a, b, c) = ids();

        let mut vertex = Vertex::new(a, "virtual_machine_interface");
        vertex.add_out_edge(Edge::new(a, b, "ref").with_in_v_label("virtual_network"));
        let current = vec![Edge::new(a, c, "ref")];

        transport.push_ok(serde_json::to_vec(&current).unwrap());
        transport.push_err(TransportError::Server {
            code: 597,
            message: "boom".into(),
        });

        let err = client.reconcile_edges(&vertex).await.unwrap_err();
        assert!(matches!(err, GraphError::Script { code: 597, .. }));
        // The remove never ran.
        assert_eq!(transport.requests().len(), 2);
    }
}
