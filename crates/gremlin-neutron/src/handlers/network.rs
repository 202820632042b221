//! `READALL network`: list virtual networks.

use gremlin_core::Request;
use gremlin_graph::{Bindings, GraphClient, QueryBuilder};
use serde_json::Value;

use super::{filter_query, values_query};
use crate::error::HandlerError;

pub const DEFAULT_FIELDS: &[&str] = &[
    "id",
    "tenant_id",
    "name",
    "description",
    "router:external",
    "shared",
    "subnets",
    "status",
    "admin_state_up",
    "port_security_enabled",
    "created_at",
    "updated_at",
];

pub async fn list_networks(
    graph: &GraphClient,
    request: &Request,
) -> Result<Vec<u8>, HandlerError> {
    let (query, bindings) = build(request);
    Ok(graph.execute(&query, bindings).await?)
}

fn build(request: &Request) -> (QueryBuilder, Bindings) {
    let ctx = &request.context;
    let mut query = QueryBuilder::new();
    let mut bindings = Bindings::new();

    query.add("g.V().hasLabel('virtual_network')");

    if !ctx.is_admin {
        query
            .add(".where(values('id_perms').select('user_visible').is(true))")
            .add(
                ".where(or(__.out('parent').has(id, _tenant_id), \
                 has('router_external', true), has('is_shared', true)))",
            );
        bindings.insert(
            "_tenant_id".to_string(),
            Value::String(ctx.tenant_id.to_string()),
        );
    }

    filter_query(&mut query, &mut bindings, &request.data.filters, |q, name, within| {
        match name {
            // Non-admin results are already scoped to the tenant.
            "tenant_id" => {
                if ctx.is_admin {
                    q.add_fmt(format_args!(".where(__.out('parent').has(id, {within}))"));
                }
            }
            "router:external" | "router_external" => {
                q.add_fmt(format_args!(".has('router_external', {within})"));
            }
            "shared" => {
                q.add_fmt(format_args!(".has('is_shared', {within})"));
            }
            "id" => {
                q.add_fmt(format_args!(".has(id, {within})"));
            }
            "name" => {
                q.add_fmt(format_args!(".has('display_name', {within})"));
            }
            other => tracing::warn!(filter = other, "No implementation for network filter"),
        }
    });

    values_query(&mut query, &request.data.fields, DEFAULT_FIELDS, |field| {
        let by = match field {
            "id" => ".by(id)",
            "tenant_id" => ".by(__.out('parent').id().map{ it.get().toString().replace('-', '') })",
            "name" => ".by(coalesce(values('display_name'), constant('')))",
            "description" => {
                ".by(coalesce(values('id_perms').select('description'), constant('')))"
            }
            "router:external" | "router_external" => {
                ".by(coalesce(values('router_external'), constant(false)))"
            }
            "shared" => ".by(coalesce(values('is_shared'), constant(false)))",
            "port_security_enabled" => {
                ".by(coalesce(values('port_security_enabled'), constant(false)))"
            }
            "subnets" => {
                ".by(coalesce(__.outE('ref').where(__.otherV().hasLabel('network_ipam'))\
                 .values('ipam_subnets').unfold().select('subnet_uuid').fold(), constant([])))"
            }
            "status" => {
                ".by(choose(values('id_perms').select('enable'), \
                 constant('ACTIVE'), constant('DOWN')))"
            }
            "admin_state_up" => {
                ".by(coalesce(values('id_perms').select('enable'), constant(true)))"
            }
            "created_at" => ".by(coalesce(values('id_perms').select('created'), constant('')))",
            "updated_at" => {
                ".by(coalesce(values('id_perms').select('last_modified'), constant('')))"
            }
            _ => return None,
        };
        Some(by.to_string())
    });

    (query, bindings)
}
