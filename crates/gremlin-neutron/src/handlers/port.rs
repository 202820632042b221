//! `READALL port`: list virtual machine interfaces as Neutron ports.

use gremlin_core::Request;
use gremlin_graph::{Bindings, GraphClient, QueryBuilder};
use serde_json::Value;

use super::{filter_query, values_query};
use crate::error::HandlerError;

pub const DEFAULT_FIELDS: &[&str] = &[
    "id",
    "tenant_id",
    "network_id",
    "name",
    "description",
    "security_groups",
    "fixed_ips",
    "mac_address",
    "allowed_address_pairs",
    "device_id",
    "device_owner",
    "status",
    "admin_state_up",
    "created_at",
    "updated_at",
];

/// The VM or logical router the interface is attached to.
const DEVICE: &str =
    "coalesce(__.out('ref').hasLabel('virtual_machine'), __.in('ref').hasLabel('logical_router'))";

pub async fn list_ports(graph: &GraphClient, request: &Request) -> Result<Vec<u8>, HandlerError> {
    let (query, bindings) = build(request);
    Ok(graph.execute(&query, bindings).await?)
}

fn build(request: &Request) -> (QueryBuilder, Bindings) {
    let ctx = &request.context;
    let mut query = QueryBuilder::new();
    let mut bindings = Bindings::new();

    query.add("g.V().hasLabel('virtual_machine_interface')");

    if !ctx.is_admin {
        query
            .add(".where(values('id_perms').select('user_visible').is(true))")
            .add(".where(__.out('parent').has(id, _tenant_id))");
        bindings.insert(
            "_tenant_id".to_string(),
            Value::String(ctx.tenant_id.to_string()),
        );
    }

    filter_query(&mut query, &mut bindings, &request.data.filters, |q, name, within| {
        match name {
            "tenant_id" => {
                if ctx.is_admin {
                    q.add_fmt(format_args!(".where(__.out('parent').has(id, {within}))"));
                }
            }
            "id" => {
                q.add_fmt(format_args!(".has(id, {within})"));
            }
            "network_id" => {
                q.add_fmt(format_args!(
                    ".where(__.out('ref').hasLabel('virtual_network').has(id, {within}))"
                ));
            }
            "device_id" => {
                q.add_fmt(format_args!(".where({DEVICE}.has(id, {within}))"));
            }
            "device_owner" => {
                q.add_fmt(format_args!(
                    ".has('virtual_machine_interface_device_owner', {within})"
                ));
            }
            "mac_address" => {
                q.add_fmt(format_args!(
                    ".where(values('virtual_machine_interface_mac_addresses')\
                     .select('mac_address').unfold().is({within}))"
                ));
            }
            "name" => {
                q.add_fmt(format_args!(".has('display_name', {within})"));
            }
            other => tracing::warn!(filter = other, "No implementation for port filter"),
        }
    });

    values_query(&mut query, &request.data.fields, DEFAULT_FIELDS, |field| {
        let by = match field {
            "id" => ".by(id)".to_string(),
            "tenant_id" => {
                ".by(__.out('parent').id().map{ it.get().toString().replace('-', '') })".to_string()
            }
            "network_id" => {
                ".by(coalesce(__.out('ref').hasLabel('virtual_network').id(), constant('')))"
                    .to_string()
            }
            "name" => ".by(coalesce(values('display_name'), constant('')))".to_string(),
            "description" => {
                ".by(coalesce(values('id_perms').select('description'), constant('')))".to_string()
            }
            "security_groups" => {
                ".by(__.out('ref').hasLabel('security_group').id().fold())".to_string()
            }
            "fixed_ips" => ".by(__.in('ref').hasLabel('instance_ip')\
                 .project('ip_address','subnet_id')\
                 .by(values('instance_ip_address'))\
                 .by(coalesce(values('subnet_uuid'), constant('')))\
                 .fold())"
                .to_string(),
            "mac_address" => ".by(coalesce(values('virtual_machine_interface_mac_addresses')\
                 .select('mac_address').unfold(), constant('')))"
                .to_string(),
            "allowed_address_pairs" => ".by(coalesce(\
                 values('virtual_machine_interface_allowed_address_pairs')\
                 .select('allowed_address_pair').unfold()\
                 .project('ip_address','mac_address')\
                 .by(select('ip').select('ip_prefix'))\
                 .by(select('mac'))\
                 .fold(), constant([])))"
                .to_string(),
            "device_id" => format!(".by(coalesce({DEVICE}.id(), constant('')))"),
            "device_owner" => {
                ".by(coalesce(values('virtual_machine_interface_device_owner'), constant('')))"
                    .to_string()
            }
            "status" => format!(".by(choose({DEVICE}, constant('ACTIVE'), constant('DOWN')))"),
            "admin_state_up" => {
                ".by(coalesce(values('id_perms').select('enable'), constant(true)))".to_string()
            }
            "created_at" => {
                ".by(coalesce(values('id_perms').select('created'), constant('')))".to_string()
            }
            "updated_at" => {
                ".by(coalesce(values('id_perms').select('last_modified'), constant('')))"
                    .to_string()
            }
            _ => return None,
        };
        Some(by)
    });

    (query, bindings)
}
