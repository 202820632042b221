//! Resource handlers answering Neutron list requests from the graph.
//!
//! Handlers compose one traversal per request: a label selection, tenant
//! scoping for non-admin callers, one clause per supported filter, and a
//! final `project` producing the Neutron representation.

pub mod network;
pub mod port;

use gremlin_core::Filters;
use gremlin_graph::query::quote;
use gremlin_graph::{Bindings, QueryBuilder};
use serde_json::Value;

/// Add one clause per filter.
///
/// Each filter's values are bound as a list parameter and `clause` receives
/// the filter name with a ready `within(<param>)` predicate. Filters are
/// visited in name order. Names that reduce to the same parameter, such as
/// `router:external` and `router_external`, get numbered suffixes.
pub fn filter_query<F>(
    query: &mut QueryBuilder,
    bindings: &mut Bindings,
    filters: &Filters,
    mut clause: F,
) where
    F: FnMut(&mut QueryBuilder, &str, &str),
{
    for (name, values) in filters.iter() {
        let stem = format!("_filter_{}", param_stem(name));
        let mut param = stem.clone();
        let mut suffix = 1;
        while bindings.contains_key(&param) {
            param = format!("{stem}_{suffix}");
            suffix += 1;
        }
        bindings.insert(param.clone(), Value::Array(values.to_vec()));
        clause(query, name, &format!("within({param})"));
    }
}

/// Project each vertex into a map of the requested fields.
///
/// With no requested fields the `defaults` are used. `by` returns the
/// `.by(...)` modulator for fields that need one; other fields read the
/// property of the same name, or `''` when absent.
pub fn values_query<F>(query: &mut QueryBuilder, fields: &[String], defaults: &[&str], by: F)
where
    F: Fn(&str) -> Option<String>,
{
    let fields: Vec<&str> = if fields.is_empty() {
        defaults.to_vec()
    } else {
        fields.iter().map(String::as_str).collect()
    };

    let keys: Vec<String> = fields.iter().map(|f| quote(f)).collect();
    query.add_fmt(format_args!(".project({})", keys.join(",")));

    for field in fields {
        match by(field) {
            Some(modulator) => query.add(modulator),
            None => query.add_fmt(format_args!(
                ".by(coalesce(values({}), constant('')))",
                quote(field)
            )),
        };
    }
}

/// Script variable names allow only letters, digits and underscores.
fn param_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
