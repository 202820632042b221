//! Gremlin script building.
//!
//! Scripts are assembled from fragments; values never get interpolated into
//! the script text, they travel as named bindings. Property fragments are
//! generated in property-name order so equal property maps always produce
//! byte-identical scripts and identical bindings.

use std::collections::BTreeMap;
use std::fmt;

use gremlin_core::{EdgeProperties, VertexProperties};
use serde_json::Value;

/// Named parameters substituted into a script at evaluation time.
pub type Bindings = BTreeMap<String, Value>;

/// Append-only accumulator of script fragments.
///
/// No grammar validation happens here; callers own fragment correctness.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    fragments: Vec<String>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw fragment.
    pub fn add(&mut self, fragment: impl Into<String>) -> &mut Self {
        self.fragments.push(fragment.into());
        self
    }

    /// Append a formatted fragment: `q.add_fmt(format_args!(".has('x', {v})"))`.
    pub fn add_fmt(&mut self, args: fmt::Arguments<'_>) -> &mut Self {
        self.fragments.push(fmt::format(args));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Render the script.
    pub fn build(&self) -> String {
        self.fragments.concat()
    }
}

impl fmt::Display for QueryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for fragment in &self.fragments {
            f.write_str(fragment)?;
        }
        Ok(())
    }
}

/// `.property(...)` steps setting every vertex property.
///
/// Each value gets its own binding `_<name>_<index>` (dots in the name
/// become underscores). Properties with several values use list cardinality.
pub fn vertex_properties_fragment(properties: &VertexProperties) -> (String, Bindings) {
    let mut fragment = String::new();
    let mut bindings = Bindings::new();

    for (name, values) in properties {
        let cardinality = if values.len() > 1 { "list," } else { "" };
        for (index, property) in values.iter().enumerate() {
            let bind_name = format!("_{}_{index}", bind_stem(name));
            fragment.push_str(&format!(
                ".property({cardinality}{},{bind_name})",
                quote(name)
            ));
            bindings.insert(bind_name, property.value.clone());
        }
    }

    (fragment, bindings)
}

/// `.property(...)` steps setting every edge property.
///
/// Each value is bound as `_p_<name>`, apart from the endpoint bindings
/// edge scripts use. The store rejects null edge properties, so null values
/// are skipped.
pub fn edge_properties_fragment(properties: &EdgeProperties) -> (String, Bindings) {
    let mut fragment = String::new();
    let mut bindings = Bindings::new();

    for (name, value) in properties.iter().filter(|(_, v)| !v.is_null()) {
        let bind_name = format!("_p_{}", bind_stem(name));
        fragment.push_str(&format!(".property({},{bind_name})", quote(name)));
        bindings.insert(bind_name, value.clone());
    }

    (fragment, bindings)
}

/// Quote a string as a Groovy single-quoted literal.
pub fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn bind_stem(name: &str) -> String {
    name.replace('.', "_")
}
