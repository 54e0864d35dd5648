//! Machine-readable schema emission from the key registry.
//!
//! The schema is a tree-shaped JSON document mirroring the nesting of the
//! key paths: intermediate segments become `object` nodes with `properties`,
//! leaves carry the registered type plus any default, enum members, and
//! validation pattern. Only registered keys appear; values written under
//! unregistered paths are invisible to the schema.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value as JsonValue};

use crate::registry::{KeyDef, KeyKind, Registry, Scope, ScopeConstraint};
use crate::value::Value;

/// Generate the schema document for every registered key.
///
/// # Examples
///
/// ```
/// use strata::{schema, Registry};
///
/// let registry = Registry::builtin().unwrap();
/// let doc = schema::generate(&registry);
/// assert_eq!(doc["properties"]["build-jobs"]["type"], "number");
/// ```
#[must_use]
pub fn generate(registry: &Registry) -> JsonValue {
    build(registry.iter().collect())
}

/// Generate the schema document for one scope.
///
/// Keys whose constraint for `scope` is Forbidden are omitted; this is a
/// visibility filter, distinct from the write-time scope check.
#[must_use]
pub fn generate_for_scope(registry: &Registry, scope: Scope) -> JsonValue {
    build(
        registry
            .iter()
            .filter(|def| def.constraint_for(scope) != ScopeConstraint::Forbidden)
            .collect(),
    )
}

fn build(defs: Vec<&KeyDef>) -> JsonValue {
    let entries = defs
        .into_iter()
        .map(|def| (def.path.split('.').collect::<Vec<&str>>(), def))
        .collect();
    json!({
        "type": "object",
        "properties": build_level(entries),
    })
}

/// Build one nesting level. Registry construction guarantees no path is a
/// prefix of another, so each group is either a single leaf or a container.
fn build_level<'a>(entries: Vec<(Vec<&'a str>, &'a KeyDef)>) -> Map<String, JsonValue> {
    let mut groups: BTreeMap<&str, Vec<(Vec<&str>, &KeyDef)>> = BTreeMap::new();
    for (segments, def) in entries {
        let head = segments[0];
        groups
            .entry(head)
            .or_default()
            .push((segments[1..].to_vec(), def));
    }

    let mut properties = Map::new();
    for (head, group) in groups {
        let node = if group.len() == 1 && group[0].0.is_empty() {
            leaf_node(group[0].1)
        } else {
            json!({
                "type": "object",
                "properties": build_level(group),
            })
        };
        properties.insert(head.to_string(), node);
    }
    properties
}

fn leaf_node(def: &KeyDef) -> JsonValue {
    let mut node = Map::new();
    node.insert("type".to_string(), JsonValue::String(schema_type(def.kind)));

    if let Some(ref default) = def.default {
        node.insert("default".to_string(), value_to_json(default));
    }
    if !def.enum_values.is_empty() {
        node.insert(
            "enum".to_string(),
            JsonValue::Array(
                def.enum_values
                    .iter()
                    .map(|m| JsonValue::String(m.clone()))
                    .collect(),
            ),
        );
    }
    if let Some(ref pattern) = def.pattern {
        node.insert("pattern".to_string(), JsonValue::String(pattern.clone()));
    }

    JsonValue::Object(node)
}

/// Schema type names follow JSON Schema: enum keys are strings with an
/// `enum` member list.
fn schema_type(kind: KeyKind) -> String {
    match kind {
        KeyKind::Boolean => "boolean",
        KeyKind::Number => "number",
        KeyKind::String | KeyKind::Enum => "string",
    }
    .to_string()
}

fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Int(i) => JsonValue::Number((*i).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map_or_else(|| JsonValue::String(f.to_string()), JsonValue::Number),
        Value::Str(s) => JsonValue::String(s.clone()),
    }
}
