//! Nested configuration trees and the dot-path codec.
//!
//! A [`Tree`] is an ordered map from string keys to [`Node`]s, where each
//! node is either a scalar leaf or a nested subtree. The codec converts
//! between dot-delimited key paths and this nested representation and is
//! lossless: `unflatten(flatten(tree)) == tree` for any tree free of
//! scalar/container path collisions.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::value::Value;

/// One entry in a configuration tree: a scalar leaf or a nested subtree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A scalar value.
    Leaf(Value),
    /// A nested container.
    Branch(Tree),
}

/// An ordered nested tree of configuration values.
///
/// Keys iterate in alphabetical order, so flattened output is deterministic
/// without a separate sort step.
///
/// # Examples
///
/// ```
/// use strata::{Tree, Value};
///
/// let mut tree = Tree::new();
/// tree.set("sign.verify", Value::Bool(true)).unwrap();
/// assert_eq!(tree.get("sign.verify"), Some(&Value::Bool(true)));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tree {
    nodes: BTreeMap<String, Node>,
}

/// Split a dotted path into segments, rejecting empty ones.
fn split_path(path: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(Error::Validation {
            field: path.to_string(),
            message: "key paths must consist of non-empty dot-delimited segments".to_string(),
        });
    }
    Ok(segments)
}

impl Tree {
    /// Create an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the tree holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up the scalar at a dotted path.
    ///
    /// Returns `None` when the path is absent or when it names a container
    /// rather than a scalar.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = self;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            match current.nodes.get(segment)? {
                Node::Leaf(value) => {
                    return if segments.peek().is_none() {
                        Some(value)
                    } else {
                        None
                    };
                }
                Node::Branch(subtree) => {
                    if segments.peek().is_none() {
                        return None;
                    }
                    current = subtree;
                }
            }
        }
        None
    }

    /// True if a scalar exists at the dotted path.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Set the scalar at a dotted path, creating intermediate containers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TraversalConflict`] when an intermediate segment
    /// already holds a scalar, or when the final segment holds a container.
    /// Shape changes require removing the old entry first.
    pub fn set(&mut self, path: &str, value: Value) -> Result<()> {
        let segments = split_path(path)?;
        let mut current = &mut self.nodes;

        for (i, segment) in segments.iter().enumerate() {
            let last = i == segments.len() - 1;
            if last {
                match current.get(*segment) {
                    Some(Node::Branch(_)) => {
                        return Err(Error::TraversalConflict {
                            path: path.to_string(),
                            segment: (*segment).to_string(),
                            reason: "holds a container; unset it before writing a scalar"
                                .to_string(),
                        });
                    }
                    _ => {
                        current.insert((*segment).to_string(), Node::Leaf(value));
                        return Ok(());
                    }
                }
            }

            let entry = current
                .entry((*segment).to_string())
                .or_insert_with(|| Node::Branch(Tree::new()));
            match entry {
                Node::Leaf(_) => {
                    return Err(Error::TraversalConflict {
                        path: path.to_string(),
                        segment: (*segment).to_string(),
                        reason: "holds a scalar value; cannot descend through it".to_string(),
                    });
                }
                Node::Branch(subtree) => current = &mut subtree.nodes,
            }
        }

        unreachable!("split_path guarantees at least one segment")
    }

    /// Remove the scalar at a dotted path, pruning emptied containers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when any segment is absent, and
    /// [`Error::TraversalConflict`] when an intermediate segment holds a
    /// scalar.
    pub fn remove(&mut self, path: &str) -> Result<Value> {
        let segments = split_path(path)?;
        let removed = Self::remove_inner(&mut self.nodes, path, &segments)?;
        Ok(removed)
    }

    fn remove_inner(
        nodes: &mut BTreeMap<String, Node>,
        path: &str,
        segments: &[&str],
    ) -> Result<Value> {
        let segment = segments[0];
        if segments.len() == 1 {
            return match nodes.get(segment) {
                Some(Node::Leaf(_)) => match nodes.remove(segment) {
                    Some(Node::Leaf(value)) => Ok(value),
                    _ => unreachable!("entry checked immediately above"),
                },
                Some(Node::Branch(_)) => Err(Error::TraversalConflict {
                    path: path.to_string(),
                    segment: segment.to_string(),
                    reason: "holds a container, not a scalar".to_string(),
                }),
                None => Err(Error::NotFound {
                    key: path.to_string(),
                }),
            };
        }

        let value = match nodes.get_mut(segment) {
            Some(Node::Branch(subtree)) => {
                Self::remove_inner(&mut subtree.nodes, path, &segments[1..])?
            }
            Some(Node::Leaf(_)) => {
                return Err(Error::TraversalConflict {
                    path: path.to_string(),
                    segment: segment.to_string(),
                    reason: "holds a scalar value; cannot descend through it".to_string(),
                });
            }
            None => {
                return Err(Error::NotFound {
                    key: path.to_string(),
                });
            }
        };

        // Prune emptied containers so the tree stays in the image of
        // unflatten and the round-trip invariant holds.
        if let Some(Node::Branch(subtree)) = nodes.get(segment) {
            if subtree.is_empty() {
                nodes.remove(segment);
            }
        }

        Ok(value)
    }

    /// Flatten the tree into `(dot-path, value)` pairs, one per leaf, in
    /// alphabetical path order.
    #[must_use]
    pub fn flatten(&self) -> Vec<(String, Value)> {
        let mut out = Vec::new();
        self.flatten_into("", &mut out);
        out
    }

    fn flatten_into(&self, prefix: &str, out: &mut Vec<(String, Value)>) {
        for (key, node) in &self.nodes {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            match node {
                Node::Leaf(value) => out.push((path, value.clone())),
                Node::Branch(subtree) => subtree.flatten_into(&path, out),
            }
        }
    }

    /// Rebuild a tree from `(dot-path, value)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TraversalConflict`] when two paths collide into
    /// different shapes (a scalar where another path needs a container).
    pub fn unflatten<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut tree = Self::new();
        for (path, value) in pairs {
            tree.set(&path, value)?;
        }
        Ok(tree)
    }

    /// Convert a parsed YAML document into a tree.
    ///
    /// # Errors
    ///
    /// Returns a validation error for YAML constructs the store format does
    /// not support (sequences, null values, non-string keys).
    pub fn from_yaml(doc: &serde_yaml::Value) -> Result<Self> {
        match doc {
            serde_yaml::Value::Null => Ok(Self::new()),
            serde_yaml::Value::Mapping(mapping) => Self::from_yaml_mapping(mapping, ""),
            other => Err(Error::Validation {
                field: "<root>".to_string(),
                message: format!("store document must be a mapping, found {}", yaml_kind(other)),
            }),
        }
    }

    fn from_yaml_mapping(mapping: &serde_yaml::Mapping, prefix: &str) -> Result<Self> {
        let mut tree = Self::new();
        for (key, val) in mapping {
            let Some(key) = key.as_str() else {
                return Err(Error::Validation {
                    field: prefix.to_string(),
                    message: "store keys must be strings".to_string(),
                });
            };
            let path = if prefix.is_empty() {
                key.to_string()
            } else {
                format!("{prefix}.{key}")
            };
            let node = match val {
                serde_yaml::Value::Bool(b) => Node::Leaf(Value::Bool(*b)),
                serde_yaml::Value::Number(n) => {
                    if let Some(i) = n.as_i64() {
                        Node::Leaf(Value::Int(i))
                    } else if let Some(f) = n.as_f64() {
                        Node::Leaf(Value::Float(f))
                    } else {
                        return Err(Error::Validation {
                            field: path,
                            message: format!("unrepresentable number: {n}"),
                        });
                    }
                }
                serde_yaml::Value::String(s) => Node::Leaf(Value::Str(s.clone())),
                serde_yaml::Value::Mapping(inner) => {
                    Node::Branch(Self::from_yaml_mapping(inner, &path)?)
                }
                other => {
                    return Err(Error::Validation {
                        field: path,
                        message: format!("unsupported value type: {}", yaml_kind(other)),
                    });
                }
            };
            tree.nodes.insert(key.to_string(), node);
        }
        Ok(tree)
    }

    /// Convert the tree into a YAML document for persistence.
    #[must_use]
    pub fn to_yaml(&self) -> serde_yaml::Value {
        let mut mapping = serde_yaml::Mapping::new();
        for (key, node) in &self.nodes {
            let val = match node {
                Node::Leaf(Value::Bool(b)) => serde_yaml::Value::Bool(*b),
                Node::Leaf(Value::Int(i)) => serde_yaml::Value::Number((*i).into()),
                Node::Leaf(Value::Float(f)) => {
                    serde_yaml::Value::Number(serde_yaml::Number::from(*f))
                }
                Node::Leaf(Value::Str(s)) => serde_yaml::Value::String(s.clone()),
                Node::Branch(subtree) => subtree.to_yaml(),
            };
            mapping.insert(serde_yaml::Value::String(key.clone()), val);
        }
        serde_yaml::Value::Mapping(mapping)
    }
}

fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "boolean",
        serde_yaml::Value::Number(_) => "number",
        serde_yaml::Value::String(_) => "string",
        serde_yaml::Value::Sequence(_) => "sequence",
        serde_yaml::Value::Mapping(_) => "mapping",
        serde_yaml::Value::Tagged(_) => "tagged value",
    }
}
