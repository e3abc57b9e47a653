//! Generic <-> typed mapping
//!
//! [`Mapped`] is implemented by every typed model. Decoding goes through a
//! [`FieldReader`], which validates the node against the model's
//! [`VariantDescriptor`] before any field is copied; encoding goes through a
//! [`NodeWriter`], which omits unset fields instead of writing zero values.

use crate::error::{Error, Result};
use crate::node::{Node, Value};
use crate::variant::{FieldSpec, Presence, VariantDescriptor, VariantRegistry};
use std::collections::BTreeMap;

/// Policy for fields a shape does not declare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownFields {
    /// Inbound configuration: anything undeclared is an error
    Reject,
    /// Read path: the service may return more than the model knows about
    Ignore,
}

/// A typed model with a generic tree form
pub trait Mapped: Sized {
    fn decode_with(node: &Node, policy: UnknownFields) -> Result<Self>;

    fn encode(&self) -> Node;

    /// Shape this instance was decoded as (the resolved variant for unions)
    fn descriptor(&self) -> &'static VariantDescriptor;

    /// Drop server-assigned values, including those of nested blocks.
    /// Top-level computed fields are also skipped by the diff planner.
    fn clear_computed(&mut self) {}

    /// Decode user configuration; undeclared fields are rejected.
    fn decode(node: &Node) -> Result<Self> {
        Self::decode_with(node, UnknownFields::Reject)
    }
}

/// Resolve the variant of `node` in `registry` and open a reader on it.
pub fn read_variant<'a>(
    node: &'a Node,
    registry: &'static VariantRegistry,
    policy: UnknownFields,
) -> Result<FieldReader<'a>> {
    let variant = registry.resolve(node)?;
    FieldReader::new(node, variant, policy)
}

/// Validated, typed access to one node
pub struct FieldReader<'a> {
    node: &'a Node,
    shape: &'static VariantDescriptor,
    policy: UnknownFields,
}

impl<'a> FieldReader<'a> {
    /// Check the node against `shape`: no undeclared fields (under
    /// [`UnknownFields::Reject`]), all required fields present, and every
    /// declared field holding a value of its kind. Write-only fields are
    /// required in configuration only.
    pub fn new(
        node: &'a Node,
        shape: &'static VariantDescriptor,
        policy: UnknownFields,
    ) -> Result<Self> {
        for (name, value) in node.iter() {
            match shape.field(name) {
                Some(spec) => {
                    if !spec.kind.admits(value) {
                        return Err(Error::TypeMismatch {
                            field: name.clone(),
                            expected: spec.kind.name(),
                            found: value.kind_name(),
                        });
                    }
                }
                None if policy == UnknownFields::Reject => {
                    return Err(Error::UnknownField {
                        shape: shape.name,
                        field: name.clone(),
                    });
                }
                None => {}
            }
        }

        let configuration = policy == UnknownFields::Reject;
        let needed = |f: &&FieldSpec| match f.presence {
            Presence::Required => true,
            Presence::WriteOnly => configuration,
            Presence::Optional | Presence::ServerDefault | Presence::Computed => false,
        };
        if let Some(missing) = shape.fields.iter().filter(needed).find(|f| !node.has(f.name)) {
            return Err(Error::MissingRequiredField {
                shape: shape.name,
                field: missing.name.to_string(),
            });
        }

        Ok(Self {
            node,
            shape,
            policy,
        })
    }

    pub fn shape(&self) -> &'static VariantDescriptor {
        self.shape
    }

    fn value(&self, name: &str) -> Option<&'a Value> {
        debug_assert!(
            self.shape.allows(name),
            "`{}` is not declared by {}",
            name,
            self.shape.name
        );
        self.node.get(name)
    }

    fn mismatch(name: &str, expected: &'static str, found: &Value) -> Error {
        Error::TypeMismatch {
            field: name.to_string(),
            expected,
            found: found.kind_name(),
        }
    }

    fn missing(&self, name: &str) -> Error {
        Error::MissingRequiredField {
            shape: self.shape.name,
            field: name.to_string(),
        }
    }

    pub fn string(&self, name: &str) -> Result<String> {
        self.opt_string(name)?.ok_or_else(|| self.missing(name))
    }

    pub fn opt_string(&self, name: &str) -> Result<Option<String>> {
        match self.value(name) {
            None => Ok(None),
            Some(v) => v
                .as_str()
                .map(|s| Some(s.to_string()))
                .ok_or_else(|| Self::mismatch(name, "string", v)),
        }
    }

    pub fn opt_int(&self, name: &str) -> Result<Option<i64>> {
        match self.value(name) {
            None => Ok(None),
            Some(v) => v
                .as_int()
                .map(Some)
                .ok_or_else(|| Self::mismatch(name, "integer", v)),
        }
    }

    pub fn opt_bool(&self, name: &str) -> Result<Option<bool>> {
        match self.value(name) {
            None => Ok(None),
            Some(v) => v
                .as_bool()
                .map(Some)
                .ok_or_else(|| Self::mismatch(name, "boolean", v)),
        }
    }

    pub fn opt_strings(&self, name: &str) -> Result<Option<Vec<String>>> {
        let Some(v) = self.value(name) else {
            return Ok(None);
        };
        let items = v
            .as_list()
            .ok_or_else(|| Self::mismatch(name, "list of strings", v))?;
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                item.as_str()
                    .map(|s| s.to_string())
                    .ok_or_else(|| Self::mismatch(&format!("{}[{}]", name, i), "string", item))
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    pub fn opt_string_map(&self, name: &str) -> Result<Option<BTreeMap<String, String>>> {
        let Some(v) = self.value(name) else {
            return Ok(None);
        };
        let node = v
            .as_node()
            .ok_or_else(|| Self::mismatch(name, "map of strings", v))?;
        node.iter()
            .map(|(key, item)| {
                item.as_str()
                    .map(|s| (key.clone(), s.to_string()))
                    .ok_or_else(|| Self::mismatch(&format!("{}.{}", name, key), "string", item))
            })
            .collect::<Result<BTreeMap<_, _>>>()
            .map(Some)
    }

    pub fn nested<T: Mapped>(&self, name: &str) -> Result<T> {
        self.opt_nested(name)?.ok_or_else(|| self.missing(name))
    }

    /// Decode a nested block with the same unknown-field policy
    pub fn opt_nested<T: Mapped>(&self, name: &str) -> Result<Option<T>> {
        let Some(v) = self.value(name) else {
            return Ok(None);
        };
        let node = v
            .as_node()
            .ok_or_else(|| Self::mismatch(name, "node", v))?;
        T::decode_with(node, self.policy)
            .map(Some)
            .map_err(|e| e.within(name))
    }

    /// Decode an ordered list of blocks; element order is preserved.
    pub fn opt_list<T: Mapped>(&self, name: &str) -> Result<Option<Vec<T>>> {
        let Some(v) = self.value(name) else {
            return Ok(None);
        };
        let items = v
            .as_list()
            .ok_or_else(|| Self::mismatch(name, "list of nodes", v))?;
        let mut decoded = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let path = format!("{}[{}]", name, i);
            let node = item
                .as_node()
                .ok_or_else(|| Self::mismatch(&path, "node", item))?;
            decoded.push(T::decode_with(node, self.policy).map_err(|e| e.within(&path))?);
        }
        Ok(Some(decoded))
    }
}

/// Builds the tree form of a typed model
#[derive(Debug, Default)]
pub struct NodeWriter {
    node: Node,
}

impl NodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn string(mut self, name: &str, value: &str) -> Self {
        self.node.set(name, value);
        self
    }

    pub fn opt_string(mut self, name: &str, value: &Option<String>) -> Self {
        if let Some(v) = value {
            self.node.set(name, v.as_str());
        }
        self
    }

    pub fn opt_int(mut self, name: &str, value: Option<i64>) -> Self {
        if let Some(v) = value {
            self.node.set(name, v);
        }
        self
    }

    pub fn opt_bool(mut self, name: &str, value: Option<bool>) -> Self {
        if let Some(v) = value {
            self.node.set(name, v);
        }
        self
    }

    pub fn opt_strings(mut self, name: &str, value: &Option<Vec<String>>) -> Self {
        if let Some(items) = value {
            let list: Vec<Value> = items.iter().map(|s| Value::from(s.as_str())).collect();
            self.node.set(name, list);
        }
        self
    }

    pub fn opt_string_map(mut self, name: &str, value: &Option<BTreeMap<String, String>>) -> Self {
        if let Some(map) = value {
            let mut node = Node::new();
            for (k, v) in map {
                node.set(k.as_str(), v.as_str());
            }
            self.node.set(name, node);
        }
        self
    }

    pub fn nested<T: Mapped>(mut self, name: &str, value: &T) -> Self {
        self.node.set(name, value.encode());
        self
    }

    pub fn opt_nested<T: Mapped>(self, name: &str, value: &Option<T>) -> Self {
        match value {
            Some(v) => self.nested(name, v),
            None => self,
        }
    }

    pub fn opt_list<T: Mapped>(mut self, name: &str, value: &Option<Vec<T>>) -> Self {
        if let Some(items) = value {
            let list: Vec<Value> = items.iter().map(|i| Value::Node(i.encode())).collect();
            self.node.set(name, list);
        }
        self
    }

    pub fn finish(self) -> Node {
        self.node
    }
}
