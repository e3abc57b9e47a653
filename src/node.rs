//! Generic configuration tree
//!
//! The host tool hands every resource instance over as a [`Node`]: an
//! unordered mapping from field name to [`Value`]. Remote responses are
//! brought into the same shape before they are mapped back to typed models,
//! so both directions of the mapper speak one tree type.

use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// A single value in a configuration tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Node(Node),
}

/// Keyed configuration block. Absent keys mean "not set"; there is no null.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Node {
    fields: BTreeMap<String, Value>,
}

impl Value {
    /// Short name of the value shape, used in type mismatch errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Node(_) => "node",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integers, plus floats carrying an integral value in `i64` range
    /// (JSON `5.0`).
    pub fn as_int(&self) -> Option<i64> {
        const LIMIT: f64 = 9_223_372_036_854_775_808.0; // 2^63
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 && *f >= -LIMIT && *f < LIMIT => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(n) => Some(n),
            _ => None,
        }
    }

    fn from_json(field: &str, json: serde_json::Value) -> Result<Option<Value>> {
        let value = match json {
            serde_json::Value::Null => return Ok(None),
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                let mut list = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    let path = format!("{}[{}]", field, index);
                    if let Some(value) = Value::from_json(&path, item)? {
                        list.push(value);
                    }
                }
                Value::List(list)
            }
            serde_json::Value::Object(map) => Value::Node(Node::from_object(field, map)?),
        };
        Ok(Some(value))
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(l) => serde_json::Value::Array(l.iter().map(Value::to_json).collect()),
            Value::Node(n) => n.to_json(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Node> for Value {
    fn from(n: Node) -> Self {
        Value::Node(n)
    }
}

impl From<Vec<Value>> for Value {
    fn from(l: Vec<Value>) -> Self {
        Value::List(l)
    }
}

impl Node {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a node from a JSON object. `null` members are dropped, so an
    /// explicit null and a missing key read the same way.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        match json {
            serde_json::Value::Object(map) => Node::from_object("", map),
            serde_json::Value::Null => Ok(Node::new()),
            other => Err(Error::TypeMismatch {
                field: "<root>".to_string(),
                expected: "node",
                found: json_kind_name(&other),
            }),
        }
    }

    fn from_object(prefix: &str, map: serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        let mut node = Node::new();
        for (key, json) in map {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };
            if let Some(value) = Value::from_json(&path, json)? {
                node.fields.insert(key, value);
            }
        }
        Ok(node)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Builder form of [`Node::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn has(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Look up a dotted path such as `trigger.secret.value`.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.fields.get(first)?;
        for segment in segments {
            current = current.as_node()?.fields.get(segment)?;
        }
        Some(current)
    }

    /// Set a dotted path, creating intermediate nodes. Returns false when an
    /// intermediate segment exists but is not a node.
    pub fn insert_path(&mut self, path: &str, value: Value) -> bool {
        match path.split_once('.') {
            None => {
                self.fields.insert(path.to_string(), value);
                true
            }
            Some((head, rest)) => {
                let child = self
                    .fields
                    .entry(head.to_string())
                    .or_insert_with(|| Value::Node(Node::new()));
                match child {
                    Value::Node(node) => node.insert_path(rest, value),
                    _ => false,
                }
            }
        }
    }
}

fn json_kind_name(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "list",
        serde_json::Value::Object(_) => "node",
    }
}

/// Parse a configuration node from JSON text.
pub fn from_json_str(text: &str) -> Result<Node> {
    let json: serde_json::Value =
        serde_json::from_str(text).map_err(|e| Error::Parse(e.to_string()))?;
    Node::from_json(json)
}

/// Parse a configuration node from YAML text.
pub fn from_yaml_str(text: &str) -> Result<Node> {
    let json: serde_json::Value =
        serde_yaml::from_str(text).map_err(|e| Error::Parse(e.to_string()))?;
    Node::from_json(json)
}
