//! Diff planner
//!
//! Compares the last observed state with the desired state and produces the
//! minimal [`ChangeSet`] for a partial update. A field that was set remotely
//! but is no longer declared becomes an explicit [`Change::Clear`], which the
//! merge patch carries as `null`.

use crate::error::{Error, Result};
use crate::mapper::Mapped;
use crate::node::{Node, Value};
use crate::variant::Presence;
use std::collections::{BTreeMap, BTreeSet};

/// One field-level difference
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Set(Value),
    Clear,
}

/// Field name -> change, computed fresh on every update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    changes: BTreeMap<String, Change>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn get(&self, field: &str) -> Option<&Change> {
        self.changes.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Change)> {
        self.changes.iter()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.changes.keys().map(String::as_str)
    }

    /// JSON merge patch body: `Set` becomes the value, `Clear` becomes `null`.
    pub fn to_patch(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.changes
                .iter()
                .map(|(field, change)| {
                    let value = match change {
                        Change::Set(v) => v.to_json(),
                        Change::Clear => serde_json::Value::Null,
                    };
                    (field.clone(), value)
                })
                .collect(),
        )
    }
}

/// The part of a model a partial update can touch, in tree form, with
/// server-assigned values removed.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchScope {
    node: Node,
    skip: BTreeSet<String>,
    server_default: BTreeSet<String>,
}

impl PatchScope {
    /// Scope covering every top-level field of `model`.
    pub fn of<T: Mapped + Clone>(model: &T) -> Self {
        let mut input = model.clone();
        input.clear_computed();

        let descriptor = model.descriptor();
        let mut skip = BTreeSet::new();
        let mut server_default = BTreeSet::new();
        for field in descriptor.fields {
            match field.presence {
                Presence::Computed => {
                    skip.insert(field.name.to_string());
                }
                Presence::ServerDefault => {
                    server_default.insert(field.name.to_string());
                }
                Presence::Required | Presence::Optional | Presence::WriteOnly => {}
            }
        }

        Self {
            node: input.encode(),
            skip,
            server_default,
        }
    }

    /// Exclude fields the update endpoint does not accept.
    pub fn without(mut self, fields: &[&str]) -> Self {
        self.skip.extend(fields.iter().map(|f| f.to_string()));
        self
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Replace write-only values in this (observed) scope with the desired
    /// ones. The service never returns them usably, so they must not show up
    /// as changes.
    pub fn mask_write_only(&mut self, desired: &PatchScope, paths: &[&str]) {
        for path in paths {
            match desired.node.lookup(path) {
                Some(value) => {
                    if !self.node.insert_path(path, value.clone()) {
                        tracing::warn!("Cannot mask write-only field `{}`", path);
                    }
                }
                None => remove_path(&mut self.node, path),
            }
        }
    }

    fn skips(&self, field: &str) -> bool {
        self.skip.contains(field)
    }

    fn defaults_on_server(&self, field: &str) -> bool {
        self.server_default.contains(field)
    }
}

fn remove_path(node: &mut Node, path: &str) {
    match path.split_once('.') {
        None => {
            node.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Value::Node(child)) = node.get(head).cloned() {
                let mut child = child;
                remove_path(&mut child, rest);
                node.set(head, child);
            }
        }
    }
}

/// Compute the changes that turn `observed` into `desired`.
pub fn plan(observed: &PatchScope, desired: &PatchScope) -> ChangeSet {
    let fields: BTreeSet<&str> = observed.node.keys().chain(desired.node.keys()).collect();
    let mut changes = BTreeMap::new();

    for field in fields {
        if observed.skips(field) || desired.skips(field) {
            continue;
        }
        let change = match (observed.node.get(field), desired.node.get(field)) {
            (old, Some(new)) if old != Some(new) => Some(Change::Set(new.clone())),
            (Some(_), None)
                if !desired.defaults_on_server(field) && !observed.defaults_on_server(field) =>
            {
                Some(Change::Clear)
            }
            _ => None,
        };
        if let Some(change) = change {
            changes.insert(field.to_string(), change);
        }
    }

    ChangeSet { changes }
}

/// Fail on the first immutable field (dotted path) whose value differs.
pub fn check_immutable(observed: &Node, desired: &Node, paths: &[&str]) -> Result<()> {
    for path in paths {
        if observed.lookup(path) != desired.lookup(path) {
            return Err(Error::ImmutableFieldChanged {
                field: path.to_string(),
            });
        }
    }
    Ok(())
}
