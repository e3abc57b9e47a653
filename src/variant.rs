//! Variant Registry - closed set of shapes per polymorphic family
//!
//! Every polymorphic configuration block (trigger, secret, property,
//! destination) names its shape through a discriminator field. Each family
//! is a static [`VariantRegistry`] compiled into the binary; lookups are by
//! exact string equality and an unmatched value is always an error.
//!
//! Adding a variant means adding a [`VariantDescriptor`] here and a paired
//! decode/encode arm in the family's model.

use crate::error::{Error, Result};
use crate::node::{Node, Value};

/// Value shape a field must hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Boolean,
    Node,
    NodeList,
    StringList,
    StringMap,
}

impl FieldKind {
    pub fn name(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
            FieldKind::Node => "node",
            FieldKind::NodeList => "list of nodes",
            FieldKind::StringList => "list of strings",
            FieldKind::StringMap => "map of strings",
        }
    }

    /// Whether `value` has this shape
    pub fn admits(self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.as_str().is_some(),
            FieldKind::Integer => value.as_int().is_some(),
            FieldKind::Boolean => value.as_bool().is_some(),
            FieldKind::Node => value.as_node().is_some(),
            FieldKind::NodeList => value
                .as_list()
                .is_some_and(|items| items.iter().all(|i| i.as_node().is_some())),
            FieldKind::StringList => value
                .as_list()
                .is_some_and(|items| items.iter().all(|i| i.as_str().is_some())),
            FieldKind::StringMap => value
                .as_node()
                .is_some_and(|node| node.iter().all(|(_, v)| v.as_str().is_some())),
        }
    }
}

/// How a field participates in decode and diff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Must be present on decode
    Required,
    /// Absent means not set; dropping it clears the remote value
    Optional,
    /// Optional input the server fills in when omitted
    ServerDefault,
    /// Assigned by the server; accepted on decode, never diffed
    Computed,
    /// Required in configuration, but the server never returns it in clear,
    /// so responses may omit it
    WriteOnly,
}

impl Presence {
    pub fn name(self) -> &'static str {
        match self {
            Presence::Required => "required",
            Presence::Optional => "optional",
            Presence::ServerDefault => "server_default",
            Presence::Computed => "computed",
            Presence::WriteOnly => "write_only",
        }
    }
}

/// One declared field of a shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub presence: Presence,
}

impl FieldSpec {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            presence: Presence::Required,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            presence: Presence::Optional,
        }
    }

    pub const fn server_default(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            presence: Presence::ServerDefault,
        }
    }

    pub const fn computed(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            presence: Presence::Computed,
        }
    }

    pub const fn write_only(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            presence: Presence::WriteOnly,
        }
    }
}

/// A concrete shape: a variant of a family, or a plain block
#[derive(Debug, PartialEq, Eq)]
pub struct VariantDescriptor {
    /// Discriminator value for variants, block name for plain shapes
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

impl VariantDescriptor {
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn allows(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn presence(&self, name: &str) -> Option<Presence> {
        self.field(name).map(|f| f.presence)
    }
}

/// Closed set of variants sharing one discriminator field
#[derive(Debug)]
pub struct VariantRegistry {
    pub family: &'static str,
    pub discriminator: &'static str,
    pub variants: &'static [VariantDescriptor],
}

impl VariantRegistry {
    /// Find the descriptor for a discriminator value
    pub fn lookup(&'static self, value: &str) -> Result<&'static VariantDescriptor> {
        self.variants
            .iter()
            .find(|v| v.name == value)
            .ok_or_else(|| Error::UnrecognizedVariant {
                family: self.family,
                value: value.to_string(),
            })
    }

    /// Read the discriminator out of `node` and resolve it
    pub fn resolve(&'static self, node: &Node) -> Result<&'static VariantDescriptor> {
        let value = node
            .get(self.discriminator)
            .ok_or_else(|| Error::MissingRequiredField {
                shape: self.family,
                field: self.discriminator.to_string(),
            })?;
        let value = value.as_str().ok_or_else(|| Error::TypeMismatch {
            field: self.discriminator.to_string(),
            expected: "string",
            found: value.kind_name(),
        })?;
        self.lookup(value)
    }

    /// All known discriminator values
    pub fn discriminators(&self) -> impl Iterator<Item = &'static str> {
        self.variants.iter().map(|v| v.name)
    }

    /// Listing of every variant and its fields
    pub fn describe(&self) -> serde_json::Value {
        let variants: Vec<serde_json::Value> = self
            .variants
            .iter()
            .map(|variant| {
                let fields: Vec<serde_json::Value> = variant
                    .fields
                    .iter()
                    .map(|f| {
                        serde_json::json!({
                            "name": f.name,
                            "kind": f.kind.name(),
                            "presence": f.presence.name(),
                        })
                    })
                    .collect();
                serde_json::json!({ "name": variant.name, "fields": fields })
            })
            .collect();

        serde_json::json!({
            "family": self.family,
            "discriminator": self.discriminator,
            "variants": variants,
        })
    }
}

/// Every polymorphic family known to the crate
pub fn all_families() -> &'static [&'static VariantRegistry] {
    use crate::resource::{destination, property, trigger};
    static FAMILIES: [&VariantRegistry; 4] = [
        &trigger::TRIGGER_TYPES,
        &trigger::SECRET_TYPES,
        &property::PROPERTY_TYPES,
        &destination::DESTINATION_TYPES,
    ];
    &FAMILIES
}

/// Get a family by name
pub fn get_family(name: &str) -> Option<&'static VariantRegistry> {
    all_families().iter().copied().find(|f| f.family == name)
}
