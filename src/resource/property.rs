//! Pipeline trigger properties
//!
//! A property is a named value attached to a trigger. The same shape is
//! embedded in a trigger's `properties` list and managed on its own as the
//! `tekton_pipeline_trigger_property` kind.

use super::TEKTON_SERVICE;
use crate::diff::{ChangeSet, PatchScope};
use crate::error::{Error, Result};
use crate::identity::{CompositeId, IdentityShape};
use crate::mapper::{read_variant, FieldReader, Mapped, NodeWriter, UnknownFields};
use crate::node::Node;
use crate::reconciler::ResourceKind;
use crate::remote::client::segment;
use crate::remote::RemoteRequest;
use crate::variant::{FieldKind, FieldSpec, VariantDescriptor, VariantRegistry};

const TYPE: FieldSpec = FieldSpec::required("type", FieldKind::String);
const NAME: FieldSpec = FieldSpec::required("name", FieldKind::String);
const VALUE: FieldSpec = FieldSpec::optional("value", FieldKind::String);
const LOCKED: FieldSpec = FieldSpec::server_default("locked", FieldKind::Boolean);
const HREF: FieldSpec = FieldSpec::computed("href", FieldKind::String);

const TEXT: VariantDescriptor = VariantDescriptor {
    name: "text",
    fields: &[TYPE, NAME, VALUE, LOCKED, HREF],
};

const SECURE: VariantDescriptor = VariantDescriptor {
    name: "secure",
    fields: &[TYPE, NAME, VALUE, LOCKED, HREF],
};

const SINGLE_SELECT: VariantDescriptor = VariantDescriptor {
    name: "single_select",
    fields: &[
        TYPE,
        NAME,
        VALUE,
        LOCKED,
        HREF,
        FieldSpec::optional("enum", FieldKind::StringList),
    ],
};

const INTEGRATION: VariantDescriptor = VariantDescriptor {
    name: "integration",
    fields: &[
        TYPE,
        NAME,
        VALUE,
        LOCKED,
        HREF,
        FieldSpec::optional("path", FieldKind::String),
    ],
};

const APPCONFIG: VariantDescriptor = VariantDescriptor {
    name: "appconfig",
    fields: &[TYPE, NAME, VALUE, LOCKED, HREF],
};

/// Property shapes, selected by `type`
pub static PROPERTY_TYPES: VariantRegistry = VariantRegistry {
    family: "property",
    discriminator: "type",
    variants: &[TEXT, SECURE, SINGLE_SELECT, INTEGRATION, APPCONFIG],
};

/// Variant-specific part of a property
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyType {
    Text,
    /// Value is stored encrypted and never returned in clear
    Secure,
    SingleSelect { options: Option<Vec<String>> },
    /// Value resolved from a tool integration; `path` selects a field of it
    Integration { path: Option<String> },
    AppConfig,
}

impl PropertyType {
    pub fn name(&self) -> &'static str {
        self.descriptor().name
    }

    fn descriptor(&self) -> &'static VariantDescriptor {
        match self {
            PropertyType::Text => &TEXT,
            PropertyType::Secure => &SECURE,
            PropertyType::SingleSelect { .. } => &SINGLE_SELECT,
            PropertyType::Integration { .. } => &INTEGRATION,
            PropertyType::AppConfig => &APPCONFIG,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub kind: PropertyType,
    pub value: Option<String>,
    pub locked: Option<bool>,
    pub href: Option<String>,
}

impl Mapped for Property {
    fn decode_with(node: &Node, policy: UnknownFields) -> Result<Self> {
        let r = read_variant(node, &PROPERTY_TYPES, policy)?;
        let kind = match r.shape().name {
            "text" => PropertyType::Text,
            "secure" => PropertyType::Secure,
            "single_select" => PropertyType::SingleSelect {
                options: r.opt_strings("enum")?,
            },
            "integration" => PropertyType::Integration {
                path: r.opt_string("path")?,
            },
            "appconfig" => PropertyType::AppConfig,
            other => {
                return Err(Error::UnrecognizedVariant {
                    family: PROPERTY_TYPES.family,
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            name: r.string("name")?,
            kind,
            value: r.opt_string("value")?,
            locked: r.opt_bool("locked")?,
            href: r.opt_string("href")?,
        })
    }

    fn encode(&self) -> Node {
        let writer = NodeWriter::new()
            .string("type", self.kind.name())
            .string("name", &self.name)
            .opt_string("value", &self.value)
            .opt_bool("locked", self.locked)
            .opt_string("href", &self.href);

        match &self.kind {
            PropertyType::SingleSelect { options } => writer.opt_strings("enum", options),
            PropertyType::Integration { path } => writer.opt_string("path", path),
            PropertyType::Text | PropertyType::Secure | PropertyType::AppConfig => writer,
        }
        .finish()
    }

    fn descriptor(&self) -> &'static VariantDescriptor {
        self.kind.descriptor()
    }

    fn clear_computed(&mut self) {
        self.href = None;
    }
}

static TRIGGER_PROPERTY: VariantDescriptor = VariantDescriptor {
    name: "tekton_pipeline_trigger_property",
    fields: &[
        FieldSpec::required("pipeline_id", FieldKind::String),
        FieldSpec::required("trigger_id", FieldKind::String),
        FieldSpec::required("property", FieldKind::Node),
    ],
};

/// A property managed on its own, under an existing trigger
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerProperty {
    pub pipeline_id: String,
    pub trigger_id: String,
    pub property: Property,
}

impl Mapped for TriggerProperty {
    fn decode_with(node: &Node, policy: UnknownFields) -> Result<Self> {
        let r = FieldReader::new(node, &TRIGGER_PROPERTY, policy)?;
        Ok(Self {
            pipeline_id: r.string("pipeline_id")?,
            trigger_id: r.string("trigger_id")?,
            property: r.nested("property")?,
        })
    }

    fn encode(&self) -> Node {
        NodeWriter::new()
            .string("pipeline_id", &self.pipeline_id)
            .string("trigger_id", &self.trigger_id)
            .nested("property", &self.property)
            .finish()
    }

    fn descriptor(&self) -> &'static VariantDescriptor {
        &TRIGGER_PROPERTY
    }

    fn clear_computed(&mut self) {
        self.property.clear_computed();
    }
}

pub struct TriggerPropertyKind;

const IDENTITY: IdentityShape = IdentityShape::new(&["pipeline_id", "trigger_id", "name"]);

fn collection_path(pipeline_id: &str, trigger_id: &str) -> String {
    format!(
        "/tekton_pipelines/{}/triggers/{}/properties",
        segment(pipeline_id),
        segment(trigger_id)
    )
}

fn instance_path(id: &CompositeId) -> String {
    let part = |label| IDENTITY.get(id, label).unwrap_or_default();
    format!(
        "{}/{}",
        collection_path(part("pipeline_id"), part("trigger_id")),
        segment(part("name"))
    )
}

impl ResourceKind for TriggerPropertyKind {
    type Model = TriggerProperty;

    fn name(&self) -> &'static str {
        "tekton_pipeline_trigger_property"
    }

    fn service(&self) -> &'static str {
        TEKTON_SERVICE
    }

    fn identity(&self) -> IdentityShape {
        IDENTITY
    }

    fn immutable_fields(&self) -> &'static [&'static str] {
        &["pipeline_id", "trigger_id", "property.name"]
    }

    fn write_only_fields(&self, desired: &TriggerProperty) -> &'static [&'static str] {
        match desired.property.kind {
            PropertyType::Secure => &["value"],
            _ => &[],
        }
    }

    fn create_request(&self, desired: &TriggerProperty) -> RemoteRequest {
        let mut property = desired.property.clone();
        property.clear_computed();
        RemoteRequest::post(
            collection_path(&desired.pipeline_id, &desired.trigger_id),
            property.encode().to_json(),
        )
    }

    fn created_identity(&self, desired: &TriggerProperty, response: &Node) -> Result<CompositeId> {
        let name = response
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::MissingRequiredField {
                shape: "property",
                field: "name".to_string(),
            })?;
        IDENTITY.build(&[&desired.pipeline_id, &desired.trigger_id, name])
    }

    fn read_request(&self, id: &CompositeId) -> RemoteRequest {
        RemoteRequest::get(instance_path(id))
    }

    fn observe(&self, id: &CompositeId, response: &Node) -> Result<TriggerProperty> {
        Ok(TriggerProperty {
            pipeline_id: IDENTITY.get(id, "pipeline_id").unwrap_or_default().to_string(),
            trigger_id: IDENTITY.get(id, "trigger_id").unwrap_or_default().to_string(),
            property: Property::decode_with(response, UnknownFields::Ignore)?,
        })
    }

    fn patch_scope(&self, model: &TriggerProperty) -> PatchScope {
        // The name addresses the property and is part of its identity
        PatchScope::of(&model.property).without(&["name"])
    }

    fn update_request(&self, id: &CompositeId, changes: &ChangeSet) -> RemoteRequest {
        RemoteRequest::patch(instance_path(id), changes.to_patch())
    }

    fn delete_request(&self, id: &CompositeId) -> RemoteRequest {
        RemoteRequest::delete(instance_path(id))
    }
}
