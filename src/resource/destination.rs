//! Event Notifications destinations
//!
//! The service nests the type-specific settings under `config.params`; the
//! display form keeps them next to `name` and `description`, so
//! [`to_wire`] and [`from_wire`] move them between the two layouts.

use super::EVENT_NOTIFICATIONS_SERVICE;
use crate::diff::{Change, ChangeSet, PatchScope};
use crate::error::{Error, Result};
use crate::identity::{CompositeId, IdentityShape};
use crate::mapper::{read_variant, FieldReader, Mapped, NodeWriter, UnknownFields};
use crate::node::{Node, Value};
use crate::reconciler::ResourceKind;
use crate::remote::client::segment;
use crate::remote::RemoteRequest;
use crate::variant::{FieldKind, FieldSpec, VariantDescriptor, VariantRegistry};
use std::collections::BTreeMap;

const TYPE: FieldSpec = FieldSpec::required("type", FieldKind::String);
const NAME: FieldSpec = FieldSpec::required("name", FieldKind::String);
const DESCRIPTION: FieldSpec = FieldSpec::optional("description", FieldKind::String);
const ID: FieldSpec = FieldSpec::computed("id", FieldKind::String);
const URL: FieldSpec = FieldSpec::required("url", FieldKind::String);

/// Fields that stay at the top level of the wire form
const ENVELOPE: &[&str] = &["type", "name", "description", "id"];

const WEBHOOK: VariantDescriptor = VariantDescriptor {
    name: "webhook",
    fields: &[
        TYPE,
        NAME,
        DESCRIPTION,
        ID,
        URL,
        FieldSpec::required("verb", FieldKind::String),
        FieldSpec::optional("custom_headers", FieldKind::StringMap),
        FieldSpec::optional("sensitive_headers", FieldKind::StringList),
    ],
};

const SLACK: VariantDescriptor = VariantDescriptor {
    name: "slack",
    fields: &[TYPE, NAME, DESCRIPTION, ID, URL],
};

const MSTEAMS: VariantDescriptor = VariantDescriptor {
    name: "msteams",
    fields: &[TYPE, NAME, DESCRIPTION, ID, URL],
};

const IBMCF: VariantDescriptor = VariantDescriptor {
    name: "ibmcf",
    fields: &[
        TYPE,
        NAME,
        DESCRIPTION,
        ID,
        URL,
        FieldSpec::write_only("api_key", FieldKind::String),
    ],
};

/// Destination shapes, selected by `type`
pub static DESTINATION_TYPES: VariantRegistry = VariantRegistry {
    family: "destination",
    discriminator: "type",
    variants: &[WEBHOOK, SLACK, MSTEAMS, IBMCF],
};

/// Type-specific destination settings
#[derive(Debug, Clone, PartialEq)]
pub enum DestinationParams {
    Webhook {
        url: String,
        /// HTTP verb, `get` or `post`
        verb: String,
        custom_headers: Option<BTreeMap<String, String>>,
        /// Names of custom headers whose values are masked
        sensitive_headers: Option<Vec<String>>,
    },
    Slack {
        url: String,
    },
    MsTeams {
        url: String,
    },
    /// IBM Cloud Functions action
    Ibmcf {
        url: String,
        /// Never returned by the service
        api_key: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Destination {
    pub name: String,
    pub description: Option<String>,
    pub params: DestinationParams,
    pub id: Option<String>,
}

impl Mapped for Destination {
    fn decode_with(node: &Node, policy: UnknownFields) -> Result<Self> {
        let r = read_variant(node, &DESTINATION_TYPES, policy)?;
        let params = match r.shape().name {
            "webhook" => DestinationParams::Webhook {
                url: r.string("url")?,
                verb: r.string("verb")?,
                custom_headers: r.opt_string_map("custom_headers")?,
                sensitive_headers: r.opt_strings("sensitive_headers")?,
            },
            "slack" => DestinationParams::Slack {
                url: r.string("url")?,
            },
            "msteams" => DestinationParams::MsTeams {
                url: r.string("url")?,
            },
            "ibmcf" => DestinationParams::Ibmcf {
                url: r.string("url")?,
                api_key: r.opt_string("api_key")?,
            },
            other => {
                return Err(Error::UnrecognizedVariant {
                    family: DESTINATION_TYPES.family,
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            name: r.string("name")?,
            description: r.opt_string("description")?,
            params,
            id: r.opt_string("id")?,
        })
    }

    fn encode(&self) -> Node {
        let writer = NodeWriter::new()
            .string("type", self.descriptor().name)
            .string("name", &self.name)
            .opt_string("description", &self.description)
            .opt_string("id", &self.id);

        match &self.params {
            DestinationParams::Webhook {
                url,
                verb,
                custom_headers,
                sensitive_headers,
            } => writer
                .string("url", url)
                .string("verb", verb)
                .opt_string_map("custom_headers", custom_headers)
                .opt_strings("sensitive_headers", sensitive_headers),
            DestinationParams::Slack { url } | DestinationParams::MsTeams { url } => {
                writer.string("url", url)
            }
            DestinationParams::Ibmcf { url, api_key } => {
                writer.string("url", url).opt_string("api_key", api_key)
            }
        }
        .finish()
    }

    fn descriptor(&self) -> &'static VariantDescriptor {
        match self.params {
            DestinationParams::Webhook { .. } => &WEBHOOK,
            DestinationParams::Slack { .. } => &SLACK,
            DestinationParams::MsTeams { .. } => &MSTEAMS,
            DestinationParams::Ibmcf { .. } => &IBMCF,
        }
    }

    fn clear_computed(&mut self) {
        self.id = None;
    }
}

/// Service layout of a flat destination node: settings under `config.params`.
pub fn to_wire(flat: &Node) -> Node {
    let mut wire = Node::new();
    let mut params = Node::new();
    for (key, value) in flat.iter() {
        if ENVELOPE.contains(&key.as_str()) {
            wire.set(key.as_str(), value.clone());
        } else {
            params.set(key.as_str(), value.clone());
        }
    }
    if !params.is_empty() {
        wire.set("config", Node::new().with("params", params));
    }
    wire
}

/// Flat display layout of a service response. Other `config` members are
/// dropped.
pub fn from_wire(wire: &Node) -> Node {
    let mut flat = Node::new();
    for (key, value) in wire.iter() {
        if key == "config" {
            if let Some(params) = value.as_node().and_then(|c| c.get("params")).and_then(Value::as_node) {
                for (param, v) in params.iter() {
                    flat.set(param.as_str(), v.clone());
                }
            }
        } else {
            flat.set(key.as_str(), value.clone());
        }
    }
    flat
}

/// Merge patch in the service layout
fn patch_to_wire(changes: &ChangeSet) -> serde_json::Value {
    let mut envelope = serde_json::Map::new();
    let mut params = serde_json::Map::new();
    for (field, change) in changes.iter() {
        let value = match change {
            Change::Set(v) => v.to_json(),
            Change::Clear => serde_json::Value::Null,
        };
        if ENVELOPE.contains(&field.as_str()) {
            envelope.insert(field.clone(), value);
        } else {
            params.insert(field.clone(), value);
        }
    }
    if !params.is_empty() {
        envelope.insert(
            "config".to_string(),
            serde_json::json!({ "params": serde_json::Value::Object(params) }),
        );
    }
    serde_json::Value::Object(envelope)
}

static INSTANCE_DESTINATION: VariantDescriptor = VariantDescriptor {
    name: "en_destination",
    fields: &[
        FieldSpec::required("instance_id", FieldKind::String),
        FieldSpec::required("destination", FieldKind::Node),
    ],
};

/// A destination within an Event Notifications instance
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceDestination {
    pub instance_id: String,
    pub destination: Destination,
}

impl Mapped for InstanceDestination {
    fn decode_with(node: &Node, policy: UnknownFields) -> Result<Self> {
        let r = FieldReader::new(node, &INSTANCE_DESTINATION, policy)?;
        Ok(Self {
            instance_id: r.string("instance_id")?,
            destination: r.nested("destination")?,
        })
    }

    fn encode(&self) -> Node {
        NodeWriter::new()
            .string("instance_id", &self.instance_id)
            .nested("destination", &self.destination)
            .finish()
    }

    fn descriptor(&self) -> &'static VariantDescriptor {
        &INSTANCE_DESTINATION
    }

    fn clear_computed(&mut self) {
        self.destination.clear_computed();
    }
}

pub struct DestinationKind;

const IDENTITY: IdentityShape = IdentityShape::new(&["instance_id", "destination_id"]);

fn collection_path(instance_id: &str) -> String {
    format!("/v1/instances/{}/destinations", segment(instance_id))
}

fn instance_path(id: &CompositeId) -> String {
    format!(
        "{}/{}",
        collection_path(IDENTITY.get(id, "instance_id").unwrap_or_default()),
        segment(IDENTITY.get(id, "destination_id").unwrap_or_default())
    )
}

impl ResourceKind for DestinationKind {
    type Model = InstanceDestination;

    fn name(&self) -> &'static str {
        "en_destination"
    }

    fn service(&self) -> &'static str {
        EVENT_NOTIFICATIONS_SERVICE
    }

    fn identity(&self) -> IdentityShape {
        IDENTITY
    }

    fn immutable_fields(&self) -> &'static [&'static str] {
        &["instance_id", "destination.type"]
    }

    fn write_only_fields(&self, desired: &InstanceDestination) -> &'static [&'static str] {
        match desired.destination.params {
            DestinationParams::Ibmcf { .. } => &["api_key"],
            _ => &[],
        }
    }

    fn create_request(&self, desired: &InstanceDestination) -> RemoteRequest {
        let mut destination = desired.destination.clone();
        destination.clear_computed();
        RemoteRequest::post(
            collection_path(&desired.instance_id),
            to_wire(&destination.encode()).to_json(),
        )
    }

    fn created_identity(&self, desired: &InstanceDestination, response: &Node) -> Result<CompositeId> {
        let destination_id = response
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::MissingRequiredField {
                shape: "destination",
                field: "id".to_string(),
            })?;
        IDENTITY.build(&[&desired.instance_id, destination_id])
    }

    fn read_request(&self, id: &CompositeId) -> RemoteRequest {
        RemoteRequest::get(instance_path(id))
    }

    fn observe(&self, id: &CompositeId, response: &Node) -> Result<InstanceDestination> {
        Ok(InstanceDestination {
            instance_id: IDENTITY.get(id, "instance_id").unwrap_or_default().to_string(),
            destination: Destination::decode_with(&from_wire(response), UnknownFields::Ignore)?,
        })
    }

    fn patch_scope(&self, model: &InstanceDestination) -> PatchScope {
        PatchScope::of(&model.destination)
    }

    fn update_request(&self, id: &CompositeId, changes: &ChangeSet) -> RemoteRequest {
        RemoteRequest::patch(instance_path(id), patch_to_wire(changes))
    }

    fn delete_request(&self, id: &CompositeId) -> RemoteRequest {
        RemoteRequest::delete(instance_path(id))
    }
}
