//! Tekton pipeline triggers
//!
//! A trigger starts pipeline runs. Its shape depends on `type`: manual, Git
//! (`scm`), cron (`timer`) or an inbound webhook (`generic`). Generic
//! triggers carry a nested secret, itself a union on `type`.

use super::property::Property;
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
const EVENT_LISTENER: FieldSpec = FieldSpec::required("event_listener", FieldKind::String);
const TAGS: FieldSpec = FieldSpec::optional("tags", FieldKind::StringList);
const WORKER: FieldSpec = FieldSpec::optional("worker", FieldKind::Node);
const MAX_CONCURRENT_RUNS: FieldSpec = FieldSpec::optional("max_concurrent_runs", FieldKind::Integer);
const DISABLED: FieldSpec = FieldSpec::server_default("disabled", FieldKind::Boolean);
const PROPERTIES: FieldSpec = FieldSpec::server_default("properties", FieldKind::NodeList);
const ID: FieldSpec = FieldSpec::computed("id", FieldKind::String);
const HREF: FieldSpec = FieldSpec::computed("href", FieldKind::String);
const FILTER: FieldSpec = FieldSpec::optional("filter", FieldKind::String);
/// Create-only: copy an existing trigger instead of building one from fields
const SOURCE_TRIGGER_ID: FieldSpec = FieldSpec::optional("source_trigger_id", FieldKind::String);

const MANUAL: VariantDescriptor = VariantDescriptor {
    name: "manual",
    fields: &[
        TYPE,
        NAME,
        EVENT_LISTENER,
        TAGS,
        WORKER,
        MAX_CONCURRENT_RUNS,
        DISABLED,
        PROPERTIES,
        ID,
        HREF,
        SOURCE_TRIGGER_ID,
    ],
};

const SCM: VariantDescriptor = VariantDescriptor {
    name: "scm",
    fields: &[
        TYPE,
        NAME,
        EVENT_LISTENER,
        TAGS,
        WORKER,
        MAX_CONCURRENT_RUNS,
        DISABLED,
        PROPERTIES,
        ID,
        HREF,
        SOURCE_TRIGGER_ID,
        FILTER,
        FieldSpec::optional("scm_source", FieldKind::Node),
        FieldSpec::optional("events", FieldKind::Node),
        FieldSpec::server_default("enable_events_from_forks", FieldKind::Boolean),
    ],
};

const TIMER: VariantDescriptor = VariantDescriptor {
    name: "timer",
    fields: &[
        TYPE,
        NAME,
        EVENT_LISTENER,
        TAGS,
        WORKER,
        MAX_CONCURRENT_RUNS,
        DISABLED,
        PROPERTIES,
        ID,
        HREF,
        SOURCE_TRIGGER_ID,
        FieldSpec::optional("cron", FieldKind::String),
        FieldSpec::optional("timezone", FieldKind::String),
    ],
};

const GENERIC: VariantDescriptor = VariantDescriptor {
    name: "generic",
    fields: &[
        TYPE,
        NAME,
        EVENT_LISTENER,
        TAGS,
        WORKER,
        MAX_CONCURRENT_RUNS,
        DISABLED,
        PROPERTIES,
        ID,
        HREF,
        SOURCE_TRIGGER_ID,
        FILTER,
        FieldSpec::optional("secret", FieldKind::Node),
    ],
};

/// Trigger shapes, selected by `type`
pub static TRIGGER_TYPES: VariantRegistry = VariantRegistry {
    family: "trigger",
    discriminator: "type",
    variants: &[MANUAL, SCM, TIMER, GENERIC],
};

const SECRET_VALUE: FieldSpec = FieldSpec::optional("value", FieldKind::String);
const SECRET_SOURCE: FieldSpec = FieldSpec::optional("source", FieldKind::String);
const SECRET_KEY_NAME: FieldSpec = FieldSpec::optional("key_name", FieldKind::String);

const TOKEN_MATCHES: VariantDescriptor = VariantDescriptor {
    name: "token_matches",
    fields: &[TYPE, SECRET_VALUE, SECRET_SOURCE, SECRET_KEY_NAME],
};

const DIGEST_MATCHES: VariantDescriptor = VariantDescriptor {
    name: "digest_matches",
    fields: &[
        TYPE,
        SECRET_VALUE,
        SECRET_SOURCE,
        SECRET_KEY_NAME,
        FieldSpec::optional("algorithm", FieldKind::String),
    ],
};

const INTERNAL_VALIDATION: VariantDescriptor = VariantDescriptor {
    name: "internal_validation",
    fields: &[TYPE],
};

/// Generic webhook secret shapes, selected by `type`
pub static SECRET_TYPES: VariantRegistry = VariantRegistry {
    family: "secret",
    discriminator: "type",
    variants: &[TOKEN_MATCHES, DIGEST_MATCHES, INTERNAL_VALIDATION],
};

static WORKER_SHAPE: VariantDescriptor = VariantDescriptor {
    name: "worker",
    fields: &[
        FieldSpec::required("id", FieldKind::String),
        FieldSpec::computed("name", FieldKind::String),
        FieldSpec::computed("type", FieldKind::String),
    ],
};

static SCM_SOURCE_SHAPE: VariantDescriptor = VariantDescriptor {
    name: "scm_source",
    fields: &[
        FieldSpec::required("url", FieldKind::String),
        FieldSpec::optional("branch", FieldKind::String),
        FieldSpec::optional("pattern", FieldKind::String),
        FieldSpec::optional("blind_connection", FieldKind::Boolean),
        FieldSpec::computed("hook_id", FieldKind::String),
        FieldSpec::computed("service_instance_id", FieldKind::String),
    ],
};

static EVENTS_SHAPE: VariantDescriptor = VariantDescriptor {
    name: "events",
    fields: &[
        FieldSpec::optional("push", FieldKind::Boolean),
        FieldSpec::optional("pull_request", FieldKind::Boolean),
        FieldSpec::optional("pull_request_closed", FieldKind::Boolean),
    ],
};

/// Private worker a trigger runs on; name and type follow from the id
#[derive(Debug, Clone, PartialEq)]
pub struct Worker {
    pub id: String,
    pub name: Option<String>,
    pub worker_type: Option<String>,
}

impl Mapped for Worker {
    fn decode_with(node: &Node, policy: UnknownFields) -> Result<Self> {
        let r = FieldReader::new(node, &WORKER_SHAPE, policy)?;
        Ok(Self {
            id: r.string("id")?,
            name: r.opt_string("name")?,
            worker_type: r.opt_string("type")?,
        })
    }

    fn encode(&self) -> Node {
        NodeWriter::new()
            .string("id", &self.id)
            .opt_string("name", &self.name)
            .opt_string("type", &self.worker_type)
            .finish()
    }

    fn descriptor(&self) -> &'static VariantDescriptor {
        &WORKER_SHAPE
    }

    fn clear_computed(&mut self) {
        self.name = None;
        self.worker_type = None;
    }
}

/// Repository a Git trigger listens to
#[derive(Debug, Clone, PartialEq)]
pub struct ScmSource {
    pub url: String,
    pub branch: Option<String>,
    pub pattern: Option<String>,
    pub blind_connection: Option<bool>,
    pub hook_id: Option<String>,
    pub service_instance_id: Option<String>,
}

impl Mapped for ScmSource {
    fn decode_with(node: &Node, policy: UnknownFields) -> Result<Self> {
        let r = FieldReader::new(node, &SCM_SOURCE_SHAPE, policy)?;
        Ok(Self {
            url: r.string("url")?,
            branch: r.opt_string("branch")?,
            pattern: r.opt_string("pattern")?,
            blind_connection: r.opt_bool("blind_connection")?,
            hook_id: r.opt_string("hook_id")?,
            service_instance_id: r.opt_string("service_instance_id")?,
        })
    }

    fn encode(&self) -> Node {
        NodeWriter::new()
            .string("url", &self.url)
            .opt_string("branch", &self.branch)
            .opt_string("pattern", &self.pattern)
            .opt_bool("blind_connection", self.blind_connection)
            .opt_string("hook_id", &self.hook_id)
            .opt_string("service_instance_id", &self.service_instance_id)
            .finish()
    }

    fn descriptor(&self) -> &'static VariantDescriptor {
        &SCM_SOURCE_SHAPE
    }

    fn clear_computed(&mut self) {
        self.hook_id = None;
        self.service_instance_id = None;
    }
}

/// Git webhook events a Git trigger reacts to
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Events {
    pub push: Option<bool>,
    pub pull_request: Option<bool>,
    pub pull_request_closed: Option<bool>,
}

impl Mapped for Events {
    fn decode_with(node: &Node, policy: UnknownFields) -> Result<Self> {
        let r = FieldReader::new(node, &EVENTS_SHAPE, policy)?;
        Ok(Self {
            push: r.opt_bool("push")?,
            pull_request: r.opt_bool("pull_request")?,
            pull_request_closed: r.opt_bool("pull_request_closed")?,
        })
    }

    fn encode(&self) -> Node {
        NodeWriter::new()
            .opt_bool("push", self.push)
            .opt_bool("pull_request", self.pull_request)
            .opt_bool("pull_request_closed", self.pull_request_closed)
            .finish()
    }

    fn descriptor(&self) -> &'static VariantDescriptor {
        &EVENTS_SHAPE
    }
}

/// Where a webhook secret is found in the incoming request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecretSource {
    pub value: Option<String>,
    /// `header`, `payload` or `query`
    pub source: Option<String>,
    pub key_name: Option<String>,
}

impl SecretSource {
    fn read(r: &FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            value: r.opt_string("value")?,
            source: r.opt_string("source")?,
            key_name: r.opt_string("key_name")?,
        })
    }

    fn write(&self, writer: NodeWriter) -> NodeWriter {
        writer
            .opt_string("value", &self.value)
            .opt_string("source", &self.source)
            .opt_string("key_name", &self.key_name)
    }
}

/// Secret a generic webhook trigger validates requests with
#[derive(Debug, Clone, PartialEq)]
pub enum Secret {
    TokenMatches(SecretSource),
    DigestMatches {
        source: SecretSource,
        algorithm: Option<String>,
    },
    InternalValidation,
}

impl Mapped for Secret {
    fn decode_with(node: &Node, policy: UnknownFields) -> Result<Self> {
        let r = read_variant(node, &SECRET_TYPES, policy)?;
        match r.shape().name {
            "token_matches" => Ok(Secret::TokenMatches(SecretSource::read(&r)?)),
            "digest_matches" => Ok(Secret::DigestMatches {
                source: SecretSource::read(&r)?,
                algorithm: r.opt_string("algorithm")?,
            }),
            "internal_validation" => Ok(Secret::InternalValidation),
            other => Err(Error::UnrecognizedVariant {
                family: SECRET_TYPES.family,
                value: other.to_string(),
            }),
        }
    }

    fn encode(&self) -> Node {
        let writer = NodeWriter::new().string("type", self.descriptor().name);
        match self {
            Secret::TokenMatches(source) => source.write(writer),
            Secret::DigestMatches { source, algorithm } => {
                source.write(writer).opt_string("algorithm", algorithm)
            }
            Secret::InternalValidation => writer,
        }
        .finish()
    }

    fn descriptor(&self) -> &'static VariantDescriptor {
        match self {
            Secret::TokenMatches(_) => &TOKEN_MATCHES,
            Secret::DigestMatches { .. } => &DIGEST_MATCHES,
            Secret::InternalValidation => &INTERNAL_VALIDATION,
        }
    }
}

/// Fields every trigger type has
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerCommon {
    pub name: String,
    pub event_listener: String,
    pub tags: Option<Vec<String>>,
    pub worker: Option<Worker>,
    pub max_concurrent_runs: Option<i64>,
    pub disabled: Option<bool>,
    /// Declaration order is kept; the service resolves properties in order
    pub properties: Option<Vec<Property>>,
    pub id: Option<String>,
    pub href: Option<String>,
    /// Trigger to duplicate on create; the service does not return it
    pub source_trigger_id: Option<String>,
}

impl TriggerCommon {
    fn read(r: &FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            name: r.string("name")?,
            event_listener: r.string("event_listener")?,
            tags: r.opt_strings("tags")?,
            worker: r.opt_nested("worker")?,
            max_concurrent_runs: r.opt_int("max_concurrent_runs")?,
            disabled: r.opt_bool("disabled")?,
            properties: r.opt_list("properties")?,
            id: r.opt_string("id")?,
            href: r.opt_string("href")?,
            source_trigger_id: r.opt_string("source_trigger_id")?,
        })
    }

    fn write(&self, writer: NodeWriter) -> NodeWriter {
        writer
            .string("name", &self.name)
            .string("event_listener", &self.event_listener)
            .opt_strings("tags", &self.tags)
            .opt_nested("worker", &self.worker)
            .opt_int("max_concurrent_runs", self.max_concurrent_runs)
            .opt_bool("disabled", self.disabled)
            .opt_list("properties", &self.properties)
            .opt_string("id", &self.id)
            .opt_string("href", &self.href)
            .opt_string("source_trigger_id", &self.source_trigger_id)
    }

    fn clear_computed(&mut self) {
        self.id = None;
        self.href = None;
        if let Some(worker) = &mut self.worker {
            worker.clear_computed();
        }
        for property in self.properties.iter_mut().flatten() {
            property.clear_computed();
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    Manual(TriggerCommon),
    Scm {
        common: TriggerCommon,
        scm_source: Option<ScmSource>,
        events: Option<Events>,
        filter: Option<String>,
        enable_events_from_forks: Option<bool>,
    },
    Timer {
        common: TriggerCommon,
        cron: Option<String>,
        timezone: Option<String>,
    },
    Generic {
        common: TriggerCommon,
        secret: Option<Secret>,
        filter: Option<String>,
    },
}

impl Trigger {
    pub fn common(&self) -> &TriggerCommon {
        match self {
            Trigger::Manual(common)
            | Trigger::Scm { common, .. }
            | Trigger::Timer { common, .. }
            | Trigger::Generic { common, .. } => common,
        }
    }

    fn common_mut(&mut self) -> &mut TriggerCommon {
        match self {
            Trigger::Manual(common)
            | Trigger::Scm { common, .. }
            | Trigger::Timer { common, .. }
            | Trigger::Generic { common, .. } => common,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.descriptor().name
    }
}

impl Mapped for Trigger {
    fn decode_with(node: &Node, policy: UnknownFields) -> Result<Self> {
        let r = read_variant(node, &TRIGGER_TYPES, policy)?;
        let common = TriggerCommon::read(&r)?;
        match r.shape().name {
            "manual" => Ok(Trigger::Manual(common)),
            "scm" => Ok(Trigger::Scm {
                common,
                scm_source: r.opt_nested("scm_source")?,
                events: r.opt_nested("events")?,
                filter: r.opt_string("filter")?,
                enable_events_from_forks: r.opt_bool("enable_events_from_forks")?,
            }),
            "timer" => Ok(Trigger::Timer {
                common,
                cron: r.opt_string("cron")?,
                timezone: r.opt_string("timezone")?,
            }),
            "generic" => Ok(Trigger::Generic {
                common,
                secret: r.opt_nested("secret")?,
                filter: r.opt_string("filter")?,
            }),
            other => Err(Error::UnrecognizedVariant {
                family: TRIGGER_TYPES.family,
                value: other.to_string(),
            }),
        }
    }

    fn encode(&self) -> Node {
        let writer = self
            .common()
            .write(NodeWriter::new().string("type", self.type_name()));

        match self {
            Trigger::Manual(_) => writer,
            Trigger::Scm {
                scm_source,
                events,
                filter,
                enable_events_from_forks,
                ..
            } => writer
                .opt_nested("scm_source", scm_source)
                .opt_nested("events", events)
                .opt_string("filter", filter)
                .opt_bool("enable_events_from_forks", *enable_events_from_forks),
            Trigger::Timer { cron, timezone, .. } => writer
                .opt_string("cron", cron)
                .opt_string("timezone", timezone),
            Trigger::Generic { secret, filter, .. } => writer
                .opt_nested("secret", secret)
                .opt_string("filter", filter),
        }
        .finish()
    }

    fn descriptor(&self) -> &'static VariantDescriptor {
        match self {
            Trigger::Manual(_) => &MANUAL,
            Trigger::Scm { .. } => &SCM,
            Trigger::Timer { .. } => &TIMER,
            Trigger::Generic { .. } => &GENERIC,
        }
    }

    fn clear_computed(&mut self) {
        self.common_mut().clear_computed();
        if let Trigger::Scm {
            scm_source: Some(source),
            ..
        } = self
        {
            source.clear_computed();
        }
    }
}

static PIPELINE_TRIGGER: VariantDescriptor = VariantDescriptor {
    name: "tekton_pipeline_trigger",
    fields: &[
        FieldSpec::required("pipeline_id", FieldKind::String),
        FieldSpec::required("trigger", FieldKind::Node),
    ],
};

/// A trigger together with the pipeline it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineTrigger {
    pub pipeline_id: String,
    pub trigger: Trigger,
}

impl Mapped for PipelineTrigger {
    fn decode_with(node: &Node, policy: UnknownFields) -> Result<Self> {
        let r = FieldReader::new(node, &PIPELINE_TRIGGER, policy)?;
        Ok(Self {
            pipeline_id: r.string("pipeline_id")?,
            trigger: r.nested("trigger")?,
        })
    }

    fn encode(&self) -> Node {
        NodeWriter::new()
            .string("pipeline_id", &self.pipeline_id)
            .nested("trigger", &self.trigger)
            .finish()
    }

    fn descriptor(&self) -> &'static VariantDescriptor {
        &PIPELINE_TRIGGER
    }

    fn clear_computed(&mut self) {
        self.trigger.clear_computed();
    }
}

pub struct TriggerKind;

const IDENTITY: IdentityShape = IdentityShape::new(&["pipeline_id", "trigger_id"]);

fn collection_path(pipeline_id: &str) -> String {
    format!("/tekton_pipelines/{}/triggers", segment(pipeline_id))
}

fn instance_path(id: &CompositeId) -> String {
    format!(
        "{}/{}",
        collection_path(IDENTITY.get(id, "pipeline_id").unwrap_or_default()),
        segment(IDENTITY.get(id, "trigger_id").unwrap_or_default())
    )
}

impl ResourceKind for TriggerKind {
    type Model = PipelineTrigger;

    fn name(&self) -> &'static str {
        "tekton_pipeline_trigger"
    }

    fn service(&self) -> &'static str {
        TEKTON_SERVICE
    }

    fn identity(&self) -> IdentityShape {
        IDENTITY
    }

    fn immutable_fields(&self) -> &'static [&'static str] {
        &["pipeline_id", "trigger.type"]
    }

    fn write_only_fields(&self, _desired: &PipelineTrigger) -> &'static [&'static str] {
        &["secret.value"]
    }

    fn create_request(&self, desired: &PipelineTrigger) -> RemoteRequest {
        let path = collection_path(&desired.pipeline_id);
        let common = desired.trigger.common();
        if let Some(source) = &common.source_trigger_id {
            return RemoteRequest::post(
                path,
                serde_json::json!({ "source_trigger_id": source, "name": common.name }),
            );
        }

        let mut trigger = desired.trigger.clone();
        trigger.clear_computed();
        RemoteRequest::post(path, trigger.encode().to_json())
    }

    fn created_identity(&self, desired: &PipelineTrigger, response: &Node) -> Result<CompositeId> {
        let trigger_id = response
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::MissingRequiredField {
                shape: "trigger",
                field: "id".to_string(),
            })?;
        IDENTITY.build(&[&desired.pipeline_id, trigger_id])
    }

    fn read_request(&self, id: &CompositeId) -> RemoteRequest {
        RemoteRequest::get(instance_path(id))
    }

    fn observe(&self, id: &CompositeId, response: &Node) -> Result<PipelineTrigger> {
        Ok(PipelineTrigger {
            pipeline_id: IDENTITY.get(id, "pipeline_id").unwrap_or_default().to_string(),
            trigger: Trigger::decode_with(response, UnknownFields::Ignore)?,
        })
    }

    /// Properties are sent on create only; afterwards they are managed as
    /// `tekton_pipeline_trigger_property` resources.
    fn patch_scope(&self, model: &PipelineTrigger) -> PatchScope {
        PatchScope::of(&model.trigger).without(&["properties", "source_trigger_id"])
    }

    fn update_request(&self, id: &CompositeId, changes: &ChangeSet) -> RemoteRequest {
        RemoteRequest::patch(instance_path(id), changes.to_patch())
    }

    fn delete_request(&self, id: &CompositeId) -> RemoteRequest {
        RemoteRequest::delete(instance_path(id))
    }
}
