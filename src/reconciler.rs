//! CRUD reconciler
//!
//! Drives one resource instance through create, read, update, delete and
//! import against an injected [`RemoteClient`]. Per instance the lifecycle is
//!
//! ```text
//! Absent -> Creating -> Present -> (Updating -> Present)* -> Deleting -> Absent
//! ```
//!
//! The stored identity is written only after the call that justifies it has
//! succeeded, so a failed or cancelled call leaves [`ResourceState`] exactly
//! as it was. Each operation issues its calls strictly one after another.

use crate::diff::{self, ChangeSet, PatchScope};
use crate::error::{Error, Operation, ReconcileError, Result};
use crate::identity::{CompositeId, IdentityShape};
use crate::mapper::{Mapped, UnknownFields};
use crate::node::Node;
use crate::remote::{RemoteClient, RemoteRequest};
use std::sync::Arc;

/// One concrete remote resource type: its model, identity and REST shape.
pub trait ResourceKind: Send + Sync {
    /// Typed configuration and display form of one instance
    type Model: Mapped + Clone + Send + Sync;

    /// Kind name used by the host tool, e.g. `tekton_pipeline_trigger`
    fn name(&self) -> &'static str;

    /// Service whose endpoint the kind's calls go to
    fn service(&self) -> &'static str;

    fn identity(&self) -> IdentityShape;

    /// Dotted paths into the encoded model that cannot change in place
    fn immutable_fields(&self) -> &'static [&'static str] {
        &[]
    }

    /// Dotted paths into the patch scope the service never returns
    fn write_only_fields(&self, _desired: &Self::Model) -> &'static [&'static str] {
        &[]
    }

    fn create_request(&self, desired: &Self::Model) -> RemoteRequest;

    /// Identity of a freshly created instance, from the create call's response
    fn created_identity(&self, desired: &Self::Model, response: &Node) -> Result<CompositeId>;

    fn read_request(&self, id: &CompositeId) -> RemoteRequest;

    /// Typed model from a read response. Parent ids come from `id`.
    fn observe(&self, id: &CompositeId, response: &Node) -> Result<Self::Model>;

    /// The part of the model a partial update covers
    fn patch_scope(&self, model: &Self::Model) -> PatchScope;

    fn update_request(&self, id: &CompositeId, changes: &ChangeSet) -> RemoteRequest;

    fn delete_request(&self, id: &CompositeId) -> RemoteRequest;
}

/// Lifecycle phase of one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Absent,
    Creating,
    Present,
    Updating,
    Deleting,
}

/// What the host tool persists between operations, plus the last snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState<M> {
    pub id: Option<CompositeId>,
    pub snapshot: Option<M>,
}

impl<M> Default for ResourceState<M> {
    fn default() -> Self {
        Self {
            id: None,
            snapshot: None,
        }
    }
}

impl<M> ResourceState<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// State for a previously stored identity, with nothing observed yet
    pub fn with_id(id: CompositeId) -> Self {
        Self {
            id: Some(id),
            snapshot: None,
        }
    }

    pub fn clear(&mut self) {
        self.id = None;
        self.snapshot = None;
    }

    pub fn phase(&self) -> Phase {
        match self.id {
            Some(_) => Phase::Present,
            None => Phase::Absent,
        }
    }
}

/// Result of a successful read-like operation
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Display form of the observed instance
    Present(Node),
    Absent,
}

impl Observation {
    pub fn is_absent(&self) -> bool {
        matches!(self, Observation::Absent)
    }

    pub fn node(&self) -> Option<&Node> {
        match self {
            Observation::Present(node) => Some(node),
            Observation::Absent => None,
        }
    }
}

/// Reconciler for one resource kind, bound to one remote client
pub struct Reconciler<K: ResourceKind> {
    kind: K,
    client: Arc<dyn RemoteClient>,
}

impl<K: ResourceKind> Reconciler<K> {
    pub fn new(kind: K, client: Arc<dyn RemoteClient>) -> Self {
        Self { kind, client }
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }

    fn fail(&self, operation: Operation) -> impl Fn(Error) -> ReconcileError + '_ {
        move |source| {
            tracing::warn!("{} {} failed: {}", operation, self.kind.name(), source);
            ReconcileError::new(self.kind.name(), operation, source)
        }
    }

    fn transition(&self, id: Option<&CompositeId>, from: Phase, to: Phase) {
        match id {
            Some(id) => tracing::debug!("{} {}: {:?} -> {:?}", self.kind.name(), id, from, to),
            None => tracing::debug!("{}: {:?} -> {:?}", self.kind.name(), from, to),
        }
    }

    /// GET the instance. `None` means the service answered 404.
    async fn fetch(&self, id: &CompositeId) -> Result<Option<K::Model>> {
        let response = match self.client.call(self.kind.read_request(id)).await {
            Ok(response) => response,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let node = Node::from_json(response)?;
        self.kind.observe(id, &node).map(Some)
    }

    /// Create the instance described by `config`, then read it back.
    pub async fn create(
        &self,
        state: &mut ResourceState<K::Model>,
        config: &Node,
    ) -> std::result::Result<Observation, ReconcileError> {
        let fail = self.fail(Operation::Create);
        if let Some(id) = &state.id {
            return Err(fail(Error::AlreadyExists {
                identity: id.encode(),
            }));
        }
        let desired = K::Model::decode(config).map_err(&fail)?;

        tracing::info!("Creating {}", self.kind.name());
        self.transition(None, state.phase(), Phase::Creating);

        let response = self
            .client
            .call(self.kind.create_request(&desired))
            .await
            .map_err(|e| fail(e.into()))?;
        let response = Node::from_json(response).map_err(&fail)?;
        let id = self
            .kind
            .created_identity(&desired, &response)
            .map_err(&fail)?;

        tracing::info!("Created {} {}", self.kind.name(), id);
        self.transition(Some(&id), Phase::Creating, Phase::Present);
        state.id = Some(id);
        state.snapshot = None;

        // The identity stays stored even when the read-back fails.
        self.read(state)
            .await
            .map_err(|e| ReconcileError::new(e.kind, Operation::Create, e.source))
    }

    /// Refresh the snapshot. A 404 clears the state and reports absence.
    pub async fn read(
        &self,
        state: &mut ResourceState<K::Model>,
    ) -> std::result::Result<Observation, ReconcileError> {
        let Some(id) = state.id.clone() else {
            return Ok(Observation::Absent);
        };

        match self.fetch(&id).await.map_err(self.fail(Operation::Read))? {
            Some(model) => {
                let display = model.encode();
                state.snapshot = Some(model);
                Ok(Observation::Present(display))
            }
            None => {
                tracing::info!("{} {} no longer exists", self.kind.name(), id);
                self.transition(Some(&id), Phase::Present, Phase::Absent);
                state.clear();
                Ok(Observation::Absent)
            }
        }
    }

    /// Apply the difference between the last snapshot and `config`. No
    /// changes means no remote calls at all.
    pub async fn update(
        &self,
        state: &mut ResourceState<K::Model>,
        config: &Node,
    ) -> std::result::Result<Observation, ReconcileError> {
        let fail = self.fail(Operation::Update);
        let id = state.id.clone().ok_or(Error::NotFound).map_err(&fail)?;
        let desired = K::Model::decode(config).map_err(&fail)?;

        let observed = match state.snapshot.clone() {
            Some(snapshot) => snapshot,
            None => match self.fetch(&id).await.map_err(&fail)? {
                Some(model) => {
                    state.snapshot = Some(model.clone());
                    model
                }
                None => {
                    tracing::info!("{} {} no longer exists", self.kind.name(), id);
                    state.clear();
                    return Ok(Observation::Absent);
                }
            },
        };

        diff::check_immutable(
            &observed.encode(),
            &desired.encode(),
            self.kind.immutable_fields(),
        )
        .map_err(&fail)?;

        let desired_scope = self.kind.patch_scope(&desired);
        let mut observed_scope = self.kind.patch_scope(&observed);
        observed_scope.mask_write_only(&desired_scope, self.kind.write_only_fields(&desired));
        let changes = diff::plan(&observed_scope, &desired_scope);

        if changes.is_empty() {
            tracing::debug!("{} {} is up to date", self.kind.name(), id);
            return Ok(Observation::Present(observed.encode()));
        }

        tracing::info!(
            "Updating {} {} ({})",
            self.kind.name(),
            id,
            changes.fields().collect::<Vec<_>>().join(", ")
        );
        self.transition(Some(&id), Phase::Present, Phase::Updating);

        self.client
            .call(self.kind.update_request(&id, &changes))
            .await
            .map_err(|e| fail(e.into()))?;

        self.transition(Some(&id), Phase::Updating, Phase::Present);
        state.snapshot = None;
        self.read(state).await
    }

    /// Delete the instance. A 404 means it is already gone.
    pub async fn delete(
        &self,
        state: &mut ResourceState<K::Model>,
    ) -> std::result::Result<(), ReconcileError> {
        let Some(id) = state.id.clone() else {
            return Ok(());
        };

        tracing::info!("Deleting {} {}", self.kind.name(), id);
        self.transition(Some(&id), state.phase(), Phase::Deleting);

        match self.client.call(self.kind.delete_request(&id)).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!("{} {} was already deleted", self.kind.name(), id);
            }
            Err(e) => return Err(self.fail(Operation::Delete)(e.into())),
        }

        self.transition(Some(&id), Phase::Deleting, Phase::Absent);
        state.clear();
        Ok(())
    }

    /// Adopt an existing instance by its stored identity string.
    pub async fn import(
        &self,
        state: &mut ResourceState<K::Model>,
        raw: &str,
    ) -> std::result::Result<Observation, ReconcileError> {
        let fail = self.fail(Operation::Import);
        let id = self.kind.identity().parse(raw).map_err(&fail)?;

        tracing::info!("Importing {} {}", self.kind.name(), id);
        let model = self
            .fetch(&id)
            .await
            .map_err(&fail)?
            .ok_or(Error::NotFound)
            .map_err(&fail)?;

        let display = model.encode();
        state.id = Some(id);
        state.snapshot = Some(model);
        Ok(Observation::Present(display))
    }
}

/// Decode a response body under the read-path policy.
pub fn decode_response<T: Mapped>(response: &Node) -> Result<T> {
    T::decode_with(response, UnknownFields::Ignore)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::{FieldReader, NodeWriter};
    use crate::remote::{Method, RemoteError};
    use crate::variant::{FieldKind, FieldSpec, VariantDescriptor};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Answers calls from a fixed script and records every request.
    #[derive(Default)]
    struct ScriptedClient {
        responses: Mutex<VecDeque<std::result::Result<Value, u16>>>,
        requests: Mutex<Vec<RemoteRequest>>,
    }

    impl ScriptedClient {
        fn new(responses: Vec<std::result::Result<Value, u16>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<RemoteRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteClient for ScriptedClient {
        async fn call(&self, request: RemoteRequest) -> std::result::Result<Value, RemoteError> {
            self.requests.lock().unwrap().push(request.clone());
            match self.responses.lock().unwrap().pop_front() {
                Some(Ok(body)) => Ok(body),
                Some(Err(status)) => Err(RemoteError::status(&request, status, "scripted failure")),
                None => panic!("unexpected call: {} {}", request.method, request.path),
            }
        }
    }

    static WIDGET: VariantDescriptor = VariantDescriptor {
        name: "widget",
        fields: &[
            FieldSpec::required("group_id", FieldKind::String),
            FieldSpec::required("name", FieldKind::String),
            FieldSpec::optional("size", FieldKind::Integer),
            FieldSpec::server_default("color", FieldKind::String),
            FieldSpec::optional("token", FieldKind::String),
            FieldSpec::computed("id", FieldKind::String),
        ],
    };

    #[derive(Debug, Clone, PartialEq)]
    struct Widget {
        group_id: String,
        name: String,
        size: Option<i64>,
        color: Option<String>,
        token: Option<String>,
        id: Option<String>,
    }

    impl Mapped for Widget {
        fn decode_with(node: &Node, policy: UnknownFields) -> Result<Self> {
            let r = FieldReader::new(node, &WIDGET, policy)?;
            Ok(Self {
                group_id: r.string("group_id")?,
                name: r.string("name")?,
                size: r.opt_int("size")?,
                color: r.opt_string("color")?,
                token: r.opt_string("token")?,
                id: r.opt_string("id")?,
            })
        }

        fn encode(&self) -> Node {
            NodeWriter::new()
                .string("group_id", &self.group_id)
                .string("name", &self.name)
                .opt_int("size", self.size)
                .opt_string("color", &self.color)
                .opt_string("token", &self.token)
                .opt_string("id", &self.id)
                .finish()
        }

        fn descriptor(&self) -> &'static VariantDescriptor {
            &WIDGET
        }
    }

    struct WidgetKind;

    impl ResourceKind for WidgetKind {
        type Model = Widget;

        fn name(&self) -> &'static str {
            "widget"
        }

        fn service(&self) -> &'static str {
            "widgets"
        }

        fn identity(&self) -> IdentityShape {
            IdentityShape::new(&["group_id", "widget_id"])
        }

        fn immutable_fields(&self) -> &'static [&'static str] {
            &["group_id"]
        }

        fn write_only_fields(&self, _desired: &Widget) -> &'static [&'static str] {
            &["token"]
        }

        fn create_request(&self, desired: &Widget) -> RemoteRequest {
            let mut body = desired.encode();
            body.remove("group_id");
            RemoteRequest::post(format!("/groups/{}/widgets", desired.group_id), body.to_json())
        }

        fn created_identity(&self, desired: &Widget, response: &Node) -> Result<CompositeId> {
            let id = response
                .get("id")
                .and_then(|v| v.as_str())
                .ok_or_else(|| Error::MissingRequiredField {
                    shape: "widget",
                    field: "id".into(),
                })?;
            self.identity().build(&[&desired.group_id, id])
        }

        fn read_request(&self, id: &CompositeId) -> RemoteRequest {
            RemoteRequest::get(format!("/groups/{}/widgets/{}", id.parts()[0], id.parts()[1]))
        }

        fn observe(&self, id: &CompositeId, response: &Node) -> Result<Widget> {
            let node = response.clone().with("group_id", id.parts()[0].as_str());
            decode_response(&node)
        }

        fn patch_scope(&self, model: &Widget) -> PatchScope {
            PatchScope::of(model).without(&["group_id"])
        }

        fn update_request(&self, id: &CompositeId, changes: &ChangeSet) -> RemoteRequest {
            RemoteRequest::patch(
                format!("/groups/{}/widgets/{}", id.parts()[0], id.parts()[1]),
                changes.to_patch(),
            )
        }

        fn delete_request(&self, id: &CompositeId) -> RemoteRequest {
            RemoteRequest::delete(format!("/groups/{}/widgets/{}", id.parts()[0], id.parts()[1]))
        }
    }

    fn reconciler(client: &Arc<ScriptedClient>) -> Reconciler<WidgetKind> {
        let client: Arc<dyn RemoteClient> = client.clone();
        Reconciler::new(WidgetKind, client)
    }

    fn config(json: Value) -> Node {
        Node::from_json(json).unwrap()
    }

    fn stored(raw: &str) -> ResourceState<Widget> {
        ResourceState::with_id(WidgetKind.identity().parse(raw).unwrap())
    }

    fn present(json: Value) -> ResourceState<Widget> {
        let mut state = stored("g1/w1");
        state.snapshot = Some(Widget::decode_with(&config(json), UnknownFields::Ignore).unwrap());
        state
    }

    #[test]
    fn test_create_stores_identity_then_reads() {
        let client = ScriptedClient::new(vec![
            Ok(json!({"id": "w1", "name": "gear"})),
            Ok(json!({"id": "w1", "name": "gear", "color": "blue", "created_at": "now"})),
        ]);
        let mut state = ResourceState::new();

        let observed = tokio_test::block_on(
            reconciler(&client).create(&mut state, &config(json!({"group_id": "g1", "name": "gear"}))),
        )
        .unwrap();

        assert_eq!(state.id.as_ref().map(|id| id.encode()), Some("g1/w1".to_string()));
        assert_eq!(
            observed.node().and_then(|n| n.get("color")).and_then(|v| v.as_str()),
            Some("blue")
        );

        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, Method::Post);
        assert_eq!(requests[0].path, "/groups/g1/widgets");
        assert_eq!(requests[0].body, Some(json!({"name": "gear"})));
        assert_eq!(requests[1].method, Method::Get);
        assert_eq!(requests[1].path, "/groups/g1/widgets/w1");
    }

    #[test]
    fn test_create_failure_leaves_no_identity() {
        let client = ScriptedClient::new(vec![Err(500)]);
        let mut state = ResourceState::new();

        let err = tokio_test::block_on(
            reconciler(&client).create(&mut state, &config(json!({"group_id": "g1", "name": "gear"}))),
        )
        .unwrap_err();

        assert_eq!(err.operation, Operation::Create);
        assert!(matches!(err.source, Error::RemoteCallFailed(ref e) if e.status == Some(500)));
        assert_eq!(state.id, None);
    }

    #[test]
    fn test_create_keeps_identity_when_read_back_fails() {
        let client = ScriptedClient::new(vec![Ok(json!({"id": "w1"})), Err(500)]);
        let mut state = ResourceState::new();

        let err = tokio_test::block_on(
            reconciler(&client).create(&mut state, &config(json!({"group_id": "g1", "name": "gear"}))),
        )
        .unwrap_err();

        assert_eq!(err.operation, Operation::Create);
        assert!(matches!(err.source, Error::RemoteCallFailed(ref e) if e.status == Some(500)));
        assert_eq!(state.id.as_ref().map(|id| id.encode()), Some("g1/w1".to_string()));
    }

    #[test]
    fn test_create_over_stored_identity_is_rejected() {
        let client = ScriptedClient::new(vec![]);
        let mut state = stored("g1/w1");

        let err = tokio_test::block_on(
            reconciler(&client).create(&mut state, &config(json!({"group_id": "g1", "name": "gear"}))),
        )
        .unwrap_err();

        assert_eq!(
            err.source,
            Error::AlreadyExists {
                identity: "g1/w1".into()
            }
        );
        assert_eq!(state, stored("g1/w1"));
        assert!(client.requests().is_empty());
    }

    #[test]
    fn test_invalid_config_fails_before_any_call() {
        let client = ScriptedClient::new(vec![]);
        let mut state = ResourceState::new();

        let err = tokio_test::block_on(
            reconciler(&client).create(&mut state, &config(json!({"group_id": "g1"}))),
        )
        .unwrap_err();

        assert!(matches!(err.source, Error::MissingRequiredField { .. }));
        assert!(err.to_string().starts_with("create widget: "));
        assert!(client.requests().is_empty());
    }

    #[test]
    fn test_read_not_found_clears_identity() {
        let client = ScriptedClient::new(vec![Err(404)]);
        let mut state = stored("g1/w1");

        let observed = tokio_test::block_on(reconciler(&client).read(&mut state)).unwrap();

        assert!(observed.is_absent());
        assert_eq!(state.phase(), Phase::Absent);
    }

    #[test]
    fn test_read_failure_keeps_identity() {
        let client = ScriptedClient::new(vec![Err(503)]);
        let mut state = stored("g1/w1");

        let err = tokio_test::block_on(reconciler(&client).read(&mut state)).unwrap_err();

        assert_eq!(err.operation, Operation::Read);
        assert!(err.to_string().contains("returned 503"));
        assert!(state.id.is_some());
    }

    #[test]
    fn test_update_without_changes_makes_no_calls() {
        let client = ScriptedClient::new(vec![]);
        let mut state = present(json!({"group_id": "g1", "name": "gear", "color": "blue", "id": "w1"}));
        let desired = config(json!({"group_id": "g1", "name": "gear"}));

        for _ in 0..2 {
            let observed =
                tokio_test::block_on(reconciler(&client).update(&mut state, &desired)).unwrap();
            assert!(!observed.is_absent());
        }
        assert!(client.requests().is_empty());
    }

    #[test]
    fn test_update_sends_only_changes_then_reads() {
        let client = ScriptedClient::new(vec![
            Ok(Value::Null),
            Ok(json!({"id": "w1", "name": "gear", "size": 3})),
        ]);
        let mut state = present(json!({"group_id": "g1", "name": "gear", "token": "abc", "id": "w1"}));
        let desired = config(json!({"group_id": "g1", "name": "gear", "size": 3}));

        tokio_test::block_on(reconciler(&client).update(&mut state, &desired)).unwrap();

        let requests = client.requests();
        assert_eq!(requests[0].method, Method::Patch);
        assert_eq!(requests[0].body, Some(json!({"size": 3})));
        assert_eq!(requests[1].method, Method::Get);
        assert_eq!(state.snapshot.as_ref().and_then(|w| w.size), Some(3));
    }

    #[test]
    fn test_update_clears_removed_field() {
        let client = ScriptedClient::new(vec![
            Ok(Value::Null),
            Ok(json!({"id": "w1", "name": "gear"})),
        ]);
        let mut state = present(json!({"group_id": "g1", "name": "gear", "size": 2, "id": "w1"}));

        tokio_test::block_on(
            reconciler(&client).update(&mut state, &config(json!({"group_id": "g1", "name": "gear"}))),
        )
        .unwrap();

        assert_eq!(client.requests()[0].body, Some(json!({"size": null})));
    }

    #[test]
    fn test_update_rejects_immutable_change_without_calls() {
        let client = ScriptedClient::new(vec![]);
        let mut state = present(json!({"group_id": "g1", "name": "gear", "id": "w1"}));

        let err = tokio_test::block_on(
            reconciler(&client).update(&mut state, &config(json!({"group_id": "g2", "name": "gear"}))),
        )
        .unwrap_err();

        assert_eq!(
            err.source,
            Error::ImmutableFieldChanged {
                field: "group_id".into()
            }
        );
        assert!(client.requests().is_empty());
        assert!(state.id.is_some());
    }

    #[test]
    fn test_update_without_identity_is_not_found() {
        let client = ScriptedClient::new(vec![]);
        let mut state = ResourceState::new();

        let err = tokio_test::block_on(
            reconciler(&client).update(&mut state, &config(json!({"group_id": "g1", "name": "gear"}))),
        )
        .unwrap_err();

        assert_eq!(err.source, Error::NotFound);
    }

    #[test]
    fn test_update_without_snapshot_reads_first() {
        let client = ScriptedClient::new(vec![Ok(json!({"id": "w1", "name": "gear"}))]);
        let mut state = stored("g1/w1");

        tokio_test::block_on(
            reconciler(&client).update(&mut state, &config(json!({"group_id": "g1", "name": "gear"}))),
        )
        .unwrap();

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::Get);
        assert!(state.snapshot.is_some());
    }

    #[test]
    fn test_update_of_vanished_resource_reports_absent() {
        let client = ScriptedClient::new(vec![Err(404)]);
        let mut state = stored("g1/w1");

        let observed = tokio_test::block_on(
            reconciler(&client).update(&mut state, &config(json!({"group_id": "g1", "name": "gear"}))),
        )
        .unwrap();

        assert!(observed.is_absent());
        assert_eq!(state.id, None);
    }

    #[test]
    fn test_delete_clears_identity() {
        let client = ScriptedClient::new(vec![Ok(Value::Null)]);
        let mut state = present(json!({"group_id": "g1", "name": "gear"}));

        tokio_test::block_on(reconciler(&client).delete(&mut state)).unwrap();

        assert_eq!(state, ResourceState::new());
        assert_eq!(client.requests()[0].method, Method::Delete);
    }

    #[test]
    fn test_delete_of_missing_resource_succeeds() {
        let client = ScriptedClient::new(vec![Err(404)]);
        let mut state = stored("g1/w1");

        tokio_test::block_on(reconciler(&client).delete(&mut state)).unwrap();
        assert_eq!(state.id, None);
    }

    #[test]
    fn test_delete_failure_keeps_identity() {
        let client = ScriptedClient::new(vec![Err(409)]);
        let mut state = stored("g1/w1");

        let err = tokio_test::block_on(reconciler(&client).delete(&mut state)).unwrap_err();
        assert_eq!(err.operation, Operation::Delete);
        assert!(state.id.is_some());
    }

    #[test]
    fn test_import_validates_arity_before_calling() {
        let client = ScriptedClient::new(vec![]);
        let mut state = ResourceState::new();

        let err = tokio_test::block_on(reconciler(&client).import(&mut state, "g1")).unwrap_err();

        assert_eq!(
            err.source,
            Error::MalformedIdentity {
                identity: "g1".into(),
                expected: 2
            }
        );
        assert!(client.requests().is_empty());
    }

    #[test]
    fn test_import_commits_identity_after_read() {
        let client = ScriptedClient::new(vec![Ok(json!({"id": "w1", "name": "gear"}))]);
        let mut state = ResourceState::new();

        let observed =
            tokio_test::block_on(reconciler(&client).import(&mut state, "g1/w1")).unwrap();

        assert_eq!(
            observed.node().and_then(|n| n.get("group_id")).and_then(|v| v.as_str()),
            Some("g1")
        );
        assert_eq!(state.phase(), Phase::Present);
    }

    #[test]
    fn test_import_of_missing_resource_stores_nothing() {
        let client = ScriptedClient::new(vec![Err(404)]);
        let mut state = ResourceState::new();

        let err = tokio_test::block_on(reconciler(&client).import(&mut state, "g1/w1")).unwrap_err();

        assert_eq!(err.source, Error::NotFound);
        assert_eq!(state.id, None);
    }
}
