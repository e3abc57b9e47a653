//! Integration tests for the HTTP client and reconciler using wiremock
//!
//! These tests drive the real reqwest transport against mocked service
//! endpoints, checking request shapes, status handling and how many calls
//! each lifecycle operation makes.

use provider_bridge::error::{Error, Operation};
use provider_bridge::node::Node;
use provider_bridge::reconciler::{Observation, Reconciler, ResourceKind, ResourceState};
use provider_bridge::remote::{RemoteClient, RemoteRequest, ServiceClient};
use provider_bridge::resource::{DestinationKind, TriggerKind, TriggerPropertyKind};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{bearer_token, body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn service_client(server: &MockServer) -> Arc<ServiceClient> {
    Arc::new(ServiceClient::new(&server.uri(), "test-token").expect("valid endpoint"))
}

fn node(json: Value) -> Node {
    Node::from_json(json).expect("object")
}

/// Test module for HTTP client integration tests
mod http_client_tests {
    use super::*;

    /// GET sends the bearer token and a request id and returns parsed JSON
    #[tokio::test]
    async fn test_get_success_returns_json() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/tekton_pipelines/pipe-1/triggers/trig-9"))
            .and(bearer_token("test-token"))
            .and(header_exists("X-Request-ID"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "trig-9", "type": "manual"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let response = service_client(&server)
            .call(RemoteRequest::get("/tekton_pipelines/pipe-1/triggers/trig-9"))
            .await
            .expect("Request should succeed");

        assert_eq!(response["id"], "trig-9");
    }

    /// PATCH bodies are sent as JSON merge patches
    #[tokio::test]
    async fn test_patch_uses_merge_patch_content_type() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/tekton_pipelines/pipe-1/triggers/trig-9"))
            .and(header("content-type", "application/merge-patch+json"))
            .and(body_json(json!({"cron": null, "name": "nightly"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        service_client(&server)
            .call(RemoteRequest::patch(
                "/tekton_pipelines/pipe-1/triggers/trig-9",
                json!({"cron": null, "name": "nightly"}),
            ))
            .await
            .expect("Request should succeed");
    }

    /// Error statuses keep the service's message
    #[tokio::test]
    async fn test_error_status_carries_message() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/v1/instances/en-1/destinations/dest-7"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "errors": [{"code": "forbidden", "message": "Not authorized to delete destination"}]
            })))
            .mount(&server)
            .await;

        let err = service_client(&server)
            .call(RemoteRequest::delete("/v1/instances/en-1/destinations/dest-7"))
            .await
            .unwrap_err();

        assert_eq!(err.status, Some(403));
        assert_eq!(err.message, "Not authorized to delete destination");
        assert!(!err.is_not_found());
    }

    /// Empty bodies (204) come back as null
    #[tokio::test]
    async fn test_empty_body_is_null() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let response = service_client(&server)
            .call(RemoteRequest::delete("/tekton_pipelines/pipe-1/triggers/trig-9"))
            .await
            .expect("Request should succeed");

        assert_eq!(response, Value::Null);
    }

    /// The endpoint's own path prefix is kept
    #[tokio::test]
    async fn test_endpoint_path_prefix_is_kept() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/pipeline/v2/tekton_pipelines/pipe-1/triggers/trig-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ServiceClient::new(&format!("{}/pipeline/v2", server.uri()), "test-token")
            .expect("valid endpoint");
        client
            .call(RemoteRequest::get("/tekton_pipelines/pipe-1/triggers/trig-9"))
            .await
            .expect("Request should succeed");
    }
}

/// Test module for the reconciler running over HTTP
mod reconciler_tests {
    use super::*;

    fn timer_trigger() -> Value {
        json!({
            "pipeline_id": "pipe-1",
            "trigger": {
                "type": "timer",
                "name": "nightly",
                "event_listener": "listener",
                "cron": "0 2 * * *"
            }
        })
    }

    fn timer_response() -> Value {
        json!({
            "id": "trig-9",
            "href": "https://api/tekton_pipelines/pipe-1/triggers/trig-9",
            "type": "timer",
            "name": "nightly",
            "event_listener": "listener",
            "cron": "0 2 * * *",
            "disabled": false,
            "properties": []
        })
    }

    async fn mount_trigger_get(server: &MockServer, calls: u64) {
        Mock::given(method("GET"))
            .and(path("/tekton_pipelines/pipe-1/triggers/trig-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(timer_response()))
            .expect(calls)
            .mount(server)
            .await;
    }

    async fn mount_no_patch(server: &MockServer) {
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(server)
            .await;
    }

    fn stored_trigger() -> ResourceState<<TriggerKind as ResourceKind>::Model> {
        ResourceState::with_id(TriggerKind.identity().parse("pipe-1/trig-9").expect("valid id"))
    }

    /// Create posts the trigger, stores pipeline_id/trigger_id and reads back
    #[tokio::test]
    async fn test_create_then_read() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/tekton_pipelines/pipe-1/triggers"))
            .and(body_json(json!({
                "type": "timer",
                "name": "nightly",
                "event_listener": "listener",
                "cron": "0 2 * * *"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "trig-9"})))
            .expect(1)
            .mount(&server)
            .await;
        mount_trigger_get(&server, 1).await;

        let reconciler = Reconciler::new(TriggerKind, service_client(&server));
        let mut state = ResourceState::new();
        let observed = reconciler
            .create(&mut state, &node(timer_trigger()))
            .await
            .expect("create should succeed");

        assert_eq!(state.id.map(|id| id.encode()).as_deref(), Some("pipe-1/trig-9"));
        let display = observed.node().expect("present");
        assert_eq!(
            display.lookup("trigger.href").and_then(|v| v.as_str()),
            Some("https://api/tekton_pipelines/pipe-1/triggers/trig-9")
        );
        assert_eq!(
            display.lookup("pipeline_id").and_then(|v| v.as_str()),
            Some("pipe-1")
        );
    }

    /// A failed read-back after create keeps the new identity
    #[tokio::test]
    async fn test_create_keeps_identity_when_read_back_fails() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/tekton_pipelines/pipe-1/triggers"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "trig-9"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tekton_pipelines/pipe-1/triggers/trig-9"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
            .expect(1)
            .mount(&server)
            .await;

        let reconciler = Reconciler::new(TriggerKind, service_client(&server));
        let mut state = ResourceState::new();
        let err = reconciler
            .create(&mut state, &node(timer_trigger()))
            .await
            .unwrap_err();

        assert_eq!(err.operation, Operation::Create);
        assert_eq!(state.id.map(|id| id.encode()).as_deref(), Some("pipe-1/trig-9"));
    }

    /// A 404 on read clears the identity without an error
    #[tokio::test]
    async fn test_read_not_found_clears_identity() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/tekton_pipelines/pipe-1/triggers/trig-9"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "errors": [{"code": "not_found", "message": "Trigger not found"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reconciler = Reconciler::new(TriggerKind, service_client(&server));
        let mut state = stored_trigger();
        let observed = reconciler.read(&mut state).await.expect("404 is not an error");

        assert_eq!(observed, Observation::Absent);
        assert_eq!(state.id, None);
    }

    /// Updating twice with unchanged configuration sends no PATCH at all
    #[tokio::test]
    async fn test_unchanged_update_is_idempotent() {
        let server = MockServer::start().await;
        mount_trigger_get(&server, 1).await;
        mount_no_patch(&server).await;

        let reconciler = Reconciler::new(TriggerKind, service_client(&server));
        let mut state = stored_trigger();
        for _ in 0..2 {
            reconciler
                .update(&mut state, &node(timer_trigger()))
                .await
                .expect("update should succeed");
        }
    }

    /// A changed field is patched, a removed one is cleared, then re-read
    #[tokio::test]
    async fn test_update_patches_changes_only() {
        let server = MockServer::start().await;
        mount_trigger_get(&server, 2).await;

        Mock::given(method("PATCH"))
            .and(path("/tekton_pipelines/pipe-1/triggers/trig-9"))
            .and(body_json(json!({"cron": null, "timezone": "UTC"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let mut desired = timer_trigger();
        desired["trigger"]
            .as_object_mut()
            .expect("object")
            .remove("cron");
        desired["trigger"]["timezone"] = json!("UTC");

        let reconciler = Reconciler::new(TriggerKind, service_client(&server));
        let mut state = stored_trigger();
        reconciler
            .update(&mut state, &node(desired))
            .await
            .expect("update should succeed");
    }

    /// Changing an immutable field fails before any write
    #[tokio::test]
    async fn test_immutable_change_makes_no_write() {
        let server = MockServer::start().await;
        mount_trigger_get(&server, 1).await;
        mount_no_patch(&server).await;

        let reconciler = Reconciler::new(TriggerKind, service_client(&server));
        let mut state = ResourceState::new();
        reconciler
            .import(&mut state, "pipe-1/trig-9")
            .await
            .expect("import should succeed");

        let mut desired = timer_trigger();
        desired["trigger"]["type"] = json!("manual");
        desired["trigger"].as_object_mut().expect("object").remove("cron");

        let err = reconciler
            .update(&mut state, &node(desired))
            .await
            .unwrap_err();
        assert_eq!(err.operation, Operation::Update);
        assert_eq!(
            err.source,
            Error::ImmutableFieldChanged {
                field: "trigger.type".into()
            }
        );
        assert!(state.id.is_some());
    }

    /// Delete clears the identity
    #[tokio::test]
    async fn test_delete_clears_identity() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/tekton_pipelines/pipe-1/triggers/trig-9"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let reconciler = Reconciler::new(TriggerKind, service_client(&server));
        let mut state = stored_trigger();
        reconciler.delete(&mut state).await.expect("delete should succeed");

        assert_eq!(state.id, None);
    }

    /// Importing a malformed identity makes no calls
    #[tokio::test]
    async fn test_malformed_import_makes_no_calls() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let reconciler = Reconciler::new(TriggerKind, service_client(&server));
        let mut state = ResourceState::new();
        let err = reconciler.import(&mut state, "pipe-1").await.unwrap_err();

        assert_eq!(
            err.source,
            Error::MalformedIdentity {
                identity: "pipe-1".into(),
                expected: 2
            }
        );
        assert_eq!(state.id, None);
    }

    /// A secure property's masked value never causes an update
    #[tokio::test]
    async fn test_secure_property_value_is_not_diffed() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/tekton_pipelines/pipe-1/triggers/trig-9/properties/api_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "type": "secure",
                "name": "api_key",
                "value": "hash:SHA3-512:8e0f...",
                "href": "https://api/properties/api_key"
            })))
            .expect(1)
            .mount(&server)
            .await;
        mount_no_patch(&server).await;

        let reconciler = Reconciler::new(TriggerPropertyKind, service_client(&server));
        let mut state = ResourceState::with_id(
            TriggerPropertyKind
                .identity()
                .parse("pipe-1/trig-9/api_key")
                .expect("valid id"),
        );
        let desired = node(json!({
            "pipeline_id": "pipe-1",
            "trigger_id": "trig-9",
            "property": {"type": "secure", "name": "api_key", "value": "s3cr3t"}
        }));

        let observed = reconciler
            .update(&mut state, &desired)
            .await
            .expect("update should succeed");
        assert!(!observed.is_absent());
    }

    /// Destination changes are patched in the service's nested layout
    #[tokio::test]
    async fn test_destination_update_nests_params() {
        let server = MockServer::start().await;
        let response = json!({
            "id": "dest-7",
            "type": "slack",
            "name": "chat",
            "config": {"params": {"url": "https://hooks.slack.com/old"}}
        });

        Mock::given(method("GET"))
            .and(path("/v1/instances/en-1/destinations/dest-7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/v1/instances/en-1/destinations/dest-7"))
            .and(body_json(json!({"config": {"params": {"url": "https://hooks.slack.com/new"}}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let reconciler = Reconciler::new(DestinationKind, service_client(&server));
        let mut state = ResourceState::new();
        reconciler
            .import(&mut state, "en-1/dest-7")
            .await
            .expect("import should succeed");

        let desired = node(json!({
            "instance_id": "en-1",
            "destination": {"type": "slack", "name": "chat", "url": "https://hooks.slack.com/new"}
        }));
        reconciler
            .update(&mut state, &desired)
            .await
            .expect("update should succeed");
    }
}
