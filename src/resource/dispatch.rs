//! Kind dispatch
//!
//! Maps a resource kind name to its [`ResourceKind`] and runs one lifecycle
//! operation with it. The set of kinds is closed; unknown names fail.

use super::{DestinationKind, TriggerKind, TriggerPropertyKind};
use crate::error::{Operation, ReconcileError};
use crate::node::Node;
use crate::reconciler::{Observation, Reconciler, ResourceKind, ResourceState};
use crate::remote::RemoteClient;
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Every kind name the bridge handles
pub const KINDS: &[&str] = &[
    "tekton_pipeline_trigger",
    "tekton_pipeline_trigger_property",
    "en_destination",
];

/// One lifecycle operation and its input
#[derive(Debug, Clone)]
pub enum Action {
    Create(Node),
    Read,
    Update(Node),
    Delete,
    /// Adopt by identity string
    Import(String),
}

impl Action {
    pub fn operation(&self) -> Operation {
        match self {
            Action::Create(_) => Operation::Create,
            Action::Read => Operation::Read,
            Action::Update(_) => Operation::Update,
            Action::Delete => Operation::Delete,
            Action::Import(_) => Operation::Import,
        }
    }
}

/// What the host persists and displays after an operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    /// Stored identity, `None` once the resource is absent
    pub identity: Option<String>,
    /// Display form, `None` when absent
    pub resource: Option<Node>,
}

/// A lifecycle operation that failed after its state was loaded. `identity`
/// is what the host must keep: a create whose read-back failed still
/// reports the new resource's identity.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{error}")]
pub struct Failed {
    pub identity: Option<String>,
    pub error: ReconcileError,
}

/// Service whose endpoint `kind` talks to
pub fn service_for(kind: &str) -> Result<&'static str> {
    match kind {
        "tekton_pipeline_trigger" => Ok(TriggerKind.service()),
        "tekton_pipeline_trigger_property" => Ok(TriggerPropertyKind.service()),
        "en_destination" => Ok(DestinationKind.service()),
        _ => Err(unknown_kind(kind)),
    }
}

/// Run `action` for `kind`, starting from a stored identity if there is one
pub async fn execute(
    kind: &str,
    client: Arc<dyn RemoteClient>,
    identity: Option<&str>,
    action: Action,
) -> Result<Outcome> {
    tracing::debug!("execute: kind={}, operation={}", kind, action.operation());

    match kind {
        "tekton_pipeline_trigger" => run(TriggerKind, client, identity, action).await,
        "tekton_pipeline_trigger_property" => {
            run(TriggerPropertyKind, client, identity, action).await
        }
        "en_destination" => run(DestinationKind, client, identity, action).await,
        _ => Err(unknown_kind(kind)),
    }
}

fn unknown_kind(kind: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Unknown resource kind: {} (expected one of {})",
        kind,
        KINDS.join(", ")
    )
}

async fn run<K: ResourceKind>(
    kind: K,
    client: Arc<dyn RemoteClient>,
    identity: Option<&str>,
    action: Action,
) -> Result<Outcome> {
    let operation = action.operation();
    let mut state = match identity {
        Some(raw) if operation != Operation::Import => {
            let id = kind
                .identity()
                .parse(raw)
                .map_err(|e| ReconcileError::new(kind.name(), operation, e))?;
            ResourceState::with_id(id)
        }
        _ => ResourceState::new(),
    };

    let reconciler = Reconciler::new(kind, client);
    let result = match action {
        Action::Create(config) => reconciler.create(&mut state, &config).await,
        Action::Read => reconciler.read(&mut state).await,
        Action::Update(config) => reconciler.update(&mut state, &config).await,
        Action::Delete => reconciler
            .delete(&mut state)
            .await
            .map(|()| Observation::Absent),
        Action::Import(raw) => reconciler.import(&mut state, &raw).await,
    };

    let observation = result.map_err(|error| Failed {
        identity: state
            .id
            .as_ref()
            .map(|id| id.encode())
            .or_else(|| identity.map(str::to_string)),
        error,
    })?;

    Ok(Outcome {
        identity: state.id.map(|id| id.encode()),
        resource: match observation {
            Observation::Present(node) => Some(node),
            Observation::Absent => None,
        },
    })
}
