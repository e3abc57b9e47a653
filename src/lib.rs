//! provider-bridge
//!
//! Adapters between a declarative infrastructure tool's generic configuration
//! tree and typed cloud REST resources: a closed variant registry, a
//! validating generic/typed mapper, composite identities and a diff-aware
//! CRUD reconciler.

pub mod config;
pub mod diff;
pub mod error;
pub mod identity;
pub mod mapper;
pub mod node;
pub mod reconciler;
pub mod remote;
pub mod resource;
pub mod state;
pub mod variant;

pub use error::{Error, Operation, ReconcileError, Result};
pub use identity::{CompositeId, IdentityShape};
pub use node::{Node, Value};
pub use reconciler::{Observation, Reconciler, ResourceKind, ResourceState};
