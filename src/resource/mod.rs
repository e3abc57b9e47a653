//! Concrete resource kinds
//!
//! Each kind pairs a typed model with its identity layout and REST paths by
//! implementing [`ResourceKind`](crate::reconciler::ResourceKind).
//!
//! # Kinds
//!
//! - [`trigger`] - `tekton_pipeline_trigger`, identity `pipeline_id/trigger_id`
//! - [`property`] - `tekton_pipeline_trigger_property`, identity
//!   `pipeline_id/trigger_id/name`
//! - [`destination`] - `en_destination`, identity `instance_id/destination_id`
//!
//! [`dispatch`] maps a kind name to its implementation.
//!
//! # Example
//!
//! ```ignore
//! use provider_bridge::reconciler::{Reconciler, ResourceState};
//! use provider_bridge::resource::TriggerKind;
//!
//! async fn refresh(client: std::sync::Arc<dyn provider_bridge::remote::RemoteClient>) {
//!     let reconciler = Reconciler::new(TriggerKind, client);
//!     let mut state = ResourceState::with_id(
//!         TriggerKind.identity().parse("pipe-1/trig-9").unwrap(),
//!     );
//!     let observed = reconciler.read(&mut state).await;
//! }
//! ```

pub mod destination;
pub mod dispatch;
pub mod property;
pub mod trigger;

pub use destination::DestinationKind;
pub use dispatch::{execute, service_for, Action, Failed, Outcome, KINDS};
pub use property::TriggerPropertyKind;
pub use trigger::TriggerKind;

/// Continuous Delivery Tekton pipeline API
pub const TEKTON_SERVICE: &str = "pipeline";

/// Event Notifications API
pub const EVENT_NOTIFICATIONS_SERVICE: &str = "event_notifications";
