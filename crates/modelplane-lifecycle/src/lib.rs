//! Lifecycle of tenant workloads on Kubernetes
//!
//! - [`client`]: the [`OrchestratorClient`] seam and its `kube` implementation
//! - [`namespace`]: idempotent tenant namespace provisioning
//! - [`controller`]: training run and serving deployment operations

pub mod client;
pub mod controller;
pub mod namespace;

pub use client::{DeleteOutcome, KubeOrchestrator, OrchestratorClient};
pub use controller::{LifecycleController, ServingEndpoint, ServingStatus};
pub use namespace::NamespaceManager;
