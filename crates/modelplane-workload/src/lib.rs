//! Workload compilation for modelplane tenants
//!
//! Turns a tenant, a run id and the process-wide [`WorkloadConfig`] into the
//! Kubernetes resources for a training run or a serving deployment. Nothing
//! here performs I/O:
//! - [`names`]: resource naming contract and run id generation
//! - [`compiler`]: ConfigMap, Job, Deployment, Service and Ingress builders
//! - [`status`]: projection of raw Job status onto [`RunStatus`]
//!
//! [`WorkloadConfig`]: modelplane_common::WorkloadConfig

pub mod compiler;
pub mod names;
pub mod status;

pub use compiler::{
    compile_namespace, compile_serving, compile_training, CompiledServing, CompiledTraining,
    TrainingParams,
};
pub use status::{project, RawStatus, RunStatus};
