//! Common types for modelplane: errors, tenant identity, configuration and
//! Kubernetes utilities shared by the workload, lifecycle and API crates.

#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod kube_utils;
pub mod telemetry;
pub mod tenant;

pub use config::WorkloadConfig;
pub use error::{Conflict, Error};
pub use tenant::{Tenant, TenantId};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Field manager recorded on every object this service submits
pub const FIELD_MANAGER: &str = "modelplane";

/// Label carrying the resource's application name (also the pod selector)
pub const LABEL_APP: &str = "app";

/// Label carrying the tenant's raw credential, sanitised for human traceability
pub const LABEL_TENANT: &str = "tenant";

/// Label carrying the derived tenant id
pub const LABEL_TENANT_HASH: &str = "tenant-hash";

/// Label carrying a training run id
pub const LABEL_RUN_ID: &str = "id";

/// Standard Kubernetes managed-by label key
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Value of the managed-by label for resources created by modelplane
pub const LABEL_MANAGED_BY_MODELPLANE: &str = "modelplane";
