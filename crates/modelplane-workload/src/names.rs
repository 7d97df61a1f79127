//! Resource naming
//!
//! These names and the labels in [`crate::compiler`] are a stable contract:
//! other systems find a tenant's resources by them.
//!
//! - training: `training-<tenant_id>-<run_id>` (Job and ConfigMap)
//! - serving: `serving-<tenant_id>` (ConfigMap, Deployment, Service, Ingress)

use modelplane_common::kube_utils::is_dns_label;
use modelplane_common::{Error, TenantId};

const TRAINING_PREFIX: &str = "training";
const SERVING_PREFIX: &str = "serving";

/// Number of random bytes in a run id (rendered as twice as many hex chars)
const RUN_ID_BYTES: usize = 4;

/// Name shared by a training run's Job and ConfigMap
pub fn training_name(tenant: &TenantId, run_id: &str) -> String {
    format!("{}-{}-{}", TRAINING_PREFIX, tenant, run_id)
}

/// Prefix every training resource of the tenant starts with
pub fn training_prefix(tenant: &TenantId) -> String {
    format!("{}-{}-", TRAINING_PREFIX, tenant)
}

/// Recover the run id from a training resource name, if it belongs to the tenant
pub fn run_id_from_name<'a>(tenant: &TenantId, name: &'a str) -> Option<&'a str> {
    name.strip_prefix(&training_prefix(tenant))
        .filter(|run_id| !run_id.is_empty())
}

/// Whether a caller-supplied run id could name a training resource
pub fn is_valid_run_id(run_id: &str) -> bool {
    is_dns_label(run_id) && run_id.len() <= RUN_ID_BYTES * 2
}

/// Name shared by all four serving resources of the tenant
pub fn serving_name(tenant: &TenantId) -> String {
    format!("{}-{}", SERVING_PREFIX, tenant)
}

/// Path the tenant's serving endpoint is routed under
pub fn serving_path(tenant: &TenantId) -> String {
    format!("/{}/{}", SERVING_PREFIX, tenant)
}

/// Externally reachable URL of the tenant's serving endpoint
pub fn serving_url(domain: &str, tenant: &TenantId) -> String {
    format!("https://{}{}", domain, serving_path(tenant))
}

/// Generate a fresh run id: 8 lowercase hex characters from the system CSPRNG
pub fn generate_run_id() -> Result<String, Error> {
    let mut raw = [0u8; RUN_ID_BYTES];
    aws_lc_rs::rand::fill(&mut raw).map_err(|_| {
        Error::internal_with_context("generate_run_id", "system random generator unavailable")
    })?;

    Ok(raw.iter().fold(String::with_capacity(RUN_ID_BYTES * 2), |mut s, b| {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
        s
    }))
}
