//! Tenant namespace provisioning

use std::sync::Arc;

use tracing::{debug, info};

use modelplane_common::{Error, Tenant};
use modelplane_workload::compile_namespace;

use crate::client::OrchestratorClient;

/// Makes sure a tenant's namespace exists before anything is created in it
#[derive(Clone)]
pub struct NamespaceManager {
    client: Arc<dyn OrchestratorClient>,
}

impl NamespaceManager {
    /// Create a manager using the given client
    pub fn new(client: Arc<dyn OrchestratorClient>) -> Self {
        Self { client }
    }

    /// Idempotently create the tenant's namespace.
    ///
    /// Losing a creation race to another request counts as success.
    pub async fn ensure_exists(&self, tenant: &Tenant) -> Result<(), Error> {
        let name = tenant.namespace();
        if self.client.get_namespace(name).await?.is_some() {
            debug!(namespace = %name, "namespace exists");
            return Ok(());
        }

        match self.client.create_namespace(&compile_namespace(tenant)).await {
            Ok(()) => {
                info!(namespace = %name, "created tenant namespace");
                Ok(())
            }
            Err(e) if e.is_conflict() => {
                debug!(namespace = %name, "namespace created concurrently");
                Ok(())
            }
            Err(e) => Err(e.in_step("ensure namespace")),
        }
    }
}
