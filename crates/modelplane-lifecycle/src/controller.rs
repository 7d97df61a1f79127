//! Tenant workload lifecycle
//!
//! Every call rebuilds its view of the tenant from the Kubernetes API; the
//! controller holds no per-tenant state. Multi-resource creates run as a
//! saga: if a later step fails, the resources created earlier by the same
//! call are deleted again in reverse order before the error is returned.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use modelplane_common::{Conflict, Error, Tenant, WorkloadConfig};
use modelplane_workload::names::{
    generate_run_id, is_valid_run_id, run_id_from_name, serving_name, serving_url, training_name,
    training_prefix,
};
use modelplane_workload::{
    compile_serving, compile_training, project, CompiledServing, RawStatus, RunStatus,
    TrainingParams,
};

use crate::client::{DeleteOutcome, OrchestratorClient};
use crate::namespace::NamespaceManager;

/// Result of creating a serving deployment
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ServingEndpoint {
    /// Shared name of the deployment's resources
    pub id: String,
    /// Externally reachable URL
    pub url: String,
}

/// Observed state of a serving deployment
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ServingStatus {
    /// At least one replica passes its readiness probe
    pub available: bool,
    /// Externally reachable URL
    pub url: String,
}

/// The four resources of a serving deployment, in creation order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ServingResource {
    ConfigMap,
    Deployment,
    Service,
    Ingress,
}

impl ServingResource {
    const CREATE_ORDER: [ServingResource; 4] = [
        ServingResource::ConfigMap,
        ServingResource::Deployment,
        ServingResource::Service,
        ServingResource::Ingress,
    ];

    // Pods go first so nothing keeps serving once routing is torn down
    const DELETE_ORDER: [ServingResource; 4] = [
        ServingResource::Deployment,
        ServingResource::Service,
        ServingResource::Ingress,
        ServingResource::ConfigMap,
    ];
}

impl fmt::Display for ServingResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServingResource::ConfigMap => write!(f, "ConfigMap"),
            ServingResource::Deployment => write!(f, "Deployment"),
            ServingResource::Service => write!(f, "Service"),
            ServingResource::Ingress => write!(f, "Ingress"),
        }
    }
}

/// Implements the tenant-facing training and serving operations
pub struct LifecycleController {
    client: Arc<dyn OrchestratorClient>,
    namespaces: NamespaceManager,
    config: WorkloadConfig,
}

impl LifecycleController {
    /// Create a controller over the given client and workload settings
    pub fn new(client: Arc<dyn OrchestratorClient>, config: WorkloadConfig) -> Self {
        Self {
            namespaces: NamespaceManager::new(client.clone()),
            client,
            config,
        }
    }

    /// Workload settings in use
    pub fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    // =========================================================================
    // Training
    // =========================================================================

    /// Start a training run and return its run id.
    ///
    /// Refuses while another run of the tenant has not reached a terminal
    /// status, including one submitted so recently that its Job reports no
    /// pod counters yet. Two concurrent calls can both pass that check; this
    /// is accepted.
    #[instrument(skip(self, tenant, params), fields(tenant = %tenant.id()))]
    pub async fn create_training_run(
        &self,
        tenant: &Tenant,
        params: &TrainingParams,
    ) -> Result<String, Error> {
        params.validate()?;
        self.namespaces.ensure_exists(tenant).await?;

        let namespace = tenant.namespace();
        let jobs = self.client.list_jobs(namespace).await?;
        let prefix = training_prefix(tenant.id());
        let running = jobs.iter().any(|job| {
            job.metadata
                .name
                .as_deref()
                .is_some_and(|name| name.starts_with(&prefix))
                && !project(&RawStatus::from(job)).is_terminal()
        });
        if running {
            debug!("refusing training run while another is unfinished");
            return Err(Error::Conflict(Conflict::TrainingAlreadyRunning));
        }

        let run_id = generate_run_id()?;
        let compiled = compile_training(tenant, &run_id, &self.config, params)?;
        let name = training_name(tenant.id(), &run_id);

        self.client
            .create_config_map(namespace, &compiled.config_map)
            .await
            .map_err(|e| e.in_step("create training ConfigMap"))?;

        if let Err(e) = self.client.create_job(namespace, &compiled.job).await {
            match self.client.delete_config_map(namespace, &name).await {
                Ok(_) => debug!(name = %name, "rolled back training ConfigMap"),
                Err(cleanup) => {
                    warn!(name = %name, error = %cleanup, "failed to roll back training ConfigMap")
                }
            }
            return Err(e.in_step("create training Job"));
        }

        info!(run_id = %run_id, "training run created");
        Ok(run_id)
    }

    /// Status of every training run the tenant has, keyed by run id
    #[instrument(skip(self, tenant), fields(tenant = %tenant.id()))]
    pub async fn list_training_runs(
        &self,
        tenant: &Tenant,
    ) -> Result<BTreeMap<String, RunStatus>, Error> {
        let jobs = self.client.list_jobs(tenant.namespace()).await?;

        Ok(jobs
            .iter()
            .filter_map(|job| {
                let name = job.metadata.name.as_deref()?;
                let run_id = run_id_from_name(tenant.id(), name)?;
                Some((run_id.to_string(), project(&RawStatus::from(job))))
            })
            .collect())
    }

    /// Status of one training run
    #[instrument(skip(self, tenant), fields(tenant = %tenant.id()))]
    pub async fn get_training_run(
        &self,
        tenant: &Tenant,
        run_id: &str,
    ) -> Result<RunStatus, Error> {
        let name = training_name(tenant.id(), run_id);
        if !is_valid_run_id(run_id) {
            return Err(Error::not_found("Job", name));
        }

        match self.client.get_job(tenant.namespace(), &name).await? {
            Some(job) => Ok(project(&RawStatus::from(&job))),
            None => Err(Error::not_found("Job", name)),
        }
    }

    // =========================================================================
    // Serving
    // =========================================================================

    /// Create the tenant's serving deployment.
    ///
    /// A name collision on any step means another request got there first
    /// and is reported as `DeploymentAlreadyExists`.
    #[instrument(skip(self, tenant), fields(tenant = %tenant.id()))]
    pub async fn create_serving_deployment(
        &self,
        tenant: &Tenant,
    ) -> Result<ServingEndpoint, Error> {
        self.namespaces.ensure_exists(tenant).await?;

        let namespace = tenant.namespace();
        let name = serving_name(tenant.id());
        if self.client.get_deployment(namespace, &name).await?.is_some() {
            return Err(Error::Conflict(Conflict::DeploymentAlreadyExists));
        }

        let compiled = compile_serving(tenant, &self.config);
        let mut created = Vec::with_capacity(ServingResource::CREATE_ORDER.len());
        for resource in ServingResource::CREATE_ORDER {
            if let Err(e) = self.create_resource(namespace, &compiled, resource).await {
                self.roll_back(namespace, &name, &created).await;
                if e.is_conflict() {
                    return Err(Error::Conflict(Conflict::DeploymentAlreadyExists));
                }
                return Err(e.in_step(&format!("create serving {}", resource)));
            }
            created.push(resource);
        }

        info!(name = %name, "serving deployment created");
        Ok(ServingEndpoint {
            id: name,
            url: serving_url(&self.config.domain, tenant.id()),
        })
    }

    /// Availability of the tenant's serving deployment
    #[instrument(skip(self, tenant), fields(tenant = %tenant.id()))]
    pub async fn get_serving_deployment(&self, tenant: &Tenant) -> Result<ServingStatus, Error> {
        let namespace = tenant.namespace();
        let name = serving_name(tenant.id());

        let (deployment, service, ingress) = futures::try_join!(
            self.client.get_deployment(namespace, &name),
            self.client.get_service(namespace, &name),
            self.client.get_ingress(namespace, &name),
        )?;

        let deployment = deployment.ok_or_else(|| Error::not_found("Deployment", &name))?;
        if service.is_none() {
            return Err(Error::not_found("Service", &name));
        }
        if ingress.is_none() {
            return Err(Error::not_found("Ingress", &name));
        }

        let available = deployment
            .status
            .and_then(|s| s.available_replicas)
            .unwrap_or(0)
            > 0;

        Ok(ServingStatus {
            available,
            url: serving_url(&self.config.domain, tenant.id()),
        })
    }

    /// Delete the tenant's serving deployment.
    ///
    /// Missing pieces are skipped; any other failure stops immediately and
    /// leaves the remaining resources in place.
    #[instrument(skip(self, tenant), fields(tenant = %tenant.id()))]
    pub async fn delete_serving_deployment(&self, tenant: &Tenant) -> Result<(), Error> {
        let namespace = tenant.namespace();
        let name = serving_name(tenant.id());

        let mut deleted = 0;
        for resource in ServingResource::DELETE_ORDER {
            match self.delete_resource(namespace, &name, resource).await {
                Ok(DeleteOutcome::Deleted) => deleted += 1,
                Ok(DeleteOutcome::Absent) => debug!(resource = %resource, "already absent"),
                Err(e) => return Err(e.in_step(&format!("delete serving {}", resource))),
            }
        }

        if deleted == 0 {
            return Err(Error::not_found("ServingDeployment", name));
        }

        info!(name = %name, deleted, "serving deployment deleted");
        Ok(())
    }

    async fn create_resource(
        &self,
        namespace: &str,
        compiled: &CompiledServing,
        resource: ServingResource,
    ) -> Result<(), Error> {
        match resource {
            ServingResource::ConfigMap => {
                self.client
                    .create_config_map(namespace, &compiled.config_map)
                    .await
            }
            ServingResource::Deployment => {
                self.client
                    .create_deployment(namespace, &compiled.deployment)
                    .await
            }
            ServingResource::Service => {
                self.client
                    .create_service(namespace, &compiled.service)
                    .await
            }
            ServingResource::Ingress => {
                self.client
                    .create_ingress(namespace, &compiled.ingress)
                    .await
            }
        }
    }

    async fn delete_resource(
        &self,
        namespace: &str,
        name: &str,
        resource: ServingResource,
    ) -> Result<DeleteOutcome, Error> {
        match resource {
            ServingResource::ConfigMap => self.client.delete_config_map(namespace, name).await,
            ServingResource::Deployment => self.client.delete_deployment(namespace, name).await,
            ServingResource::Service => self.client.delete_service(namespace, name).await,
            ServingResource::Ingress => self.client.delete_ingress(namespace, name).await,
        }
    }

    /// Best-effort removal of what this call created, newest first
    async fn roll_back(&self, namespace: &str, name: &str, created: &[ServingResource]) {
        for resource in created.iter().rev() {
            match self.delete_resource(namespace, name, *resource).await {
                Ok(_) => debug!(resource = %resource, "rolled back"),
                Err(e) => warn!(resource = %resource, error = %e, "rollback failed"),
            }
        }
    }
}
