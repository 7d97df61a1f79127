//! Orchestrator client abstraction
//!
//! The lifecycle controller only talks to Kubernetes through
//! [`OrchestratorClient`], so tests can substitute a mock or an in-memory
//! fake. Absence is an explicit value (`Option`, [`DeleteOutcome::Absent`]),
//! never an error. A create that finds the name taken fails with a
//! `Platform` error for which [`Error::is_conflict`] is true.

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use modelplane_common::kube_utils::is_not_found;
use modelplane_common::{Error, FIELD_MANAGER};

/// Result of a delete call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The object existed and deletion was accepted
    Deleted,
    /// The object did not exist
    Absent,
}

/// Typed access to the Kubernetes objects modelplane manages.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OrchestratorClient: Send + Sync {
    /// Get a namespace by name
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, Error>;

    /// Create a namespace
    async fn create_namespace(&self, namespace: &Namespace) -> Result<(), Error>;

    /// List every Job in a namespace
    async fn list_jobs(&self, namespace: &str) -> Result<Vec<Job>, Error>;

    /// Get a Job by name
    async fn get_job(&self, namespace: &str, name: &str) -> Result<Option<Job>, Error>;

    /// Create a Job
    async fn create_job(&self, namespace: &str, job: &Job) -> Result<(), Error>;

    /// Create a ConfigMap
    async fn create_config_map(
        &self,
        namespace: &str,
        config_map: &ConfigMap,
    ) -> Result<(), Error>;

    /// Delete a ConfigMap
    async fn delete_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<DeleteOutcome, Error>;

    /// Get a Deployment by name
    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, Error>;

    /// Create a Deployment
    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<(), Error>;

    /// Delete a Deployment
    async fn delete_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<DeleteOutcome, Error>;

    /// Get a Service by name
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, Error>;

    /// Create a Service
    async fn create_service(&self, namespace: &str, service: &Service) -> Result<(), Error>;

    /// Delete a Service
    async fn delete_service(&self, namespace: &str, name: &str) -> Result<DeleteOutcome, Error>;

    /// Get an Ingress by name
    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Option<Ingress>, Error>;

    /// Create an Ingress
    async fn create_ingress(&self, namespace: &str, ingress: &Ingress) -> Result<(), Error>;

    /// Delete an Ingress
    async fn delete_ingress(&self, namespace: &str, name: &str) -> Result<DeleteOutcome, Error>;
}

/// [`OrchestratorClient`] backed by a real `kube::Client`
#[derive(Clone)]
pub struct KubeOrchestrator {
    client: Client,
}

impl KubeOrchestrator {
    /// Wrap the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn namespaced<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }
}

async fn get_opt<K>(api: &Api<K>, name: &str) -> Result<Option<K>, Error>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug,
{
    api.get_opt(name)
        .await
        .map_err(|e| Error::platform(format!("get {} {}", K::kind(&()), name), e))
}

async fn create<K>(api: &Api<K>, obj: &K) -> Result<(), Error>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Serialize + Debug,
{
    let params = PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..Default::default()
    };
    let name = obj.name_any();
    api.create(&params, obj)
        .await
        .map_err(|e| Error::platform(format!("create {} {}", K::kind(&()), name), e))?;

    debug!(kind = %K::kind(&()), name = %name, "created");
    Ok(())
}

async fn delete<K>(api: &Api<K>, name: &str) -> Result<DeleteOutcome, Error>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug,
{
    match api.delete(name, &DeleteParams::background()).await {
        Ok(_) => {
            debug!(kind = %K::kind(&()), name = %name, "deleted");
            Ok(DeleteOutcome::Deleted)
        }
        Err(e) if is_not_found(&e) => Ok(DeleteOutcome::Absent),
        Err(e) => Err(Error::platform(
            format!("delete {} {}", K::kind(&()), name),
            e,
        )),
    }
}

#[async_trait]
impl OrchestratorClient for KubeOrchestrator {
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, Error> {
        get_opt(&Api::<Namespace>::all(self.client.clone()), name).await
    }

    async fn create_namespace(&self, namespace: &Namespace) -> Result<(), Error> {
        create(&Api::<Namespace>::all(self.client.clone()), namespace).await
    }

    async fn list_jobs(&self, namespace: &str) -> Result<Vec<Job>, Error> {
        let api: Api<Job> = self.namespaced(namespace);
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| Error::platform(format!("list Jobs in {}", namespace), e))?;
        Ok(list.items)
    }

    async fn get_job(&self, namespace: &str, name: &str) -> Result<Option<Job>, Error> {
        get_opt(&self.namespaced::<Job>(namespace), name).await
    }

    async fn create_job(&self, namespace: &str, job: &Job) -> Result<(), Error> {
        create(&self.namespaced::<Job>(namespace), job).await
    }

    async fn create_config_map(
        &self,
        namespace: &str,
        config_map: &ConfigMap,
    ) -> Result<(), Error> {
        create(&self.namespaced::<ConfigMap>(namespace), config_map).await
    }

    async fn delete_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<DeleteOutcome, Error> {
        delete(&self.namespaced::<ConfigMap>(namespace), name).await
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, Error> {
        get_opt(&self.namespaced::<Deployment>(namespace), name).await
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<(), Error> {
        create(&self.namespaced::<Deployment>(namespace), deployment).await
    }

    async fn delete_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<DeleteOutcome, Error> {
        delete(&self.namespaced::<Deployment>(namespace), name).await
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, Error> {
        get_opt(&self.namespaced::<Service>(namespace), name).await
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<(), Error> {
        create(&self.namespaced::<Service>(namespace), service).await
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<DeleteOutcome, Error> {
        delete(&self.namespaced::<Service>(namespace), name).await
    }

    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Option<Ingress>, Error> {
        get_opt(&self.namespaced::<Ingress>(namespace), name).await
    }

    async fn create_ingress(&self, namespace: &str, ingress: &Ingress) -> Result<(), Error> {
        create(&self.namespaced::<Ingress>(namespace), ingress).await
    }

    async fn delete_ingress(&self, namespace: &str, name: &str) -> Result<DeleteOutcome, Error> {
        delete(&self.namespaced::<Ingress>(namespace), name).await
    }
}
