//! In-memory orchestrator and HTTP helpers shared by the stories

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentStatus};
use k8s_openapi::api::batch::v1::{Job, JobStatus};
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;
use tower::ServiceExt;

use modelplane_api::{router, AppState};
use modelplane_common::{Error, WorkloadConfig};
use modelplane_lifecycle::{DeleteOutcome, LifecycleController, OrchestratorClient};

pub const DOMAIN: &str = "ml.example.com";

type Key = (String, String);

fn api_error(code: u16, reason: &str) -> Error {
    Error::from(kube::Error::Api(kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("fake cluster: {}", reason),
        reason: reason.to_string(),
        code,
    }))
}

#[derive(Default)]
struct State {
    namespaces: BTreeSet<String>,
    jobs: BTreeMap<Key, Job>,
    config_maps: BTreeMap<Key, ConfigMap>,
    deployments: BTreeMap<Key, Deployment>,
    services: BTreeMap<Key, Service>,
    ingresses: BTreeMap<Key, Ingress>,
    /// Kind -> status code returned by the next mutating call on that kind
    failures: HashMap<&'static str, u16>,
}

impl State {
    fn injected(&mut self, kind: &'static str) -> Result<(), Error> {
        match self.failures.remove(kind) {
            Some(code) => Err(api_error(code, "Injected")),
            None => Ok(()),
        }
    }
}

fn insert<K: kube::Resource + Clone>(
    map: &mut BTreeMap<Key, K>,
    namespace: &str,
    obj: &K,
) -> Result<(), Error> {
    let key = (namespace.to_string(), obj.name_any());
    if map.contains_key(&key) {
        return Err(api_error(409, "AlreadyExists"));
    }
    map.insert(key, obj.clone());
    Ok(())
}

fn remove<K>(map: &mut BTreeMap<Key, K>, namespace: &str, name: &str) -> DeleteOutcome {
    match map.remove(&(namespace.to_string(), name.to_string())) {
        Some(_) => DeleteOutcome::Deleted,
        None => DeleteOutcome::Absent,
    }
}

fn names_in<'a, K>(
    map: &'a BTreeMap<Key, K>,
    namespace: &'a str,
    kind: &'a str,
) -> impl Iterator<Item = String> + 'a {
    map.keys()
        .filter(move |(ns, _)| ns == namespace)
        .map(move |(_, name)| format!("{}/{}", kind, name))
}

fn get<K: Clone>(map: &BTreeMap<Key, K>, namespace: &str, name: &str) -> Option<K> {
    map.get(&(namespace.to_string(), name.to_string())).cloned()
}

/// Kubernetes stand-in: create-if-absent by name, 404-tolerant deletes
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<State>,
}

impl FakeCluster {
    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("fake cluster lock poisoned")
    }

    /// Make the next create or delete of `kind` fail with `code`
    pub fn fail_next(&self, kind: &'static str, code: u16) {
        self.state().failures.insert(kind, code);
    }

    /// Overwrite the pod counters of a Job, as the Job controller would
    pub fn set_job_status(
        &self,
        namespace: &str,
        name: &str,
        active: i32,
        succeeded: i32,
        failed: i32,
    ) {
        let mut state = self.state();
        let job = state
            .jobs
            .get_mut(&(namespace.to_string(), name.to_string()))
            .expect("job should exist");
        job.status = Some(JobStatus {
            active: Some(active),
            succeeded: Some(succeeded),
            failed: Some(failed),
            ..Default::default()
        });
    }

    /// Report ready replicas for a Deployment, as the Deployment controller would
    pub fn set_available_replicas(&self, namespace: &str, name: &str, replicas: i32) {
        let mut state = self.state();
        let deployment = state
            .deployments
            .get_mut(&(namespace.to_string(), name.to_string()))
            .expect("deployment should exist");
        deployment.status = Some(DeploymentStatus {
            available_replicas: Some(replicas),
            ..Default::default()
        });
    }

    pub fn has_namespace(&self, name: &str) -> bool {
        self.state().namespaces.contains(name)
    }

    pub fn job(&self, namespace: &str, name: &str) -> Option<Job> {
        get(&self.state().jobs, namespace, name)
    }

    pub fn config_map(&self, namespace: &str, name: &str) -> Option<ConfigMap> {
        get(&self.state().config_maps, namespace, name)
    }

    /// `Kind/name` of every object in a namespace
    pub fn object_names(&self, namespace: &str) -> Vec<String> {
        let state = self.state();
        let mut names = Vec::new();
        names.extend(names_in(&state.jobs, namespace, "Job"));
        names.extend(names_in(&state.config_maps, namespace, "ConfigMap"));
        names.extend(names_in(&state.deployments, namespace, "Deployment"));
        names.extend(names_in(&state.services, namespace, "Service"));
        names.extend(names_in(&state.ingresses, namespace, "Ingress"));
        names
    }
}

#[async_trait]
impl OrchestratorClient for FakeCluster {
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, Error> {
        Ok(self.state().namespaces.contains(name).then(Namespace::default))
    }

    async fn create_namespace(&self, namespace: &Namespace) -> Result<(), Error> {
        let mut state = self.state();
        if !state.namespaces.insert(namespace.name_any()) {
            return Err(api_error(409, "AlreadyExists"));
        }
        Ok(())
    }

    async fn list_jobs(&self, namespace: &str) -> Result<Vec<Job>, Error> {
        Ok(self
            .state()
            .jobs
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, job)| job.clone())
            .collect())
    }

    async fn get_job(&self, namespace: &str, name: &str) -> Result<Option<Job>, Error> {
        Ok(get(&self.state().jobs, namespace, name))
    }

    async fn create_job(&self, namespace: &str, job: &Job) -> Result<(), Error> {
        let mut state = self.state();
        state.injected("Job")?;
        insert(&mut state.jobs, namespace, job)
    }

    async fn create_config_map(
        &self,
        namespace: &str,
        config_map: &ConfigMap,
    ) -> Result<(), Error> {
        let mut state = self.state();
        state.injected("ConfigMap")?;
        insert(&mut state.config_maps, namespace, config_map)
    }

    async fn delete_config_map(&self, namespace: &str, name: &str) -> Result<DeleteOutcome, Error> {
        let mut state = self.state();
        state.injected("ConfigMap")?;
        Ok(remove(&mut state.config_maps, namespace, name))
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, Error> {
        Ok(get(&self.state().deployments, namespace, name))
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<(), Error> {
        let mut state = self.state();
        state.injected("Deployment")?;
        insert(&mut state.deployments, namespace, deployment)
    }

    async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<DeleteOutcome, Error> {
        let mut state = self.state();
        state.injected("Deployment")?;
        Ok(remove(&mut state.deployments, namespace, name))
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, Error> {
        Ok(get(&self.state().services, namespace, name))
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<(), Error> {
        let mut state = self.state();
        state.injected("Service")?;
        insert(&mut state.services, namespace, service)
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<DeleteOutcome, Error> {
        let mut state = self.state();
        state.injected("Service")?;
        Ok(remove(&mut state.services, namespace, name))
    }

    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Option<Ingress>, Error> {
        Ok(get(&self.state().ingresses, namespace, name))
    }

    async fn create_ingress(&self, namespace: &str, ingress: &Ingress) -> Result<(), Error> {
        let mut state = self.state();
        state.injected("Ingress")?;
        insert(&mut state.ingresses, namespace, ingress)
    }

    async fn delete_ingress(&self, namespace: &str, name: &str) -> Result<DeleteOutcome, Error> {
        let mut state = self.state();
        state.injected("Ingress")?;
        Ok(remove(&mut state.ingresses, namespace, name))
    }
}

/// The real router wired to a fresh [`FakeCluster`]
pub struct TestApp {
    pub cluster: Arc<FakeCluster>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let cluster = Arc::new(FakeCluster::default());
        let config = WorkloadConfig {
            training_image: "registry.local/training:1.0".to_string(),
            serving_image: "registry.local/serving:1.0".to_string(),
            serving_port: 5001,
            persistence_uri: "persistence.default.svc:5000".to_string(),
            domain: DOMAIN.to_string(),
            tls_secret_name: "ml-example-tls".to_string(),
        };
        let controller = LifecycleController::new(cluster.clone(), config);
        let router = router(AppState {
            controller: Arc::new(controller),
        });
        Self { cluster, router }
    }

    /// Send a request as `tenant` (no identity header when `None`)
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        tenant: Option<&str>,
        body: Option<&str>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(credential) = tenant {
            builder = builder.header("authorization", credential);
        }
        let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);
        let request = builder.body(body).expect("request building should succeed");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("request should succeed");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body reading should succeed");
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, json)
    }
}
