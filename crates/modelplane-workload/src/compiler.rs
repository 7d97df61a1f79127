//! Compilation of tenant workloads into Kubernetes resources
//!
//! Training: a ConfigMap with the run's parameters and a run-to-completion
//! Job whose container reads every parameter through `configMapKeyRef`.
//! The Job must therefore be submitted after its ConfigMap.
//!
//! Serving: a ConfigMap, a single-replica Deployment, a ClusterIP Service and
//! an Ingress that routes `https://<domain>/serving/<tenant_id>` to it with
//! TLS from the shared certificate secret.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapKeySelector, Container, ContainerPort, EnvVar, EnvVarSource,
    HTTPGetAction, Namespace, PodSpec, PodTemplateSpec, Probe, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde::Deserialize;

use modelplane_common::{
    Error, Tenant, WorkloadConfig, LABEL_APP, LABEL_MANAGED_BY, LABEL_MANAGED_BY_MODELPLANE,
    LABEL_RUN_ID, LABEL_TENANT, LABEL_TENANT_HASH,
};

use crate::names::{serving_name, serving_path, training_name};

/// Persistence address as read by the training image
pub const ENV_PERSISTENCE_SERVICE_URI: &str = "PERSISTENCE_SERVICE_URI";
/// Persistence address as read by the serving image
pub const ENV_PERSISTENCE_SERVICE_URL: &str = "PERSISTENCE_SERVICE_URL";
/// Raw credential, used by workloads to authenticate to the persistence service
pub const ENV_TENANT: &str = "TENANT";
/// Input image height, when the caller sets it
pub const ENV_IMG_HEIGHT: &str = "IMG_HEIGHT";
/// Input image width, when the caller sets it
pub const ENV_IMG_WIDTH: &str = "IMG_WIDTH";
/// Training batch size, when the caller sets it
pub const ENV_BATCH_SIZE: &str = "BATCH_SIZE";
/// Number of training epochs, when the caller sets it
pub const ENV_EPOCHS: &str = "EPOCHS";

const TRAINING_CONTAINER: &str = "training";
const SERVING_CONTAINER: &str = "serving";
const SERVING_PORT_NAME: &str = "http";

/// Optional hyperparameters a caller may pass when starting a training run.
///
/// Unset values fall back to the training image's own defaults.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TrainingParams {
    /// Input image height in pixels
    #[serde(default)]
    pub img_height: Option<u32>,
    /// Input image width in pixels
    #[serde(default)]
    pub img_width: Option<u32>,
    /// Training batch size
    #[serde(default)]
    pub batch_size: Option<u32>,
    /// Number of training epochs
    #[serde(default)]
    pub epochs: Option<u32>,
}

impl TrainingParams {
    fn entries(&self) -> [(&'static str, &'static str, Option<u32>); 4] {
        [
            ("img_height", ENV_IMG_HEIGHT, self.img_height),
            ("img_width", ENV_IMG_WIDTH, self.img_width),
            ("batch_size", ENV_BATCH_SIZE, self.batch_size),
            ("epochs", ENV_EPOCHS, self.epochs),
        ]
    }

    /// Every supplied value must be positive
    pub fn validate(&self) -> Result<(), Error> {
        for (field, _, value) in self.entries() {
            if value == Some(0) {
                return Err(Error::validation_for_field(field, "must be a positive integer"));
            }
        }
        Ok(())
    }

    fn env(&self) -> impl Iterator<Item = (&'static str, String)> {
        self.entries()
            .into_iter()
            .filter_map(|(_, key, value)| value.map(|v| (key, v.to_string())))
    }
}

/// Complete compiled output for a training run
#[derive(Clone, Debug)]
pub struct CompiledTraining {
    /// Parameters for the run; must exist before the Job
    pub config_map: ConfigMap,
    /// Run-to-completion Job
    pub job: Job,
}

/// Complete compiled output for a serving deployment, in creation order
#[derive(Clone, Debug)]
pub struct CompiledServing {
    /// Runtime parameters; must exist before the Deployment
    pub config_map: ConfigMap,
    /// Single-replica Deployment
    pub deployment: Deployment,
    /// Cluster-internal Service in front of the Deployment
    pub service: Service,
    /// Public route to the Service
    pub ingress: Ingress,
}

/// Build the tenant's namespace
pub fn compile_namespace(tenant: &Tenant) -> Namespace {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_TENANT_HASH.to_string(), tenant.id().to_string());
    labels.insert(
        LABEL_MANAGED_BY.to_string(),
        LABEL_MANAGED_BY_MODELPLANE.to_string(),
    );

    Namespace {
        metadata: ObjectMeta {
            name: Some(tenant.namespace().to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Compile a training run into its ConfigMap and Job.
pub fn compile_training(
    tenant: &Tenant,
    run_id: &str,
    config: &WorkloadConfig,
    params: &TrainingParams,
) -> Result<CompiledTraining, Error> {
    params.validate()?;

    let name = training_name(tenant.id(), run_id);
    let mut labels = workload_labels(&name, tenant);
    labels.insert(LABEL_RUN_ID.to_string(), run_id.to_string());

    let mut data = BTreeMap::new();
    data.insert(
        ENV_PERSISTENCE_SERVICE_URI.to_string(),
        config.persistence_uri.clone(),
    );
    data.insert(ENV_TENANT.to_string(), tenant.credential().to_string());
    for (key, value) in params.env() {
        data.insert(key.to_string(), value);
    }

    let container = Container {
        name: TRAINING_CONTAINER.to_string(),
        image: Some(config.training_image.clone()),
        env: Some(env_from_config_map(&name, data.keys())),
        ..Default::default()
    };

    let job = Job {
        metadata: metadata(&name, tenant, &labels),
        spec: Some(JobSpec {
            backoff_limit: Some(0),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels.clone()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    restart_policy: Some("Never".to_string()),
                    containers: vec![container],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    };

    let config_map = ConfigMap {
        metadata: metadata(&name, tenant, &labels),
        data: Some(data),
        ..Default::default()
    };

    Ok(CompiledTraining { config_map, job })
}

/// Compile the tenant's serving deployment into its four resources.
pub fn compile_serving(tenant: &Tenant, config: &WorkloadConfig) -> CompiledServing {
    let name = serving_name(tenant.id());
    let labels = workload_labels(&name, tenant);

    let mut data = BTreeMap::new();
    data.insert(
        ENV_PERSISTENCE_SERVICE_URL.to_string(),
        config.persistence_uri.clone(),
    );
    data.insert(ENV_TENANT.to_string(), tenant.credential().to_string());

    let config_map = ConfigMap {
        metadata: metadata(&name, tenant, &labels),
        data: Some(data.clone()),
        ..Default::default()
    };

    CompiledServing {
        deployment: serving_deployment(&name, tenant, &labels, config, data.keys()),
        service: serving_service(&name, tenant, &labels, config),
        ingress: serving_ingress(&name, tenant, &labels, config),
        config_map,
    }
}

fn serving_deployment<'a>(
    name: &str,
    tenant: &Tenant,
    labels: &BTreeMap<String, String>,
    config: &WorkloadConfig,
    env_keys: impl Iterator<Item = &'a String>,
) -> Deployment {
    let mut selector = BTreeMap::new();
    selector.insert(LABEL_APP.to_string(), name.to_string());

    let container = Container {
        name: SERVING_CONTAINER.to_string(),
        image: Some(config.serving_image.clone()),
        ports: Some(vec![ContainerPort {
            name: Some(SERVING_PORT_NAME.to_string()),
            container_port: i32::from(config.serving_port),
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        env: Some(env_from_config_map(name, env_keys)),
        // The model is loaded before the server answers on /
        readiness_probe: Some(Probe {
            http_get: Some(HTTPGetAction {
                path: Some("/".to_string()),
                port: IntOrString::String(SERVING_PORT_NAME.to_string()),
                ..Default::default()
            }),
            initial_delay_seconds: Some(5),
            period_seconds: Some(10),
            ..Default::default()
        }),
        ..Default::default()
    };

    Deployment {
        metadata: metadata(name, tenant, labels),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(selector),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels.clone()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn serving_service(
    name: &str,
    tenant: &Tenant,
    labels: &BTreeMap<String, String>,
    config: &WorkloadConfig,
) -> Service {
    let mut selector = BTreeMap::new();
    selector.insert(LABEL_APP.to_string(), name.to_string());

    Service {
        metadata: metadata(name, tenant, labels),
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(selector),
            ports: Some(vec![ServicePort {
                name: Some(SERVING_PORT_NAME.to_string()),
                port: i32::from(config.serving_port),
                target_port: Some(IntOrString::String(SERVING_PORT_NAME.to_string())),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn serving_ingress(
    name: &str,
    tenant: &Tenant,
    labels: &BTreeMap<String, String>,
    config: &WorkloadConfig,
) -> Ingress {
    // /serving/<tenant_id>/infer reaches the container as /infer
    let mut annotations = BTreeMap::new();
    annotations.insert(
        "nginx.ingress.kubernetes.io/rewrite-target".to_string(),
        "/$2".to_string(),
    );
    annotations.insert(
        "nginx.ingress.kubernetes.io/use-regex".to_string(),
        "true".to_string(),
    );

    let mut meta = metadata(name, tenant, labels);
    meta.annotations = Some(annotations);

    Ingress {
        metadata: meta,
        spec: Some(IngressSpec {
            tls: Some(vec![IngressTLS {
                hosts: Some(vec![config.domain.clone()]),
                secret_name: Some(config.tls_secret_name.clone()),
            }]),
            rules: Some(vec![IngressRule {
                host: Some(config.domain.clone()),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some(format!("{}(/|$)(.*)", serving_path(tenant.id()))),
                        path_type: "ImplementationSpecific".to_string(),
                        backend: IngressBackend {
                            service: Some(IngressServiceBackend {
                                name: name.to_string(),
                                port: Some(ServiceBackendPort {
                                    name: Some(SERVING_PORT_NAME.to_string()),
                                    ..Default::default()
                                }),
                            }),
                            ..Default::default()
                        },
                    }],
                }),
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Labels shared by every resource of a workload
fn workload_labels(app: &str, tenant: &Tenant) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_APP.to_string(), app.to_string());
    labels.insert(LABEL_TENANT.to_string(), tenant.label_value());
    labels.insert(LABEL_TENANT_HASH.to_string(), tenant.id().to_string());
    labels.insert(
        LABEL_MANAGED_BY.to_string(),
        LABEL_MANAGED_BY_MODELPLANE.to_string(),
    );
    labels
}

fn metadata(name: &str, tenant: &Tenant, labels: &BTreeMap<String, String>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(tenant.namespace().to_string()),
        labels: Some(labels.clone()),
        ..Default::default()
    }
}

/// Bind each key of a ConfigMap to an env var of the same name by reference
fn env_from_config_map<'a>(
    config_map: &str,
    keys: impl Iterator<Item = &'a String>,
) -> Vec<EnvVar> {
    keys.map(|key| EnvVar {
        name: key.clone(),
        value_from: Some(EnvVarSource {
            config_map_key_ref: Some(ConfigMapKeySelector {
                name: config_map.to_string(),
                key: key.clone(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    })
    .collect()
}
