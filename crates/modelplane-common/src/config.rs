//! Workload configuration consumed at process start

use crate::Error;

/// Options every workload manifest is built from.
///
/// All fields are required; the binary refuses to start unless
/// [`WorkloadConfig::validate`] passes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkloadConfig {
    /// Container image for training jobs
    pub training_image: String,
    /// Container image for serving deployments
    pub serving_image: String,
    /// Port the serving container listens on
    pub serving_port: u16,
    /// Address of the dataset/artifact persistence service
    pub persistence_uri: String,
    /// Public domain the serving ingress is exposed under
    pub domain: String,
    /// Name of the shared TLS certificate secret for the ingress
    pub tls_secret_name: String,
}

impl WorkloadConfig {
    /// Reject empty values and an unusable port
    pub fn validate(&self) -> Result<(), Error> {
        let required = [
            ("training_image", &self.training_image),
            ("serving_image", &self.serving_image),
            ("persistence_uri", &self.persistence_uri),
            ("domain", &self.domain),
            ("tls_secret_name", &self.tls_secret_name),
        ];

        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(Error::config(format!("{} must not be empty", name)));
            }
        }

        if self.serving_port == 0 {
            return Err(Error::config("serving_port must be between 1 and 65535"));
        }

        if self.domain.contains('/') {
            return Err(Error::config(
                "domain must be a bare host name without scheme or path",
            ));
        }

        Ok(())
    }
}
