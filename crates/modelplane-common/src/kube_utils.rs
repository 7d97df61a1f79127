//! Shared Kubernetes utilities using kube-rs
//!
//! Client construction with bounded per-call timeouts and classification of
//! API errors by kind, so callers branch on "absent" vs "failed" instead of
//! inspecting status codes.

use std::path::Path;
use std::time::Duration;

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};

use crate::Error;

/// Default connection timeout for kube clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for kube clients; bounds every orchestrator call
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum length of a DNS-1123 label (namespace names, label values)
pub const MAX_LABEL_LEN: usize = 63;

/// True when the error is a Kubernetes 404
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 404)
}

/// True when the error is a Kubernetes 409 (object already exists / conflict)
pub fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 409)
}

/// Create a kube client from optional kubeconfig path with custom timeouts
///
/// Without a path the configuration is inferred (in-cluster service account,
/// then `$KUBECONFIG` / `~/.kube/config`).
pub async fn create_client_with_timeout(
    kubeconfig: Option<&Path>,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<Client, Error> {
    let mut config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::internal_with_context(
                    "create_client",
                    format!("failed to read kubeconfig: {}", e),
                )
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| {
                    Error::internal_with_context(
                        "create_client",
                        format!("failed to load kubeconfig: {}", e),
                    )
                })?
        }
        None => Config::infer().await.map_err(|e| {
            Error::internal_with_context("create_client", format!("failed to infer config: {}", e))
        })?,
    };

    config.connect_timeout = Some(connect_timeout);
    config.read_timeout = Some(read_timeout);
    config.write_timeout = Some(read_timeout);

    Client::try_from(config).map_err(|e| {
        Error::internal_with_context("create_client", format!("failed to create client: {}", e))
    })
}

/// Turn an arbitrary string into a legal label value.
///
/// Characters outside `[A-Za-z0-9._-]` become `_`, the result is cut to 63
/// characters and must begin and end with an alphanumeric character.
pub fn sanitize_label_value(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_LABEL_LEN)
        .collect();

    replaced
        .trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_string()
}

/// Check that a string is a DNS-1123 label: lowercase alphanumerics and `-`,
/// starting and ending alphanumeric, at most 63 characters.
pub fn is_dns_label(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_LABEL_LEN
        && s.bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        && !s.starts_with('-')
        && !s.ends_with('-')
}
