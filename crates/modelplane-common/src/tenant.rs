//! Tenant identity derived from an opaque credential
//!
//! The credential is never interpreted. Its SHA-256 digest, truncated to
//! 128 bits and hex encoded, is the tenant id: 32 lowercase hex characters,
//! which is a legal DNS-1123 label and therefore usable verbatim as the
//! tenant's namespace name and inside resource names.

use std::fmt;

use aws_lc_rs::digest::{digest, SHA256};

use crate::kube_utils::sanitize_label_value;
use crate::Error;

/// Number of digest bytes kept in a tenant id
const TENANT_ID_BYTES: usize = 16;

/// Deterministic identifier of a tenant; doubles as its namespace name
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TenantId(String);

impl TenantId {
    /// Derive the tenant id for a credential
    pub fn derive(credential: &str) -> Self {
        let hash = digest(&SHA256, credential.as_bytes());
        let hex = hash.as_ref()[..TENANT_ID_BYTES].iter().fold(
            String::with_capacity(TENANT_ID_BYTES * 2),
            |mut s, b| {
                use std::fmt::Write;
                let _ = write!(s, "{:02x}", b);
                s
            },
        );
        Self(hex)
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A resolved caller: the raw credential plus its derived id
#[derive(Clone, PartialEq, Eq)]
pub struct Tenant {
    credential: String,
    id: TenantId,
}

impl Tenant {
    /// Resolve a tenant from the identity header value.
    ///
    /// Fails with `Unauthenticated` when the credential is absent, empty or
    /// only whitespace.
    pub fn resolve(credential: Option<&str>) -> Result<Self, Error> {
        let credential = credential
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| Error::unauthenticated("identity header is missing or empty"))?;

        Ok(Self {
            id: TenantId::derive(credential),
            credential: credential.to_string(),
        })
    }

    /// The derived tenant id
    pub fn id(&self) -> &TenantId {
        &self.id
    }

    /// The tenant's namespace; always equal to the tenant id
    pub fn namespace(&self) -> &str {
        self.id.as_str()
    }

    /// The raw credential, for injection into the tenant's own workloads
    pub fn credential(&self) -> &str {
        &self.credential
    }

    /// The credential rendered as a legal label value
    pub fn label_value(&self) -> String {
        sanitize_label_value(&self.credential)
    }
}

impl fmt::Debug for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Don't expose the credential in debug output
        f.debug_struct("Tenant").field("id", &self.id).finish()
    }
}
