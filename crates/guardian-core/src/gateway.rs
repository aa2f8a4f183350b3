//! Capability seam over the remote control plane
//!
//! Everything the flow does to the outside world goes through
//! [`ProviderGateway`]. Implementations classify failures as transient
//! or permanent ([`crate::error::GatewayError`]); that classification is
//! the seam that keeps the rest of the core retry-policy-agnostic.

use crate::error::GatewayError;
use crate::spec::ResourceSpec;
use serde::Serialize;
use std::collections::BTreeMap;

/// Attribute key under which a connection reports its auto-provisioned
/// service identity once it has propagated.
pub const SERVICE_IDENTITY_ATTR: &str = "service_identity";

/// Key-value attribute bag returned by `describe`.
///
/// Resource creation can acknowledge before all derived attributes are
/// queryable, so an attribute being absent here is an expected state,
/// not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Attributes(BTreeMap<String, String>);

impl Attributes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Result of an idempotent create call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// The provider reported the resource as already present. Success,
    /// never an error.
    AlreadyExists,
}

/// Control-plane operations the flow relies on, per resource kind.
///
/// Contract:
/// - every operation is safe to call against a resource that already
///   exists; "already exists" is success, not failure;
/// - a successful `create` is immediately visible to subsequent
///   `exists` calls, though derived attributes (such as a connection's
///   service identity) may lag;
/// - `grant_role` is idempotent — re-granting a held role is a no-op.
#[async_trait::async_trait]
pub trait ProviderGateway: Send + Sync {
    async fn exists(&self, spec: &ResourceSpec) -> Result<bool, GatewayError>;

    async fn create(&self, spec: &ResourceSpec) -> Result<CreateOutcome, GatewayError>;

    async fn describe(&self, spec: &ResourceSpec) -> Result<Attributes, GatewayError>;

    async fn grant_role(&self, principal: &str, role: &str) -> Result<(), GatewayError>;
}
