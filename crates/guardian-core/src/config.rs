//! Deployment configuration
//!
//! Everything that parameterizes a run — project, location, resource
//! names, role list, retry policies — is carried in one explicit value
//! instead of ambient state, so unit tests can run the whole flow
//! against a fake gateway with deterministic settings.

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Roles granted to the connection's service identity in the reference
/// deployment: model invocation plus read access to the document bucket.
pub const DEFAULT_GRANT_ROLES: [&str; 2] = ["roles/aiplatform.user", "roles/storage.objectViewer"];

/// Configuration for one provisioning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Cloud project identifier. Opaque to the core.
    pub project: String,
    /// Location/region for dataset, bucket, and connection.
    pub location: String,
    /// Warehouse dataset name.
    pub dataset: String,
    /// Document bucket name.
    pub bucket: String,
    /// Connection name through which remote model calls are authorized.
    pub connection: String,
    /// Hosted model endpoint backing the model resource.
    pub model_endpoint: String,
    /// Roles bound to the connection's service identity, re-granted on
    /// every run (idempotent reinforcement).
    pub grant_roles: Vec<String>,
    /// Poll policy for the service identity propagation wait.
    pub identity_wait: RetryPolicy,
    /// Retry policy for transient create/exists failures.
    pub create_retry: RetryPolicy,
}

impl DeploymentConfig {
    /// Reference configuration for a project: demo resource names,
    /// a 6 × 10 s identity wait, and a short create retry.
    #[must_use]
    pub fn new(project: impl Into<String>) -> Self {
        let project = project.into();
        let bucket = format!("{project}-clinical-docs");
        Self {
            project,
            location: "us-central1".to_string(),
            dataset: "clinical_guardian".to_string(),
            bucket,
            connection: "vertex-ai".to_string(),
            model_endpoint: "gemini-2.0-flash".to_string(),
            grant_roles: DEFAULT_GRANT_ROLES.iter().map(|r| r.to_string()).collect(),
            identity_wait: RetryPolicy::fixed(6, Duration::from_secs(10)),
            create_retry: RetryPolicy::fixed(3, Duration::from_secs(2)),
        }
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    #[must_use]
    pub fn with_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset = dataset.into();
        self
    }

    #[must_use]
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    #[must_use]
    pub fn with_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = connection.into();
        self
    }

    #[must_use]
    pub fn with_model_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.model_endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn with_grant_roles(mut self, roles: Vec<String>) -> Self {
        self.grant_roles = roles;
        self
    }

    #[must_use]
    pub fn with_identity_wait(mut self, policy: RetryPolicy) -> Self {
        self.identity_wait = policy;
        self
    }

    #[must_use]
    pub fn with_create_retry(mut self, policy: RetryPolicy) -> Self {
        self.create_retry = policy;
        self
    }
}
