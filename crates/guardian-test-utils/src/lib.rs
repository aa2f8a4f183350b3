//! Testing utilities for the Clinical Guardian workspace
//!
//! A scriptable in-memory control plane plus configuration fixtures.
//! The fake records every call so tests can assert ordering and call
//! counts, and it honors the gateway contract: creates are immediately
//! visible to `exists`, while scripted attributes may lag.

use guardian_core::config::DeploymentConfig;
use guardian_core::error::GatewayError;
use guardian_core::gateway::{
    Attributes, CreateOutcome, ProviderGateway, SERVICE_IDENTITY_ATTR,
};
use guardian_core::retry::RetryPolicy;
use guardian_core::spec::{ResourceId, ResourceSpec};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

/// One recorded gateway invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Exists(ResourceId),
    Create(ResourceId),
    Describe(ResourceId),
    Grant { principal: String, role: String },
}

struct IdentityScript {
    visible_after: u32,
    principal: String,
}

#[derive(Default)]
struct State {
    existing: HashSet<ResourceId>,
    exists_faults: HashMap<ResourceId, VecDeque<GatewayError>>,
    create_faults: HashMap<ResourceId, VecDeque<GatewayError>>,
    describe_faults: HashMap<ResourceId, VecDeque<GatewayError>>,
    identity: HashMap<ResourceId, IdentityScript>,
    denied_roles: HashMap<String, GatewayError>,
    describe_counts: HashMap<ResourceId, u32>,
    granted: Vec<(String, String)>,
    calls: Vec<GatewayCall>,
}

/// Scriptable in-memory stand-in for the remote control plane.
#[derive(Default)]
pub struct FakeGateway {
    state: Mutex<State>,
}

impl FakeGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a resource as existing before the run starts.
    pub fn pre_existing(&self, id: impl Into<ResourceId>) {
        self.state.lock().existing.insert(id.into());
    }

    /// Queue a fault for the next `exists` call on a resource.
    pub fn fail_exists(&self, id: impl Into<ResourceId>, error: GatewayError) {
        self.state
            .lock()
            .exists_faults
            .entry(id.into())
            .or_default()
            .push_back(error);
    }

    /// Queue a fault for the next `create` call on a resource.
    pub fn fail_create(&self, id: impl Into<ResourceId>, error: GatewayError) {
        self.state
            .lock()
            .create_faults
            .entry(id.into())
            .or_default()
            .push_back(error);
    }

    /// Queue `count` transient create faults that clear on the next try.
    pub fn fail_create_times(&self, id: impl Into<ResourceId>, count: u32, reason: &str) {
        let id = id.into();
        let mut state = self.state.lock();
        let queue = state.create_faults.entry(id).or_default();
        for _ in 0..count {
            queue.push_back(GatewayError::Transient(reason.to_string()));
        }
    }

    /// Queue a fault for the next `describe` call on a resource.
    pub fn fail_describe(&self, id: impl Into<ResourceId>, error: GatewayError) {
        self.state
            .lock()
            .describe_faults
            .entry(id.into())
            .or_default()
            .push_back(error);
    }

    /// The resource's service identity becomes visible on the Nth
    /// describe call (1-based).
    pub fn identity_visible_after(
        &self,
        id: impl Into<ResourceId>,
        polls: u32,
        principal: impl Into<String>,
    ) {
        self.state.lock().identity.insert(
            id.into(),
            IdentityScript {
                visible_after: polls,
                principal: principal.into(),
            },
        );
    }

    /// The resource's service identity never becomes visible.
    pub fn identity_never(&self, id: impl Into<ResourceId>) {
        self.state.lock().identity.insert(
            id.into(),
            IdentityScript {
                visible_after: u32::MAX,
                principal: String::new(),
            },
        );
    }

    /// Every bind of this role fails with the given error.
    pub fn deny_role(&self, role: impl Into<String>, error: GatewayError) {
        self.state.lock().denied_roles.insert(role.into(), error);
    }

    /// All calls in invocation order.
    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state.lock().calls.clone()
    }

    /// Number of `describe` calls a resource has received.
    #[must_use]
    pub fn describe_count(&self, id: &ResourceId) -> u32 {
        self.state
            .lock()
            .describe_counts
            .get(id)
            .copied()
            .unwrap_or(0)
    }

    /// Roles granted so far, as (principal, role) pairs.
    #[must_use]
    pub fn granted(&self) -> Vec<(String, String)> {
        self.state.lock().granted.clone()
    }

    /// Whether the fake currently considers the resource to exist.
    #[must_use]
    pub fn has(&self, id: &ResourceId) -> bool {
        self.state.lock().existing.contains(id)
    }
}

#[async_trait::async_trait]
impl ProviderGateway for FakeGateway {
    async fn exists(&self, spec: &ResourceSpec) -> Result<bool, GatewayError> {
        let mut state = self.state.lock();
        state.calls.push(GatewayCall::Exists(spec.id.clone()));
        if let Some(error) = state
            .exists_faults
            .get_mut(&spec.id)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        Ok(state.existing.contains(&spec.id))
    }

    async fn create(&self, spec: &ResourceSpec) -> Result<CreateOutcome, GatewayError> {
        let mut state = self.state.lock();
        state.calls.push(GatewayCall::Create(spec.id.clone()));
        if let Some(error) = state
            .create_faults
            .get_mut(&spec.id)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        if state.existing.contains(&spec.id) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        state.existing.insert(spec.id.clone());
        Ok(CreateOutcome::Created)
    }

    async fn describe(&self, spec: &ResourceSpec) -> Result<Attributes, GatewayError> {
        let mut state = self.state.lock();
        state.calls.push(GatewayCall::Describe(spec.id.clone()));
        let count = state.describe_counts.entry(spec.id.clone()).or_insert(0);
        *count += 1;
        let count = *count;
        if let Some(error) = state
            .describe_faults
            .get_mut(&spec.id)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        if !state.existing.contains(&spec.id) {
            return Err(GatewayError::Transient(format!(
                "{} not visible yet",
                spec.id
            )));
        }
        let mut attributes = Attributes::new().with("state", "READY");
        if let Some(script) = state.identity.get(&spec.id) {
            if count >= script.visible_after {
                attributes.set(SERVICE_IDENTITY_ATTR, script.principal.clone());
            }
        }
        Ok(attributes)
    }

    async fn grant_role(&self, principal: &str, role: &str) -> Result<(), GatewayError> {
        let mut state = self.state.lock();
        state.calls.push(GatewayCall::Grant {
            principal: principal.to_string(),
            role: role.to_string(),
        });
        if let Some(error) = state.denied_roles.get(role) {
            return Err(error.clone());
        }
        let pair = (principal.to_string(), role.to_string());
        // Idempotent: re-granting a held role is a quiet success.
        if !state.granted.contains(&pair) {
            state.granted.push(pair);
        }
        Ok(())
    }
}

/// Demo configuration with zero-delay retry policies for fast tests.
#[must_use]
pub fn fast_config() -> DeploymentConfig {
    DeploymentConfig::new("demo-project")
        .with_identity_wait(RetryPolicy::fixed(6, Duration::ZERO))
        .with_create_retry(RetryPolicy::fixed(3, Duration::ZERO))
}
