//! Best-effort role grants
//!
//! Grants are advisory: the operator is warned up front that manual IAM
//! configuration may be needed, so a failed bind is logged and reported
//! but never aborts the run. Roles are independent — one failure does
//! not stop the remaining binds from being attempted.

use crate::gateway::ProviderGateway;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// One principal/role pair to bind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleBinding {
    pub principal: String,
    pub role: String,
}

impl RoleBinding {
    pub fn new(principal: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            role: role.into(),
        }
    }
}

/// Result of one bind attempt. Applied, never queried back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrantOutcome {
    pub role: String,
    pub granted: bool,
    pub detail: Option<String>,
}

/// Applies a fixed role list to a discovered principal.
pub struct PermissionGranter<G> {
    gateway: Arc<G>,
}

impl<G: ProviderGateway> PermissionGranter<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    /// Bind every role to the principal, best-effort per role.
    ///
    /// Granting an already-held role is a no-op success at the gateway,
    /// so re-running against a configured project reports all grants as
    /// applied.
    pub async fn grant_all(&self, principal: &str, roles: &[String]) -> Vec<GrantOutcome> {
        let mut outcomes = Vec::with_capacity(roles.len());
        for role in roles {
            let binding = RoleBinding::new(principal, role);
            match self
                .gateway
                .grant_role(&binding.principal, &binding.role)
                .await
            {
                Ok(()) => {
                    info!(principal = %binding.principal, role = %binding.role, "role granted");
                    outcomes.push(GrantOutcome {
                        role: binding.role,
                        granted: true,
                        detail: None,
                    });
                }
                Err(error) => {
                    warn!(
                        principal = %binding.principal,
                        role = %binding.role,
                        class = error.class(),
                        "role grant failed; continuing with remaining roles: {error}"
                    );
                    outcomes.push(GrantOutcome {
                        role: binding.role,
                        granted: false,
                        detail: Some(error.to_string()),
                    });
                }
            }
        }
        outcomes
    }
}
