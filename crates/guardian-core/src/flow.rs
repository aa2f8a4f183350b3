//! Setup flow
//!
//! Strictly sequential pipeline over the validated plan:
//! base resources → identity wait → role grants → dependent resources →
//! verification. Later stages depend on attributes discovered by
//! earlier ones, so nothing here runs concurrently.
//!
//! Only a permanent provisioning failure (or cancellation) aborts the
//! run. Identity-wait exhaustion and grant failures degrade the run to
//! "complete with warnings" — the dependent resources are still
//! attempted and verification still executes.

use crate::cancel::CancelFlag;
use crate::config::DeploymentConfig;
use crate::gateway::ProviderGateway;
use crate::grants::{GrantOutcome, PermissionGranter};
use crate::provisioner::Provisioner;
use crate::report::{IdentityResolution, ProvisioningResult, RunReport, RunStatus};
use crate::spec::SetupPlan;
use crate::verify::VerificationReporter;
use crate::waiter::{PropagationWaiter, ServiceIdentity, WaitError};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Stages of a run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlowStage {
    ProvisioningBase,
    AwaitingIdentity,
    Granting,
    ProvisioningDependent,
    Verifying,
}

impl fmt::Display for FlowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ProvisioningBase => "provisioning base resources",
            Self::AwaitingIdentity => "awaiting service identity",
            Self::Granting => "granting roles",
            Self::ProvisioningDependent => "provisioning dependent resources",
            Self::Verifying => "verifying",
        };
        write!(f, "{name}")
    }
}

/// Drives one provisioning run end to end and always produces a report.
pub struct SetupFlow<G> {
    gateway: Arc<G>,
    config: DeploymentConfig,
    cancel: CancelFlag,
}

impl<G: ProviderGateway> SetupFlow<G> {
    pub fn new(gateway: Arc<G>, config: DeploymentConfig) -> Self {
        Self {
            gateway,
            config,
            cancel: CancelFlag::new(),
        }
    }

    /// Handle for wiring an interrupt handler to this run.
    #[must_use]
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    fn enter(&self, stage: FlowStage) {
        info!(stage = %stage, "entering stage");
    }

    /// Execute the full flow against the plan.
    ///
    /// The run always terminates with a report; no resource's final
    /// state is left unreported unless the run aborted before reaching
    /// it, in which case the report says so.
    pub async fn run(&self, plan: &SetupPlan) -> RunReport {
        let mut warnings = Vec::new();
        let provisioner = Provisioner::new(
            Arc::clone(&self.gateway),
            self.config.create_retry,
            self.cancel.clone(),
        );

        self.enter(FlowStage::ProvisioningBase);
        let mut results = match provisioner.provision(plan.base()).await {
            Ok(results) => results,
            Err(_) => return Self::aborted(Vec::new(), None, Vec::new(), cancelled(warnings)),
        };
        if let Some(failure) = abort_warning(&results) {
            warnings.push(failure);
            return Self::aborted(results, None, Vec::new(), warnings);
        }

        let identity = match plan.connection() {
            Some(connection) => {
                self.enter(FlowStage::AwaitingIdentity);
                let waiter = PropagationWaiter::new(
                    Arc::clone(&self.gateway),
                    self.config.identity_wait,
                    self.cancel.clone(),
                );
                match waiter.await_service_identity(connection).await {
                    Ok(ServiceIdentity { principal }) => {
                        Some(IdentityResolution::Resolved { principal })
                    }
                    Err(WaitError::Exhausted { attempts }) => {
                        warn!(
                            resource = %connection.id,
                            attempts,
                            "service identity did not propagate in time"
                        );
                        warnings.push(format!(
                            "service identity for {} was not visible after {attempts} polls; \
                             once it appears, grant it {} manually",
                            connection.id,
                            self.config.grant_roles.join(", ")
                        ));
                        Some(IdentityResolution::Exhausted { attempts })
                    }
                    Err(WaitError::Fatal(error)) => {
                        warn!(resource = %connection.id, "service identity lookup failed: {error}");
                        warnings.push(format!(
                            "service identity lookup for {} failed ({error}); \
                             grant roles manually in the console",
                            connection.id
                        ));
                        Some(IdentityResolution::Failed {
                            reason: error.to_string(),
                        })
                    }
                    Err(WaitError::Cancelled) => {
                        return Self::aborted(results, None, Vec::new(), cancelled(warnings));
                    }
                }
            }
            None => None,
        };

        let grants = match identity.as_ref().and_then(IdentityResolution::principal) {
            Some(principal) => {
                self.enter(FlowStage::Granting);
                let granter = PermissionGranter::new(Arc::clone(&self.gateway));
                granter.grant_all(principal, &self.config.grant_roles).await
            }
            None => Vec::new(),
        };
        for grant in grants.iter().filter(|g| !g.granted) {
            warnings.push(format!(
                "role {} was not granted: {}",
                grant.role,
                grant.detail.as_deref().unwrap_or("no detail")
            ));
        }

        self.enter(FlowStage::ProvisioningDependent);
        match provisioner.provision(plan.dependent()).await {
            Ok(mut dependent) => results.append(&mut dependent),
            Err(_) => return Self::aborted(results, identity, grants, cancelled(warnings)),
        }
        if let Some(failure) = abort_warning(&results) {
            warnings.push(failure);
            return Self::aborted(results, identity, grants, warnings);
        }

        self.enter(FlowStage::Verifying);
        let reporter = VerificationReporter::new(Arc::clone(&self.gateway));
        let verification = reporter.verify(&plan.critical()).await;

        let status = if warnings.is_empty() && verification.passed {
            RunStatus::Complete
        } else {
            RunStatus::CompleteWithWarnings
        };
        info!(status = ?status, "setup flow finished");

        RunReport {
            status,
            results,
            identity,
            grants,
            verification: Some(verification),
            warnings,
        }
    }

    fn aborted(
        results: Vec<ProvisioningResult>,
        identity: Option<IdentityResolution>,
        grants: Vec<GrantOutcome>,
        warnings: Vec<String>,
    ) -> RunReport {
        RunReport {
            status: RunStatus::Aborted,
            results,
            identity,
            grants,
            verification: None,
            warnings,
        }
    }
}

/// Warning text for the first failed resource, if any.
fn abort_warning(results: &[ProvisioningResult]) -> Option<String> {
    results.iter().find(|r| r.outcome.is_failed()).map(|r| {
        format!(
            "provisioning aborted at {}; fix the definition or authorization, then re-run",
            r.id
        )
    })
}

fn cancelled(mut warnings: Vec<String>) -> Vec<String> {
    warnings.push("run cancelled by operator; safe to re-run".to_string());
    warnings
}
