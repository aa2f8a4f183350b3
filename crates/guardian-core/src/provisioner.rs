//! Dependency-ordered, idempotent resource creation
//!
//! Consumes specs in plan order and drives the gateway with
//! create-or-skip semantics. Transient failures are retried under the
//! configured policy; exhaustion of that budget escalates to a
//! permanent failure. The first permanent failure short-circuits the
//! remaining specs — dependents of a failed resource are never
//! attempted.

use crate::cancel::CancelFlag;
use crate::error::{GatewayError, SetupError};
use crate::gateway::{CreateOutcome, ProviderGateway};
use crate::report::{ProvisionOutcome, ProvisioningResult};
use crate::retry::{Attempt, RetryError, RetryPolicy};
use crate::spec::ResourceSpec;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Fatal interruptions of a single create-or-skip attempt.
enum CreateAbort {
    Cancelled,
    Permanent(String),
}

/// Executes resource specs against the gateway in order.
pub struct Provisioner<G> {
    gateway: Arc<G>,
    retry: RetryPolicy,
    cancel: CancelFlag,
}

impl<G: ProviderGateway> Provisioner<G> {
    pub fn new(gateway: Arc<G>, retry: RetryPolicy, cancel: CancelFlag) -> Self {
        Self {
            gateway,
            retry,
            cancel,
        }
    }

    /// Realize each spec with create-or-skip semantics.
    ///
    /// Returns one result per attempted resource. On a permanent
    /// failure the failed resource is recorded and the remaining specs
    /// are skipped; the caller decides what that means for the run.
    ///
    /// # Errors
    /// Only cancellation produces an error; provider failures are
    /// recorded as outcomes.
    pub async fn provision(
        &self,
        specs: &[ResourceSpec],
    ) -> Result<Vec<ProvisioningResult>, SetupError> {
        let mut results = Vec::with_capacity(specs.len());
        for spec in specs {
            if self.cancel.is_cancelled() {
                return Err(SetupError::Cancelled);
            }
            let outcome = self.provision_one(spec).await?;
            let failed = outcome.is_failed();
            results.push(ProvisioningResult {
                id: spec.id.clone(),
                outcome,
            });
            if failed {
                error!(
                    resource = %spec.id,
                    "provisioning stopped; resources after this one were not attempted"
                );
                break;
            }
        }
        Ok(results)
    }

    /// One create-or-skip cycle under the transient retry policy.
    async fn provision_one(&self, spec: &ResourceSpec) -> Result<ProvisionOutcome, SetupError> {
        let gateway = &self.gateway;
        let cancel = &self.cancel;

        let attempt_outcome = self
            .retry
            .run(|attempt| async move {
                if cancel.is_cancelled() {
                    return Attempt::Fail(CreateAbort::Cancelled);
                }
                // Re-derive existence on every attempt; the provider is
                // the only source of truth.
                match gateway.exists(spec).await {
                    Ok(true) => return Attempt::Done(ProvisionOutcome::AlreadyExists),
                    Ok(false) => {}
                    Err(GatewayError::Transient(reason)) => {
                        warn!(resource = %spec.id, attempt, "existence check failed: {reason}");
                        return Attempt::Retry(reason);
                    }
                    Err(GatewayError::Permanent(reason)) => {
                        return Attempt::Fail(CreateAbort::Permanent(reason));
                    }
                }
                match gateway.create(spec).await {
                    Ok(CreateOutcome::Created) => Attempt::Done(ProvisionOutcome::Created),
                    Ok(CreateOutcome::AlreadyExists) => {
                        Attempt::Done(ProvisionOutcome::AlreadyExists)
                    }
                    Err(GatewayError::Transient(reason)) => {
                        warn!(resource = %spec.id, attempt, "create failed: {reason}");
                        Attempt::Retry(reason)
                    }
                    Err(GatewayError::Permanent(reason)) => {
                        Attempt::Fail(CreateAbort::Permanent(reason))
                    }
                }
            })
            .await;

        match attempt_outcome {
            Ok(outcome) => {
                match outcome {
                    ProvisionOutcome::Created => {
                        info!(resource = %spec.id, kind = %spec.kind(), "created");
                    }
                    ProvisionOutcome::AlreadyExists => {
                        info!(resource = %spec.id, kind = %spec.kind(), "already exists, skipping");
                    }
                    ProvisionOutcome::Failed { .. } => {}
                }
                Ok(outcome)
            }
            Err(RetryError::Fatal(CreateAbort::Cancelled)) => Err(SetupError::Cancelled),
            Err(RetryError::Fatal(CreateAbort::Permanent(reason))) => {
                error!(resource = %spec.id, "permanent failure: {reason}");
                Ok(ProvisionOutcome::Failed { reason })
            }
            Err(RetryError::Exhausted {
                attempts,
                last_reason,
            }) => {
                // Transient exhaustion escalates to a permanent failure.
                let reason =
                    format!("transient failures exhausted {attempts} attempts: {last_reason}");
                error!(resource = %spec.id, "{reason}");
                Ok(ProvisionOutcome::Failed { reason })
            }
        }
    }
}
