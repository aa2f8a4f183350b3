//! Propagation wait
//!
//! Resource creation can acknowledge before derived attributes are
//! queryable; the connection's auto-provisioned service identity is the
//! one attribute this flow depends on. The waiter polls `describe`
//! under a bounded policy and short-circuits on the first non-empty
//! extraction. Running out of polls is a distinguished, non-fatal
//! outcome — the run continues in a degraded state.

use crate::cancel::CancelFlag;
use crate::error::GatewayError;
use crate::gateway::{Attributes, ProviderGateway, SERVICE_IDENTITY_ATTR};
use crate::retry::{Attempt, RetryError, RetryPolicy};
use crate::spec::ResourceSpec;
use std::sync::Arc;
use tracing::info;

/// Principal discovered on a connection resource once the control plane
/// has propagated it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
    pub principal: String,
}

/// Terminal outcomes of an attribute wait.
#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    /// The poll budget ran out with the attribute still absent.
    /// Degraded, not fatal: the caller reports it and continues.
    #[error("attribute still absent after {attempts} polls")]
    Exhausted { attempts: u32 },

    /// A permanent describe failure; polling further cannot help.
    #[error("{0}")]
    Fatal(GatewayError),

    #[error("run cancelled")]
    Cancelled,
}

enum WaitAbort {
    Cancelled,
    Fatal(GatewayError),
}

/// Polls a resource until a derived attribute becomes observable.
pub struct PropagationWaiter<G> {
    gateway: Arc<G>,
    policy: RetryPolicy,
    cancel: CancelFlag,
}

impl<G: ProviderGateway> PropagationWaiter<G> {
    pub fn new(gateway: Arc<G>, policy: RetryPolicy, cancel: CancelFlag) -> Self {
        Self {
            gateway,
            policy,
            cancel,
        }
    }

    /// Poll `describe` until `extract` yields a value.
    ///
    /// Invokes `describe` at most `policy.max_attempts` times, sleeping
    /// the policy interval between polls. Transient describe failures
    /// consume an attempt like an absent attribute does.
    pub async fn await_attribute<T, F>(
        &self,
        spec: &ResourceSpec,
        extract: F,
    ) -> Result<T, WaitError>
    where
        F: Fn(&Attributes) -> Option<T>,
    {
        let gateway = &self.gateway;
        let cancel = &self.cancel;
        let extract = &extract;

        let outcome = self
            .policy
            .run(|attempt| async move {
                if cancel.is_cancelled() {
                    return Attempt::Fail(WaitAbort::Cancelled);
                }
                match gateway.describe(spec).await {
                    Ok(attributes) => match extract(&attributes) {
                        Some(value) => Attempt::Done(value),
                        None => {
                            info!(resource = %spec.id, attempt, "attribute not yet visible");
                            Attempt::Retry("attribute not yet visible".to_string())
                        }
                    },
                    Err(GatewayError::Transient(reason)) => {
                        info!(resource = %spec.id, attempt, "describe failed: {reason}");
                        Attempt::Retry(reason)
                    }
                    Err(error @ GatewayError::Permanent(_)) => {
                        Attempt::Fail(WaitAbort::Fatal(error))
                    }
                }
            })
            .await;

        match outcome {
            Ok(value) => Ok(value),
            Err(RetryError::Fatal(WaitAbort::Cancelled)) => Err(WaitError::Cancelled),
            Err(RetryError::Fatal(WaitAbort::Fatal(error))) => Err(WaitError::Fatal(error)),
            Err(RetryError::Exhausted { attempts, .. }) => Err(WaitError::Exhausted { attempts }),
        }
    }

    /// Wait for the connection's service identity to propagate.
    pub async fn await_service_identity(
        &self,
        spec: &ResourceSpec,
    ) -> Result<ServiceIdentity, WaitError> {
        let identity = self
            .await_attribute(spec, |attributes| {
                attributes
                    .get(SERVICE_IDENTITY_ATTR)
                    .filter(|principal| !principal.is_empty())
                    .map(|principal| ServiceIdentity {
                        principal: principal.to_string(),
                    })
            })
            .await?;
        info!(resource = %spec.id, principal = %identity.principal, "service identity resolved");
        Ok(identity)
    }
}
