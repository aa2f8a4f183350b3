//! Run report
//!
//! The report is the sole externally observable output of a run: one
//! outcome per resource, the identity resolution, grant outcomes, the
//! verification summary, and accumulated warnings. It is a first-class
//! value (serializable, renderable) rather than printed text, so tests
//! can assert on it directly.

use crate::grants::GrantOutcome;
use crate::spec::ResourceId;
use crate::verify::VerificationSummary;
use serde::Serialize;

/// Final state of one resource within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ProvisionOutcome {
    Created,
    AlreadyExists,
    Failed { reason: String },
}

impl ProvisionOutcome {
    #[inline]
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Created and already-exists both count as success.
    #[inline]
    #[must_use]
    pub fn succeeded(&self) -> bool {
        !self.is_failed()
    }
}

/// Per-resource provisioning record, produced once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisioningResult {
    pub id: ResourceId,
    pub outcome: ProvisionOutcome,
}

/// How the connection's service identity resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum IdentityResolution {
    Resolved { principal: String },
    /// The poll budget ran out before the identity became visible.
    /// Degraded but recoverable: roles must be bound by hand.
    Exhausted { attempts: u32 },
    /// The identity lookup failed outright.
    Failed { reason: String },
}

impl IdentityResolution {
    #[must_use]
    pub fn principal(&self) -> Option<&str> {
        match self {
            Self::Resolved { principal } => Some(principal),
            _ => None,
        }
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    /// Every resource realized, identity resolved, grants applied,
    /// verification passed.
    Complete,
    /// Everything critical exists, but something needs operator
    /// attention (identity wait exhausted, grant failure, or a
    /// verification finding).
    CompleteWithWarnings,
    /// A permanent provisioning failure or cancellation stopped the run
    /// before verification.
    Aborted,
}

/// Structured summary of one provisioning run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub results: Vec<ProvisioningResult>,
    pub identity: Option<IdentityResolution>,
    pub grants: Vec<GrantOutcome>,
    pub verification: Option<VerificationSummary>,
    pub warnings: Vec<String>,
}

impl RunReport {
    /// Process exit code for the CLI: only an aborted run is non-zero.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.status {
            RunStatus::Complete | RunStatus::CompleteWithWarnings => 0,
            RunStatus::Aborted => 1,
        }
    }

    /// Render the operator-facing text report.
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut text = String::new();
        text.push_str("=== Clinical Guardian Setup Report ===\n\n");

        text.push_str("Resources:\n");
        for result in &self.results {
            match &result.outcome {
                ProvisionOutcome::Created => {
                    text.push_str(&format!("  {} .. created\n", result.id));
                }
                ProvisionOutcome::AlreadyExists => {
                    text.push_str(&format!("  {} .. already exists\n", result.id));
                }
                ProvisionOutcome::Failed { reason } => {
                    text.push_str(&format!("  {} .. FAILED ({reason})\n", result.id));
                }
            }
        }

        match &self.identity {
            Some(IdentityResolution::Resolved { principal }) => {
                text.push_str(&format!("\nService identity: {principal}\n"));
            }
            Some(IdentityResolution::Exhausted { attempts }) => {
                text.push_str(&format!(
                    "\nService identity: not visible after {attempts} polls\n"
                ));
            }
            Some(IdentityResolution::Failed { reason }) => {
                text.push_str(&format!("\nService identity: lookup failed ({reason})\n"));
            }
            None => {}
        }

        if !self.grants.is_empty() {
            text.push_str("\nRole grants:\n");
            for grant in &self.grants {
                if grant.granted {
                    text.push_str(&format!("  {} .. granted\n", grant.role));
                } else {
                    let detail = grant.detail.as_deref().unwrap_or("no detail");
                    text.push_str(&format!("  {} .. FAILED ({detail})\n", grant.role));
                }
            }
        }

        if let Some(verification) = &self.verification {
            text.push_str("\nVerification:\n");
            text.push_str(&verification.generate_text());
        }

        if !self.warnings.is_empty() {
            text.push_str("\nWarnings:\n");
            for warning in &self.warnings {
                text.push_str(&format!("  - {warning}\n"));
            }
        }

        let status = match self.status {
            RunStatus::Complete => "COMPLETE",
            RunStatus::CompleteWithWarnings => "COMPLETE WITH WARNINGS",
            RunStatus::Aborted => "ABORTED",
        };
        text.push_str(&format!("\n=== Result: {status} ===\n"));
        text
    }
}
