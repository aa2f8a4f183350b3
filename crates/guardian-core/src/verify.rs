//! Post-provisioning verification
//!
//! Re-describes each critical resource independently of the
//! provisioning path, so drift and silent failures are caught even when
//! every create call reported success. Each failure carries a
//! remediation class: transient findings mean "run it again", permanent
//! findings mean the console.

use crate::error::GatewayError;
use crate::gateway::ProviderGateway;
use crate::spec::{ResourceId, ResourceSpec};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Health of one re-checked resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CheckStatus {
    Ok,
    Failed,
}

/// One verification finding, computed fresh at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationRecord {
    pub id: ResourceId,
    pub status: CheckStatus,
    pub detail: Option<String>,
}

/// What the operator should do about a failed check. The two classes
/// demand different responses, so the distinction is preserved all the
/// way into the rendered report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Remediation {
    /// The failure looked transient; a fresh run should recover it.
    RerunSetup,
    /// Definition or authorization problem; re-running alone will not
    /// recover it.
    ManualConsoleAction,
}

impl Remediation {
    #[must_use]
    pub fn advice(self) -> &'static str {
        match self {
            Self::RerunSetup => "re-run the setup; the failure looked transient",
            Self::ManualConsoleAction => {
                "fix the resource in the provider console; re-running alone will not recover it"
            }
        }
    }
}

/// Remediation hint attached to a failed check.
#[derive(Debug, Clone, Serialize)]
pub struct RemediationHint {
    pub id: ResourceId,
    pub remediation: Remediation,
    pub note: String,
}

/// Aggregated verification outcome with an overall pass/fail.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationSummary {
    pub records: Vec<VerificationRecord>,
    pub passed: bool,
    pub hints: Vec<RemediationHint>,
}

impl VerificationSummary {
    /// Render the operator-facing verification section.
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut text = String::new();
        for record in &self.records {
            match record.status {
                CheckStatus::Ok => text.push_str(&format!("  {} .. OK\n", record.id)),
                CheckStatus::Failed => {
                    let detail = record.detail.as_deref().unwrap_or("no detail");
                    text.push_str(&format!("  {} .. FAILED ({detail})\n", record.id));
                }
            }
        }
        if !self.hints.is_empty() {
            text.push_str("\nRemediation:\n");
            for hint in &self.hints {
                text.push_str(&format!(
                    "  {}: {} — {}\n",
                    hint.id,
                    hint.remediation.advice(),
                    hint.note
                ));
            }
        }
        text.push_str(&format!(
            "\nVerification: {}\n",
            if self.passed { "PASS" } else { "FAIL" }
        ));
        text
    }
}

/// Re-queries critical resources and produces the final summary.
pub struct VerificationReporter<G> {
    gateway: Arc<G>,
}

impl<G: ProviderGateway> VerificationReporter<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    /// Describe each resource once, independently; a failure on one
    /// check never prevents the others from running.
    pub async fn verify(&self, specs: &[&ResourceSpec]) -> VerificationSummary {
        let mut records = Vec::with_capacity(specs.len());
        let mut hints = Vec::new();

        for spec in specs {
            match self.gateway.describe(spec).await {
                Ok(_) => {
                    info!(resource = %spec.id, "verified");
                    records.push(VerificationRecord {
                        id: spec.id.clone(),
                        status: CheckStatus::Ok,
                        detail: None,
                    });
                }
                Err(error) => {
                    warn!(resource = %spec.id, class = error.class(), "verification failed: {error}");
                    let remediation = match &error {
                        GatewayError::Transient(_) => Remediation::RerunSetup,
                        GatewayError::Permanent(_) => Remediation::ManualConsoleAction,
                    };
                    hints.push(RemediationHint {
                        id: spec.id.clone(),
                        remediation,
                        note: error.to_string(),
                    });
                    records.push(VerificationRecord {
                        id: spec.id.clone(),
                        status: CheckStatus::Failed,
                        detail: Some(error.to_string()),
                    });
                }
            }
        }

        let passed = records.iter().all(|r| r.status == CheckStatus::Ok);
        VerificationSummary {
            records,
            passed,
            hints,
        }
    }
}
