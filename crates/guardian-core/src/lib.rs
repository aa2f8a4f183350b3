//! Clinical Guardian provisioning core
//!
//! Declarative, idempotent, retry-aware realization of the demo's cloud
//! environment: dataset → bucket → connection → service identity →
//! role grants → tables → model, followed by an independent
//! verification pass.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use guardian_core::prelude::*;
//!
//! let config = DeploymentConfig::new("my-project");
//! let plan = catalog::clinical_guardian(&config)?;
//!
//! let flow = SetupFlow::new(gateway, config);
//! let report = flow.run(&plan).await;
//! println!("{}", report.generate_text());
//! ```
//!
//! The remote control plane is reached only through the
//! [`gateway::ProviderGateway`] trait; swap in a fake to test the whole
//! flow deterministically.

pub mod cancel;
pub mod catalog;
pub mod config;
pub mod error;
pub mod flow;
pub mod functions;
pub mod gateway;
pub mod grants;
pub mod provisioner;
pub mod report;
pub mod retry;
pub mod spec;
pub mod verify;
pub mod waiter;

/// Commonly used types for driving a setup run.
pub mod prelude {
    pub use crate::cancel::CancelFlag;
    pub use crate::config::DeploymentConfig;
    pub use crate::error::{GatewayError, PlanError, SetupError};
    pub use crate::flow::SetupFlow;
    pub use crate::gateway::{Attributes, CreateOutcome, ProviderGateway};
    pub use crate::grants::{GrantOutcome, PermissionGranter};
    pub use crate::provisioner::Provisioner;
    pub use crate::report::{
        IdentityResolution, ProvisionOutcome, ProvisioningResult, RunReport, RunStatus,
    };
    pub use crate::retry::{Attempt, Backoff, RetryError, RetryPolicy};
    pub use crate::spec::{
        ResourceDefinition, ResourceId, ResourceKind, ResourceSpec, SetupPlan,
    };
    pub use crate::verify::{VerificationReporter, VerificationSummary};
    pub use crate::waiter::{PropagationWaiter, ServiceIdentity, WaitError};
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
