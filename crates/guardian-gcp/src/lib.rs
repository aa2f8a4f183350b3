//! Hosted control-plane bindings for Clinical Guardian
//!
//! Switchable backend crate: the provisioning core only sees the
//! gateway and AI-function traits, this crate supplies the REST-backed
//! implementations plus the `guardian-setup` CLI.

pub mod control_plane;
pub mod insights;

pub use control_plane::GcpControlPlane;
pub use insights::SqlInsightFunctions;
