//! AI function boundary
//!
//! The hosted model functions the demo invokes once the environment is
//! provisioned. Their prompts, model choice, and response quality are
//! opaque here; the flow's only obligation toward them is that the
//! dataset, connection, and model resources they rely on exist first.

use crate::error::GatewayError;
use crate::spec::{ResourceId, TableSchema};
use serde::Serialize;

/// Row set produced by a tabular generation call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GeneratedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// Hosted model invocations, routed through provisioned resources.
#[async_trait::async_trait]
pub trait InsightFunctions: Send + Sync {
    /// Free-text generation through the model resource.
    async fn generate_text(
        &self,
        model: &ResourceId,
        prompt: &str,
    ) -> Result<String, GatewayError>;

    /// Numeric estimation through the connection.
    async fn generate_scalar(
        &self,
        connection: &ResourceId,
        prompt: &str,
    ) -> Result<f64, GatewayError>;

    /// Tabular generation through the model resource, shaped by an
    /// output schema.
    async fn generate_table(
        &self,
        model: &ResourceId,
        prompt: &str,
        output_schema: &TableSchema,
    ) -> Result<GeneratedTable, GatewayError>;
}
