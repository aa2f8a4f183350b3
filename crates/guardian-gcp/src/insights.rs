//! SQL-routed AI functions
//!
//! Implements the hosted model boundary by submitting warehouse SQL
//! against the resources the setup flow provisioned: text and tabular
//! generation through the remote model, numeric estimation through the
//! connection. Prompts travel as named query parameters, never spliced
//! into the SQL.

use crate::control_plane::{classify_status, transport_error, BIGQUERY_V2};
use guardian_core::config::DeploymentConfig;
use guardian_core::error::GatewayError;
use guardian_core::functions::{GeneratedTable, InsightFunctions};
use guardian_core::spec::{ResourceId, TableSchema};
use serde_json::{json, Value};
use std::time::Duration;

/// Model-backed queries run longer than control-plane calls.
const QUERY_TIMEOUT: Duration = Duration::from_secs(120);

/// AI function boundary backed by the warehouse query surface.
pub struct SqlInsightFunctions {
    http: reqwest::Client,
    project: String,
    location: String,
    endpoint: String,
    token: String,
}

impl SqlInsightFunctions {
    #[must_use]
    pub fn new(config: &DeploymentConfig, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            project: config.project.clone(),
            location: config.location.clone(),
            endpoint: config.model_endpoint.clone(),
            token: token.into(),
        }
    }

    async fn run_query(&self, sql: &str, prompt: &str) -> Result<Value, GatewayError> {
        let url = format!("{BIGQUERY_V2}/projects/{}/queries", self.project);
        let body = json!({
            "query": sql,
            "useLegacySql": false,
            "location": self.location,
            "parameterMode": "NAMED",
            "queryParameters": [{
                "name": "prompt",
                "parameterType": { "type": "STRING" },
                "parameterValue": { "value": prompt },
            }],
        });
        let response = self
            .http
            .post(&url)
            .timeout(QUERY_TIMEOUT)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }
        response
            .json()
            .await
            .map_err(|e| GatewayError::Transient(format!("malformed query response: {e}")))
    }
}

#[async_trait::async_trait]
impl InsightFunctions for SqlInsightFunctions {
    async fn generate_text(
        &self,
        model: &ResourceId,
        prompt: &str,
    ) -> Result<String, GatewayError> {
        let sql = text_query(&model_path(model)?);
        let body = self.run_query(&sql, prompt).await?;
        first_cell(&body)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| GatewayError::Transient("model returned no text".to_string()))
    }

    async fn generate_scalar(
        &self,
        connection: &ResourceId,
        prompt: &str,
    ) -> Result<f64, GatewayError> {
        let connection = connection_path(connection, &self.location)?;
        let sql = scalar_query(&connection, &self.endpoint);
        let body = self.run_query(&sql, prompt).await?;
        first_cell(&body)
            .and_then(cell_as_f64)
            .ok_or_else(|| GatewayError::Transient("model returned no number".to_string()))
    }

    async fn generate_table(
        &self,
        model: &ResourceId,
        prompt: &str,
        output_schema: &TableSchema,
    ) -> Result<GeneratedTable, GatewayError> {
        let sql = table_query(&model_path(model)?, output_schema);
        let body = self.run_query(&sql, prompt).await?;
        Ok(flatten_rows(&body))
    }
}

/// `model/{dataset}.{model}` → `` `dataset.model` `` path.
fn model_path(id: &ResourceId) -> Result<String, GatewayError> {
    id.as_str()
        .strip_prefix("model/")
        .map(str::to_string)
        .ok_or_else(|| GatewayError::Permanent(format!("{id} is not a model resource")))
}

/// `connection/{name}` → `location.name` connection path.
fn connection_path(id: &ResourceId, location: &str) -> Result<String, GatewayError> {
    id.as_str()
        .strip_prefix("connection/")
        .map(|name| format!("{location}.{name}"))
        .ok_or_else(|| GatewayError::Permanent(format!("{id} is not a connection resource")))
}

fn text_query(model: &str) -> String {
    format!(
        "SELECT ml_generate_text_llm_result AS result \
         FROM ML.GENERATE_TEXT(MODEL `{model}`, \
         (SELECT @prompt AS prompt), STRUCT(TRUE AS flatten_json_output))"
    )
}

fn scalar_query(connection: &str, endpoint: &str) -> String {
    format!(
        "SELECT AI.GENERATE_DOUBLE(prompt => @prompt, \
         connection_id => '{connection}', endpoint => '{endpoint}').result AS result"
    )
}

fn table_query(model: &str, schema: &TableSchema) -> String {
    let output_schema = schema
        .fields
        .iter()
        .map(|f| format!("{} {}", f.name, f.field_type.as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT * FROM AI.GENERATE_TABLE(MODEL `{model}`, \
         (SELECT @prompt AS prompt), STRUCT('{output_schema}' AS output_schema))"
    )
}

fn first_cell(body: &Value) -> Option<&Value> {
    body.pointer("/rows/0/f/0/v")
}

/// The warehouse encodes numbers as strings in query responses.
fn cell_as_f64(cell: &Value) -> Option<f64> {
    match cell {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn flatten_rows(body: &Value) -> GeneratedTable {
    let columns = body
        .pointer("/schema/fields")
        .and_then(Value::as_array)
        .map(|fields| {
            fields
                .iter()
                .filter_map(|f| f.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let rows = body
        .get("rows")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .map(|row| {
                    row.get("f")
                        .and_then(Value::as_array)
                        .map(|cells| {
                            cells
                                .iter()
                                .map(|cell| cell.get("v").cloned().unwrap_or(Value::Null))
                                .collect()
                        })
                        .unwrap_or_default()
                })
                .collect()
        })
        .unwrap_or_default();

    GeneratedTable { columns, rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guardian_core::spec::{FieldType, TableField};

    #[test]
    fn queries_reference_provisioned_resources() {
        let text = text_query("clinical_guardian.risk_generator");
        assert!(text.contains("MODEL `clinical_guardian.risk_generator`"));
        assert!(text.contains("@prompt"));

        let scalar = scalar_query("us-central1.vertex-ai", "gemini-2.0-flash");
        assert!(scalar.contains("connection_id => 'us-central1.vertex-ai'"));
        assert!(scalar.contains("endpoint => 'gemini-2.0-flash'"));
    }

    #[test]
    fn table_query_serializes_output_schema() {
        let schema = TableSchema::new(vec![
            TableField::new("drug_name", FieldType::String),
            TableField::new("risk_score", FieldType::Float64),
        ]);
        let sql = table_query("d.m", &schema);
        assert!(sql.contains("'drug_name STRING, risk_score FLOAT64' AS output_schema"));
    }

    #[test]
    fn resource_id_paths() {
        let model = ResourceId::new("model/clinical_guardian.risk_generator");
        assert_eq!(
            model_path(&model).unwrap(),
            "clinical_guardian.risk_generator"
        );
        assert!(model_path(&ResourceId::new("dataset/x")).is_err());

        let conn = ResourceId::new("connection/vertex-ai");
        assert_eq!(
            connection_path(&conn, "us-central1").unwrap(),
            "us-central1.vertex-ai"
        );
    }

    #[test]
    fn flattens_query_rows() {
        let body = json!({
            "schema": { "fields": [ { "name": "drug_name" }, { "name": "risk_score" } ] },
            "rows": [
                { "f": [ { "v": "warfarin" }, { "v": "0.82" } ] },
                { "f": [ { "v": "metformin" }, { "v": "0.12" } ] }
            ]
        });
        let table = flatten_rows(&body);
        assert_eq!(table.columns, vec!["drug_name", "risk_score"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][0], Value::String("warfarin".into()));

        assert_eq!(cell_as_f64(&Value::String("0.82".into())), Some(0.82));
    }
}
