//! REST bindings for the managed control plane
//!
//! Implements the gateway seam over the provider's public HTTP surface:
//! warehouse datasets/tables/models, storage buckets, connections, and
//! project IAM policy. The interesting part is failure classification —
//! 409 means "already exists" (success), 408/429/5xx are transient,
//! every other client error is permanent.

use guardian_core::error::GatewayError;
use guardian_core::gateway::{
    Attributes, CreateOutcome, ProviderGateway, SERVICE_IDENTITY_ATTR,
};
use guardian_core::spec::{ResourceDefinition, ResourceSpec, TableSchema};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Per-call ceiling; a timed-out call surfaces as a transient failure
/// the retry policy can absorb.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) const BIGQUERY_V2: &str = "https://bigquery.googleapis.com/bigquery/v2";
const STORAGE_V1: &str = "https://storage.googleapis.com/storage/v1";
const CONNECTION_V1: &str = "https://bigqueryconnection.googleapis.com/v1";
const RESOURCE_MANAGER_V1: &str = "https://cloudresourcemanager.googleapis.com/v1";

/// Gateway backed by the provider's REST control plane.
pub struct GcpControlPlane {
    http: reqwest::Client,
    project: String,
    token: String,
}

impl GcpControlPlane {
    /// Bindings for a project, authorized by a bearer token the
    /// operator supplies for the session. The token is never persisted.
    #[must_use]
    pub fn new(project: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            project: project.into(),
            token: token.into(),
        }
    }

    fn resource_url(&self, spec: &ResourceSpec) -> String {
        match &spec.definition {
            ResourceDefinition::Dataset { dataset, .. } => {
                format!("{BIGQUERY_V2}/projects/{}/datasets/{dataset}", self.project)
            }
            ResourceDefinition::Table { dataset, table, .. }
            | ResourceDefinition::ExternalTable { dataset, table, .. } => format!(
                "{BIGQUERY_V2}/projects/{}/datasets/{dataset}/tables/{table}",
                self.project
            ),
            ResourceDefinition::Bucket { bucket, .. } => format!("{STORAGE_V1}/b/{bucket}"),
            ResourceDefinition::Connection {
                connection,
                location,
            } => format!(
                "{CONNECTION_V1}/projects/{}/locations/{location}/connections/{connection}",
                self.project
            ),
            ResourceDefinition::Model { dataset, model, .. } => format!(
                "{BIGQUERY_V2}/projects/{}/datasets/{dataset}/models/{model}",
                self.project
            ),
        }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, GatewayError> {
        self.http
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transport_error)
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<reqwest::Response, GatewayError> {
        self.http
            .post(url)
            .timeout(REQUEST_TIMEOUT)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(transport_error)
    }

    async fn read_error(response: reqwest::Response) -> GatewayError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        classify_status(status, &body)
    }
}

#[async_trait::async_trait]
impl ProviderGateway for GcpControlPlane {
    async fn exists(&self, spec: &ResourceSpec) -> Result<bool, GatewayError> {
        let url = self.resource_url(spec);
        debug!(resource = %spec.id, url, "existence check");
        let response = self.get(&url).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if response.status().is_success() {
            return Ok(true);
        }
        Err(Self::read_error(response).await)
    }

    async fn create(&self, spec: &ResourceSpec) -> Result<CreateOutcome, GatewayError> {
        let (url, body) = create_request(&self.project, &spec.definition);
        debug!(resource = %spec.id, url, "create");
        let response = self.post_json(&url, &body).await?;
        if response.status() == reqwest::StatusCode::CONFLICT {
            return Ok(CreateOutcome::AlreadyExists);
        }
        if response.status().is_success() {
            return Ok(CreateOutcome::Created);
        }
        Err(Self::read_error(response).await)
    }

    async fn describe(&self, spec: &ResourceSpec) -> Result<Attributes, GatewayError> {
        let url = self.resource_url(spec);
        let response = self.get(&url).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::Transient(format!(
                "{} not visible yet",
                spec.id
            )));
        }
        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Transient(format!("malformed describe response: {e}")))?;
        Ok(attributes_from(&body))
    }

    async fn grant_role(&self, principal: &str, role: &str) -> Result<(), GatewayError> {
        let get_url = format!(
            "{RESOURCE_MANAGER_V1}/projects/{}:getIamPolicy",
            self.project
        );
        let response = self.post_json(&get_url, &json!({})).await?;
        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }
        let mut policy: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Transient(format!("malformed policy response: {e}")))?;

        let member = format!("serviceAccount:{principal}");
        if !merge_binding(&mut policy, role, &member)? {
            // Role already held; idempotent no-op.
            return Ok(());
        }

        let set_url = format!(
            "{RESOURCE_MANAGER_V1}/projects/{}:setIamPolicy",
            self.project
        );
        let response = self.post_json(&set_url, &json!({ "policy": policy })).await?;
        if response.status().is_success() {
            return Ok(());
        }
        Err(Self::read_error(response).await)
    }
}

pub(crate) fn transport_error(error: reqwest::Error) -> GatewayError {
    GatewayError::Transient(error.to_string())
}

/// Map an HTTP status to the gateway failure taxonomy.
pub(crate) fn classify_status(status: u16, body: &str) -> GatewayError {
    let detail = format!("HTTP {status}: {}", body.chars().take(200).collect::<String>());
    match status {
        408 | 429 => GatewayError::Transient(detail),
        s if s >= 500 => GatewayError::Transient(detail),
        _ => GatewayError::Permanent(detail),
    }
}

/// Build the create URL and body for a resource definition.
fn create_request(project: &str, definition: &ResourceDefinition) -> (String, Value) {
    match definition {
        ResourceDefinition::Dataset {
            dataset,
            location,
            description,
        } => (
            format!("{BIGQUERY_V2}/projects/{project}/datasets"),
            json!({
                "datasetReference": { "projectId": project, "datasetId": dataset },
                "location": location,
                "description": description,
            }),
        ),
        ResourceDefinition::Bucket {
            bucket,
            location,
            storage_class,
        } => (
            format!("{STORAGE_V1}/b?project={project}"),
            json!({
                "name": bucket,
                "location": location,
                "storageClass": storage_class,
            }),
        ),
        ResourceDefinition::Connection {
            connection,
            location,
        } => (
            format!(
                "{CONNECTION_V1}/projects/{project}/locations/{location}/connections\
                 ?connectionId={connection}"
            ),
            json!({ "cloudResource": {} }),
        ),
        ResourceDefinition::Table {
            dataset,
            table,
            schema,
        } => (
            format!("{BIGQUERY_V2}/projects/{project}/datasets/{dataset}/tables"),
            json!({
                "tableReference": {
                    "projectId": project,
                    "datasetId": dataset,
                    "tableId": table,
                },
                "schema": { "fields": schema_fields(schema) },
            }),
        ),
        ResourceDefinition::ExternalTable {
            dataset,
            table,
            connection,
            source_uris,
        } => (
            format!("{BIGQUERY_V2}/projects/{project}/datasets/{dataset}/tables"),
            json!({
                "tableReference": {
                    "projectId": project,
                    "datasetId": dataset,
                    "tableId": table,
                },
                "externalDataConfiguration": {
                    "sourceUris": source_uris,
                    "connectionId": connection,
                    "objectMetadata": "SIMPLE",
                },
            }),
        ),
        ResourceDefinition::Model {
            dataset,
            model,
            connection,
            endpoint,
        } => (
            format!("{BIGQUERY_V2}/projects/{project}/queries"),
            json!({
                "query": remote_model_query(dataset, model, connection, endpoint),
                "useLegacySql": false,
            }),
        ),
    }
}

fn schema_fields(schema: &TableSchema) -> Vec<Value> {
    schema
        .fields
        .iter()
        .map(|f| json!({ "name": f.name, "type": f.field_type.as_str() }))
        .collect()
}

/// Remote model DDL. `IF NOT EXISTS` keeps the statement idempotent
/// even when it races the existence check.
fn remote_model_query(dataset: &str, model: &str, connection: &str, endpoint: &str) -> String {
    format!(
        "CREATE MODEL IF NOT EXISTS `{dataset}.{model}` \
         REMOTE WITH CONNECTION `{connection}` \
         OPTIONS (ENDPOINT = '{endpoint}')"
    )
}

/// Flatten the describe response into the attribute bag the core
/// understands. A connection's service account surfaces under the
/// shared identity key.
fn attributes_from(body: &Value) -> Attributes {
    let mut attributes = Attributes::new();
    for key in ["etag", "location", "state", "creationTime"] {
        if let Some(value) = body.get(key).and_then(Value::as_str) {
            attributes.set(key, value);
        }
    }
    if let Some(identity) = body
        .pointer("/cloudResource/serviceAccountId")
        .and_then(Value::as_str)
    {
        attributes.set(SERVICE_IDENTITY_ATTR, identity);
    }
    attributes
}

/// Add `member` to the policy binding for `role`.
///
/// Returns `Ok(false)` when the member already holds the role, so the
/// caller can skip the write entirely.
fn merge_binding(policy: &mut Value, role: &str, member: &str) -> Result<bool, GatewayError> {
    let malformed = || GatewayError::Transient("malformed IAM policy response".to_string());

    let bindings = policy
        .as_object_mut()
        .ok_or_else(malformed)?
        .entry("bindings")
        .or_insert_with(|| json!([]));
    let bindings = bindings.as_array_mut().ok_or_else(malformed)?;

    for binding in bindings.iter_mut() {
        if binding.get("role").and_then(Value::as_str) == Some(role) {
            let members = binding
                .as_object_mut()
                .ok_or_else(malformed)?
                .entry("members")
                .or_insert_with(|| json!([]));
            let members = members.as_array_mut().ok_or_else(malformed)?;
            if members.iter().any(|m| m.as_str() == Some(member)) {
                return Ok(false);
            }
            members.push(json!(member));
            return Ok(true);
        }
    }

    bindings.push(json!({ "role": role, "members": [member] }));
    Ok(true)
}
