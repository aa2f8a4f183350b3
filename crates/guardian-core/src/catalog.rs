//! The Clinical Guardian resource catalog
//!
//! Builds the fixed resource set the demo runs on: the warehouse
//! dataset, the document bucket, the connection that authorizes remote
//! model calls, the safety-alert tables the loader populates, the
//! object table over the document corpus, and the remote risk model.
//!
//! Table schemas mirror what the data loader writes; column names and
//! types must stay stable between a provisioning run and a loading run.

use crate::config::DeploymentConfig;
use crate::error::PlanError;
use crate::spec::{
    FieldType, ResourceDefinition, ResourceId, ResourceSpec, SetupPlan, TableField, TableSchema,
};

/// Build the demo plan for a deployment.
///
/// # Errors
/// Propagates plan validation, which cannot fail for this fixed catalog
/// unless the configuration produces colliding resource names.
pub fn clinical_guardian(config: &DeploymentConfig) -> Result<SetupPlan, PlanError> {
    let dataset_id = ResourceId::new(format!("dataset/{}", config.dataset));
    let bucket_id = ResourceId::new(format!("bucket/{}", config.bucket));
    let connection_id = ResourceId::new(format!("connection/{}", config.connection));

    let dataset = ResourceSpec::new(
        dataset_id.clone(),
        ResourceDefinition::Dataset {
            dataset: config.dataset.clone(),
            location: config.location.clone(),
            description: Some("Clinical Guardian safety-alert intelligence".to_string()),
        },
    );

    let bucket = ResourceSpec::new(
        bucket_id.clone(),
        ResourceDefinition::Bucket {
            bucket: config.bucket.clone(),
            location: config.location.clone(),
            storage_class: "STANDARD".to_string(),
        },
    );

    let connection = ResourceSpec::new(
        connection_id.clone(),
        ResourceDefinition::Connection {
            connection: config.connection.clone(),
            location: config.location.clone(),
        },
    );

    let ground_truth = table_spec(
        config,
        "ground_truth_master",
        ground_truth_schema(),
        &dataset_id,
    );
    let adverse_events = table_spec(
        config,
        "fda_adverse_events",
        adverse_events_schema(),
        &dataset_id,
    );
    let recalls = table_spec(config, "fda_recalls", recalls_schema(), &dataset_id);

    let corpus = ResourceSpec::new(
        format!("table/{}.document_corpus", config.dataset),
        ResourceDefinition::ExternalTable {
            dataset: config.dataset.clone(),
            table: "document_corpus".to_string(),
            connection: config.connection.clone(),
            source_uris: vec![format!("gs://{}/clinical_document_corpus/*", config.bucket)],
        },
    )
    .with_dependency(dataset_id.clone())
    .with_dependency(bucket_id)
    .with_dependency(connection_id.clone());

    let model = ResourceSpec::new(
        format!("model/{}.risk_generator", config.dataset),
        ResourceDefinition::Model {
            dataset: config.dataset.clone(),
            model: "risk_generator".to_string(),
            connection: config.connection.clone(),
            endpoint: config.model_endpoint.clone(),
        },
    )
    .with_dependency(dataset_id)
    .with_dependency(connection_id);

    SetupPlan::new(vec![
        dataset,
        bucket,
        connection,
        ground_truth,
        adverse_events,
        recalls,
        corpus,
        model,
    ])
}

fn table_spec(
    config: &DeploymentConfig,
    table: &str,
    schema: TableSchema,
    dataset_id: &ResourceId,
) -> ResourceSpec {
    ResourceSpec::new(
        format!("table/{}.{}", config.dataset, table),
        ResourceDefinition::Table {
            dataset: config.dataset.clone(),
            table: table.to_string(),
            schema,
        },
    )
    .with_dependency(dataset_id.clone())
}

fn ground_truth_schema() -> TableSchema {
    let mut fields: Vec<TableField> = [
        "id",
        "drug_name",
        "device_name",
        "condition",
        "old_dosage",
        "new_dosage",
        "old_warning",
        "new_warning",
        "old_indication",
        "new_indication",
        "recall_reason",
        "risk_level",
        "source_url",
        "ndc_code",
        "clinical_trial_id",
        "patient_population",
        "contraindications",
        "adverse_events",
        "mechanism_of_action",
        "therapeutic_class",
        "manufacturer",
        "regulatory_status",
        "clinical_significance",
        "patient_safety_impact",
        "recall_class",
        "trial_phase",
        "study_status",
    ]
    .into_iter()
    .map(|name| TableField::new(name, FieldType::String))
    .collect();
    fields.push(TableField::new("fda_approval_date", FieldType::Date));
    fields.push(TableField::new("update_date", FieldType::Date));
    fields.push(TableField::new("compliance_deadline", FieldType::Date));
    fields.push(TableField::new("adverse_event_count", FieldType::Int64));
    fields.push(TableField::new("created_at", FieldType::Timestamp));
    TableSchema::new(fields)
}

fn adverse_events_schema() -> TableSchema {
    let fields = [
        "safetyreportid",
        "receivedate",
        "serious",
        "reporttype",
        "fulfillexpeditecriteria",
        "occurcountry",
        "reporter_qualification",
        "patientonsetage",
        "patientsex",
        "medicinalproduct",
        "brand_name",
        "manufacturer_name",
        "drugcharacterization",
        "action_taken_with_drug",
        "drugindication",
        "drugdosagetext",
        "reactions",
        "reaction_outcomes",
        "source_file",
    ]
    .into_iter()
    .map(|name| TableField::new(name, FieldType::String))
    .collect();
    TableSchema::new(fields)
}

fn recalls_schema() -> TableSchema {
    let mut fields: Vec<TableField> = [
        "recall_number",
        "product_description",
        "reason_for_recall",
        "classification",
        "status",
    ]
    .into_iter()
    .map(|name| TableField::new(name, FieldType::String))
    .collect();
    fields.push(TableField::new("recall_initiation_date", FieldType::Date));
    fields.push(TableField::new("processed_at", FieldType::Timestamp));
    TableSchema::new(fields)
}
