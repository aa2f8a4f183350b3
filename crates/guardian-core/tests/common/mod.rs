#![allow(dead_code)]

//! Spec helpers shared by the integration suites.

use guardian_core::spec::{
    FieldType, ResourceDefinition, ResourceSpec, SetupPlan, TableField, TableSchema,
};

pub fn dataset(id: &str, name: &str) -> ResourceSpec {
    ResourceSpec::new(
        id,
        ResourceDefinition::Dataset {
            dataset: name.to_string(),
            location: "us-central1".to_string(),
            description: None,
        },
    )
}

pub fn bucket(id: &str, name: &str) -> ResourceSpec {
    ResourceSpec::new(
        id,
        ResourceDefinition::Bucket {
            bucket: name.to_string(),
            location: "us-central1".to_string(),
            storage_class: "STANDARD".to_string(),
        },
    )
}

pub fn connection(id: &str, name: &str) -> ResourceSpec {
    ResourceSpec::new(
        id,
        ResourceDefinition::Connection {
            connection: name.to_string(),
            location: "us-central1".to_string(),
        },
    )
}

pub fn table(id: &str, name: &str) -> ResourceSpec {
    ResourceSpec::new(
        id,
        ResourceDefinition::Table {
            dataset: "demo".to_string(),
            table: name.to_string(),
            schema: TableSchema::new(vec![TableField::new("id", FieldType::String)]),
        },
    )
}

pub fn model(id: &str, name: &str) -> ResourceSpec {
    ResourceSpec::new(
        id,
        ResourceDefinition::Model {
            dataset: "demo".to_string(),
            model: name.to_string(),
            connection: "conn".to_string(),
            endpoint: "gemini-2.0-flash".to_string(),
        },
    )
}

/// Four-resource plan: dataset D, connection C, table T (depends on D),
/// model M (depends on C).
pub fn scenario_plan() -> SetupPlan {
    SetupPlan::new(vec![
        dataset("dataset/d", "demo"),
        connection("connection/c", "conn"),
        table("table/t", "events").with_dependency("dataset/d"),
        model("model/m", "risk").with_dependency("connection/c"),
    ])
    .unwrap()
}
