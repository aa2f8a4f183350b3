//! Resource specifications and the validated setup plan
//!
//! Every cloud object the flow manages is described up front by an
//! immutable [`ResourceSpec`]. Specs are collected into a [`SetupPlan`],
//! which validates the dependency graph once (unique ids, known
//! dependencies, acyclic, creation order by kind) so that execution
//! never has to re-check structure.

use crate::error::PlanError;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Stable, human-readable identifier for a managed resource,
/// e.g. `dataset/clinical_guardian` or `table/clinical_guardian.fda_recalls`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(String);

impl ResourceId {
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ResourceId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// The kinds of managed resource the flow knows how to realize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Dataset,
    Bucket,
    Connection,
    Table,
    ExternalTable,
    Model,
}

impl ResourceKind {
    /// Creation tier. Base resources (0) are realized before tabular
    /// resources (1), which are realized before models (2). Dependencies
    /// must always point to a strictly lower tier.
    #[inline]
    #[must_use]
    pub fn tier(self) -> u8 {
        match self {
            Self::Dataset | Self::Bucket | Self::Connection => 0,
            Self::Table | Self::ExternalTable => 1,
            Self::Model => 2,
        }
    }

    /// Base resources are provisioned before the connection identity wait.
    #[inline]
    #[must_use]
    pub fn is_base(self) -> bool {
        self.tier() == 0
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dataset => "dataset",
            Self::Bucket => "bucket",
            Self::Connection => "connection",
            Self::Table => "table",
            Self::ExternalTable => "external table",
            Self::Model => "model",
        };
        write!(f, "{name}")
    }
}

/// Column type in a warehouse table schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    String,
    Int64,
    Float64,
    Bool,
    Date,
    Timestamp,
}

impl FieldType {
    /// Wire name used by the warehouse API.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Int64 => "INT64",
            Self::Float64 => "FLOAT64",
            Self::Bool => "BOOL",
            Self::Date => "DATE",
            Self::Timestamp => "TIMESTAMP",
        }
    }
}

/// A single column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableField {
    pub name: String,
    pub field_type: FieldType,
}

impl TableField {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// Ordered column list for a table resource.
///
/// The loader that populates these tables relies on column names and
/// types staying stable between a provisioning run and a loading run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableSchema {
    pub fields: Vec<TableField>,
}

impl TableSchema {
    #[must_use]
    pub fn new(fields: Vec<TableField>) -> Self {
        Self { fields }
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// Per-kind creation payload. Kinds are derived from the definition so a
/// spec can never claim one kind and carry another kind's payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceDefinition {
    Dataset {
        dataset: String,
        location: String,
        description: Option<String>,
    },
    Bucket {
        bucket: String,
        location: String,
        storage_class: String,
    },
    /// A warehouse connection through which remote model calls are
    /// authorized. Its service identity materializes asynchronously
    /// after creation.
    Connection {
        connection: String,
        location: String,
    },
    Table {
        dataset: String,
        table: String,
        schema: TableSchema,
    },
    /// Object table over bucket contents, read through a connection.
    ExternalTable {
        dataset: String,
        table: String,
        connection: String,
        source_uris: Vec<String>,
    },
    /// Remote model resource backed by a hosted endpoint, reached
    /// through a connection.
    Model {
        dataset: String,
        model: String,
        connection: String,
        endpoint: String,
    },
}

impl ResourceDefinition {
    /// The kind this definition realizes.
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Dataset { .. } => ResourceKind::Dataset,
            Self::Bucket { .. } => ResourceKind::Bucket,
            Self::Connection { .. } => ResourceKind::Connection,
            Self::Table { .. } => ResourceKind::Table,
            Self::ExternalTable { .. } => ResourceKind::ExternalTable,
            Self::Model { .. } => ResourceKind::Model,
        }
    }
}

/// Immutable description of one object to be created: identifier,
/// dependencies, and the per-kind creation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub id: ResourceId,
    pub depends_on: Vec<ResourceId>,
    pub definition: ResourceDefinition,
}

impl ResourceSpec {
    pub fn new(id: impl Into<ResourceId>, definition: ResourceDefinition) -> Self {
        Self {
            id: id.into(),
            depends_on: Vec::new(),
            definition,
        }
    }

    /// Add a creation-order dependency.
    #[must_use]
    pub fn with_dependency(mut self, id: impl Into<ResourceId>) -> Self {
        self.depends_on.push(id.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.definition.kind()
    }
}

/// A validated, deterministically ordered collection of resource specs.
///
/// Construction performs all structural checks; execution consumes the
/// plan in order without re-validating.
#[derive(Debug, Clone, Serialize)]
pub struct SetupPlan {
    specs: Vec<ResourceSpec>,
    base_len: usize,
}

impl SetupPlan {
    /// Validate and order a set of specs.
    ///
    /// # Errors
    /// Rejects duplicate ids, dependencies on unknown ids, dependency
    /// cycles, and dependencies that do not point to a strictly lower
    /// creation tier.
    pub fn new(specs: Vec<ResourceSpec>) -> Result<Self, PlanError> {
        let mut index: HashMap<&ResourceId, usize> = HashMap::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            if index.insert(&spec.id, i).is_some() {
                return Err(PlanError::DuplicateId(spec.id.clone()));
            }
        }

        let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
        for i in 0..specs.len() {
            graph.add_node(i);
        }
        for (i, spec) in specs.iter().enumerate() {
            for dep in &spec.depends_on {
                let Some(&j) = index.get(dep) else {
                    return Err(PlanError::UnknownDependency {
                        id: spec.id.clone(),
                        dependency: dep.clone(),
                    });
                };
                if j == i {
                    return Err(PlanError::CycleDetected(spec.id.clone()));
                }
                graph.add_edge(j, i, ());
            }
        }

        if let Err(cycle) = toposort(&graph, None) {
            return Err(PlanError::CycleDetected(specs[cycle.node_id()].id.clone()));
        }

        for spec in &specs {
            for dep in &spec.depends_on {
                let dep_spec = &specs[index[dep]];
                if dep_spec.kind().tier() >= spec.kind().tier() {
                    return Err(PlanError::TierInversion {
                        id: spec.id.clone(),
                        kind: spec.kind(),
                        dependency: dep_spec.id.clone(),
                        dependency_kind: dep_spec.kind(),
                    });
                }
            }
        }

        // (tier, declaration index) is a topological order: edges only
        // ever point from a lower tier to a higher one.
        let mut ordered = specs;
        let mut keyed: Vec<(u8, usize)> = ordered
            .iter()
            .enumerate()
            .map(|(i, s)| (s.kind().tier(), i))
            .collect();
        keyed.sort();
        let mut sorted = Vec::with_capacity(ordered.len());
        for &(_, i) in &keyed {
            sorted.push(ordered[i].clone());
        }
        ordered = sorted;

        let base_len = ordered.iter().take_while(|s| s.kind().is_base()).count();
        Ok(Self {
            specs: ordered,
            base_len,
        })
    }

    /// All specs in creation order.
    #[must_use]
    pub fn specs(&self) -> &[ResourceSpec] {
        &self.specs
    }

    /// Base resources: dataset, bucket, connection.
    #[must_use]
    pub fn base(&self) -> &[ResourceSpec] {
        &self.specs[..self.base_len]
    }

    /// Resources realized after the identity wait: tables and models.
    #[must_use]
    pub fn dependent(&self) -> &[ResourceSpec] {
        &self.specs[self.base_len..]
    }

    /// The resources whose existence is independently re-checked at the
    /// end of a run: dataset, connection, and model kinds.
    #[must_use]
    pub fn critical(&self) -> Vec<&ResourceSpec> {
        self.specs
            .iter()
            .filter(|s| {
                matches!(
                    s.kind(),
                    ResourceKind::Dataset | ResourceKind::Connection | ResourceKind::Model
                )
            })
            .collect()
    }

    /// The connection resource whose service identity the flow waits on.
    #[must_use]
    pub fn connection(&self) -> Option<&ResourceSpec> {
        self.specs
            .iter()
            .find(|s| s.kind() == ResourceKind::Connection)
    }

    #[must_use]
    pub fn get(&self, id: &ResourceId) -> Option<&ResourceSpec> {
        self.specs.iter().find(|s| &s.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(id: &str) -> ResourceSpec {
        ResourceSpec::new(
            id,
            ResourceDefinition::Dataset {
                dataset: "d".into(),
                location: "us-central1".into(),
                description: None,
            },
        )
    }

    fn table(id: &str) -> ResourceSpec {
        ResourceSpec::new(
            id,
            ResourceDefinition::Table {
                dataset: "d".into(),
                table: "t".into(),
                schema: TableSchema::default(),
            },
        )
    }

    fn model(id: &str) -> ResourceSpec {
        ResourceSpec::new(
            id,
            ResourceDefinition::Model {
                dataset: "d".into(),
                model: "m".into(),
                connection: "c".into(),
                endpoint: "endpoint".into(),
            },
        )
    }

    #[test]
    fn orders_by_tier_then_declaration() {
        let plan = SetupPlan::new(vec![
            model("model/m").with_dependency("dataset/d"),
            table("table/b").with_dependency("dataset/d"),
            dataset("dataset/d"),
            table("table/a").with_dependency("dataset/d"),
        ])
        .unwrap();

        let ids: Vec<&str> = plan.specs().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["dataset/d", "table/b", "table/a", "model/m"]);
        assert_eq!(plan.base().len(), 1);
        assert_eq!(plan.dependent().len(), 3);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = SetupPlan::new(vec![dataset("dataset/d"), dataset("dataset/d")]).unwrap_err();
        assert_eq!(err, PlanError::DuplicateId(ResourceId::new("dataset/d")));
    }

    #[test]
    fn rejects_unknown_dependency() {
        let err = SetupPlan::new(vec![table("table/t").with_dependency("dataset/missing")])
            .unwrap_err();
        assert!(matches!(err, PlanError::UnknownDependency { .. }));
    }

    #[test]
    fn rejects_cycles() {
        let err = SetupPlan::new(vec![
            table("table/a").with_dependency("table/b"),
            table("table/b").with_dependency("table/a"),
        ])
        .unwrap_err();
        assert!(matches!(err, PlanError::CycleDetected(_)));
    }

    #[test]
    fn rejects_self_dependency() {
        let err =
            SetupPlan::new(vec![table("table/a").with_dependency("table/a")]).unwrap_err();
        assert!(matches!(err, PlanError::CycleDetected(_)));
    }

    #[test]
    fn rejects_tier_inversion() {
        let err = SetupPlan::new(vec![
            dataset("dataset/d").with_dependency("table/t"),
            table("table/t"),
        ])
        .unwrap_err();
        assert!(matches!(err, PlanError::TierInversion { .. }));
    }

    #[test]
    fn critical_set_covers_dataset_connection_model() {
        let conn = ResourceSpec::new(
            "connection/c",
            ResourceDefinition::Connection {
                connection: "c".into(),
                location: "us-central1".into(),
            },
        );
        let plan = SetupPlan::new(vec![
            dataset("dataset/d"),
            conn,
            table("table/t").with_dependency("dataset/d"),
            model("model/m")
                .with_dependency("dataset/d")
                .with_dependency("connection/c"),
        ])
        .unwrap();

        let critical: Vec<&str> = plan.critical().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(critical, vec!["dataset/d", "connection/c", "model/m"]);
        assert_eq!(plan.connection().unwrap().id.as_str(), "connection/c");
    }
}
