mod common;

use common::scenario_plan;
use guardian_core::catalog;
use guardian_core::error::GatewayError;
use guardian_core::flow::SetupFlow;
use guardian_core::report::{IdentityResolution, ProvisionOutcome, RunStatus};
use guardian_core::spec::ResourceId;
use guardian_core::verify::Remediation;
use guardian_test_utils::{fast_config, FakeGateway, GatewayCall};
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[tokio::test]
async fn happy_path_scenario_creates_everything() {
    let plan = scenario_plan();
    let gateway = Arc::new(FakeGateway::new());
    gateway.identity_visible_after("connection/c", 1, "svc-7@demo.iam");

    let flow = SetupFlow::new(Arc::clone(&gateway), fast_config());
    let report = flow.run(&plan).await;

    assert_eq!(report.status, RunStatus::Complete);
    let outcomes: Vec<(&str, &ProvisionOutcome)> = report
        .results
        .iter()
        .map(|r| (r.id.as_str(), &r.outcome))
        .collect();
    assert_eq!(
        outcomes,
        vec![
            ("dataset/d", &ProvisionOutcome::Created),
            ("connection/c", &ProvisionOutcome::Created),
            ("table/t", &ProvisionOutcome::Created),
            ("model/m", &ProvisionOutcome::Created),
        ]
    );
    assert_eq!(
        report.identity,
        Some(IdentityResolution::Resolved {
            principal: "svc-7@demo.iam".into()
        })
    );
    assert!(report.grants.iter().all(|g| g.granted));
    assert!(report.verification.as_ref().unwrap().passed);
    assert!(report.generate_text().contains("PASS"));
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn full_catalog_provisions_cleanly() {
    let config = fast_config();
    let plan = catalog::clinical_guardian(&config).unwrap();
    let gateway = Arc::new(FakeGateway::new());
    gateway.identity_visible_after("connection/vertex-ai", 2, "bq-conn@demo.iam");

    let flow = SetupFlow::new(Arc::clone(&gateway), config);
    let report = flow.run(&plan).await;

    assert_eq!(report.status, RunStatus::Complete);
    assert_eq!(report.results.len(), 8);
    assert_eq!(
        gateway.granted(),
        vec![
            (
                "bq-conn@demo.iam".to_string(),
                "roles/aiplatform.user".to_string()
            ),
            (
                "bq-conn@demo.iam".to_string(),
                "roles/storage.objectViewer".to_string()
            ),
        ]
    );
}

#[tokio::test]
async fn rerunning_a_provisioned_project_only_skips() {
    let plan = scenario_plan();
    let gateway = Arc::new(FakeGateway::new());
    gateway.identity_visible_after("connection/c", 1, "svc-7@demo.iam");

    let flow = SetupFlow::new(Arc::clone(&gateway), fast_config());
    let first = flow.run(&plan).await;
    assert_eq!(first.status, RunStatus::Complete);

    let second = flow.run(&plan).await;
    assert_eq!(second.status, RunStatus::Complete);
    assert!(second
        .results
        .iter()
        .all(|r| r.outcome == ProvisionOutcome::AlreadyExists));
}

#[tokio::test]
async fn identity_exhaustion_degrades_but_does_not_block_the_model() {
    let plan = scenario_plan();
    let gateway = Arc::new(FakeGateway::new());
    gateway.identity_never("connection/c");

    let flow = SetupFlow::new(Arc::clone(&gateway), fast_config());
    let report = flow.run(&plan).await;

    assert_eq!(report.status, RunStatus::CompleteWithWarnings);
    assert_eq!(
        report.identity,
        Some(IdentityResolution::Exhausted { attempts: 6 })
    );
    assert!(report.grants.is_empty());
    assert!(report.warnings.iter().any(|w| w.contains("manually")));

    // The model step still ran and succeeded.
    let model = report
        .results
        .iter()
        .find(|r| r.id.as_str() == "model/m")
        .unwrap();
    assert_eq!(model.outcome, ProvisionOutcome::Created);
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn one_failed_grant_does_not_suppress_the_others() {
    let plan = scenario_plan();
    let gateway = Arc::new(FakeGateway::new());
    gateway.identity_visible_after("connection/c", 1, "svc-7@demo.iam");
    gateway.deny_role(
        "roles/aiplatform.user",
        GatewayError::Permanent("policy frozen by org admin".into()),
    );

    let flow = SetupFlow::new(Arc::clone(&gateway), fast_config());
    let report = flow.run(&plan).await;

    assert_eq!(report.status, RunStatus::CompleteWithWarnings);
    assert_eq!(report.grants.len(), 2);
    assert!(!report.grants[0].granted);
    assert!(report.grants[1].granted);
    assert_eq!(
        gateway.granted(),
        vec![(
            "svc-7@demo.iam".to_string(),
            "roles/storage.objectViewer".to_string()
        )]
    );
}

#[tokio::test]
async fn dataset_permanent_failure_aborts_before_dependents() {
    let plan = scenario_plan();
    let gateway = Arc::new(FakeGateway::new());
    gateway.fail_create(
        "dataset/d",
        GatewayError::Permanent("billing disabled".into()),
    );

    let flow = SetupFlow::new(Arc::clone(&gateway), fast_config());
    let report = flow.run(&plan).await;

    assert_eq!(report.status, RunStatus::Aborted);
    assert_eq!(report.exit_code(), 1);
    assert!(report.verification.is_none());
    assert!(report
        .warnings
        .iter()
        .any(|w| w.contains("dataset/d")));

    let calls = gateway.calls();
    assert!(!calls.contains(&GatewayCall::Create(ResourceId::new("table/t"))));
    assert!(!calls.contains(&GatewayCall::Create(ResourceId::new("model/m"))));
}

#[tokio::test]
async fn verification_findings_carry_distinct_remediation() {
    let plan = scenario_plan();
    let gateway = Arc::new(FakeGateway::new());
    gateway.identity_visible_after("connection/c", 1, "svc-7@demo.iam");
    // Both failures surface only in the verification pass.
    gateway.fail_describe("dataset/d", GatewayError::Transient("read timed out".into()));
    gateway.fail_describe(
        "model/m",
        GatewayError::Permanent("model definition rejected".into()),
    );

    let flow = SetupFlow::new(Arc::clone(&gateway), fast_config());
    let report = flow.run(&plan).await;

    assert_eq!(report.status, RunStatus::CompleteWithWarnings);
    let verification = report.verification.unwrap();
    assert!(!verification.passed);

    let hint_for = |id: &str| {
        verification
            .hints
            .iter()
            .find(|h| h.id.as_str() == id)
            .unwrap()
            .remediation
    };
    assert_eq!(hint_for("dataset/d"), Remediation::RerunSetup);
    assert_eq!(hint_for("model/m"), Remediation::ManualConsoleAction);
}

#[tokio::test]
async fn cancelled_run_reports_aborted() {
    let plan = scenario_plan();
    let gateway = Arc::new(FakeGateway::new());

    let flow = SetupFlow::new(Arc::clone(&gateway), fast_config());
    flow.cancel_flag().cancel();
    let report = flow.run(&plan).await;

    assert_eq!(report.status, RunStatus::Aborted);
    assert!(report.warnings.iter().any(|w| w.contains("cancelled")));
    assert!(gateway.calls().is_empty());
}
