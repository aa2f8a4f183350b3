mod common;

use common::{dataset, scenario_plan};
use guardian_core::cancel::CancelFlag;
use guardian_core::error::{GatewayError, SetupError};
use guardian_core::provisioner::Provisioner;
use guardian_core::report::ProvisionOutcome;
use guardian_core::retry::RetryPolicy;
use guardian_core::spec::{ResourceId, SetupPlan};
use guardian_test_utils::{FakeGateway, GatewayCall};
use std::sync::Arc;
use std::time::Duration;

fn provisioner(gateway: Arc<FakeGateway>) -> Provisioner<FakeGateway> {
    Provisioner::new(
        gateway,
        RetryPolicy::fixed(3, Duration::ZERO),
        CancelFlag::new(),
    )
}

#[tokio::test]
async fn creates_every_resource_in_plan_order() {
    let plan = scenario_plan();
    let gateway = Arc::new(FakeGateway::new());
    let results = provisioner(Arc::clone(&gateway))
        .provision(plan.specs())
        .await
        .unwrap();

    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["dataset/d", "connection/c", "table/t", "model/m"]);
    assert!(results
        .iter()
        .all(|r| r.outcome == ProvisionOutcome::Created));
}

#[tokio::test]
async fn existence_is_checked_before_every_create() {
    let plan = scenario_plan();
    let gateway = Arc::new(FakeGateway::new());
    provisioner(Arc::clone(&gateway))
        .provision(plan.specs())
        .await
        .unwrap();

    let calls = gateway.calls();
    for spec in plan.specs() {
        let exists_at = calls
            .iter()
            .position(|c| *c == GatewayCall::Exists(spec.id.clone()))
            .unwrap();
        let create_at = calls
            .iter()
            .position(|c| *c == GatewayCall::Create(spec.id.clone()))
            .unwrap();
        assert!(exists_at < create_at, "{} created before checked", spec.id);
    }
}

#[tokio::test]
async fn dependencies_are_created_before_dependents() {
    let plan = scenario_plan();
    let gateway = Arc::new(FakeGateway::new());
    provisioner(Arc::clone(&gateway))
        .provision(plan.specs())
        .await
        .unwrap();

    let calls = gateway.calls();
    let create_position = |id: &str| {
        calls
            .iter()
            .position(|c| *c == GatewayCall::Create(ResourceId::new(id)))
            .unwrap()
    };
    assert!(create_position("dataset/d") < create_position("table/t"));
    assert!(create_position("connection/c") < create_position("model/m"));
}

#[tokio::test]
async fn second_run_reports_everything_as_already_existing() {
    let plan = scenario_plan();
    let gateway = Arc::new(FakeGateway::new());
    let provisioner = provisioner(Arc::clone(&gateway));

    provisioner.provision(plan.specs()).await.unwrap();
    let second = provisioner.provision(plan.specs()).await.unwrap();

    assert_eq!(second.len(), plan.len());
    assert!(second
        .iter()
        .all(|r| r.outcome == ProvisionOutcome::AlreadyExists));
}

#[tokio::test]
async fn permanent_failure_short_circuits_dependents() {
    let plan = scenario_plan();
    let gateway = Arc::new(FakeGateway::new());
    gateway.fail_create(
        "dataset/d",
        GatewayError::Permanent("authorization denied".into()),
    );

    let results = provisioner(Arc::clone(&gateway))
        .provision(plan.specs())
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert!(results[0].outcome.is_failed());

    let calls = gateway.calls();
    assert!(!calls.contains(&GatewayCall::Create(ResourceId::new("table/t"))));
    assert!(!calls.contains(&GatewayCall::Exists(ResourceId::new("model/m"))));
}

#[tokio::test]
async fn transient_failures_are_retried_until_success() {
    let plan = SetupPlan::new(vec![dataset("dataset/d", "demo")]).unwrap();
    let gateway = Arc::new(FakeGateway::new());
    gateway.fail_create_times("dataset/d", 2, "quota pushback");

    let results = provisioner(Arc::clone(&gateway))
        .provision(plan.specs())
        .await
        .unwrap();

    assert_eq!(results[0].outcome, ProvisionOutcome::Created);
    let creates = gateway
        .calls()
        .iter()
        .filter(|c| matches!(c, GatewayCall::Create(_)))
        .count();
    assert_eq!(creates, 3);
}

#[tokio::test]
async fn transient_exhaustion_escalates_to_failure() {
    let plan = SetupPlan::new(vec![dataset("dataset/d", "demo")]).unwrap();
    let gateway = Arc::new(FakeGateway::new());
    gateway.fail_create_times("dataset/d", 3, "network unreachable");

    let results = provisioner(Arc::clone(&gateway))
        .provision(plan.specs())
        .await
        .unwrap();

    match &results[0].outcome {
        ProvisionOutcome::Failed { reason } => {
            assert!(reason.contains("3 attempts"), "unexpected reason: {reason}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn mixed_outcomes_are_not_an_error() {
    let plan = scenario_plan();
    let gateway = Arc::new(FakeGateway::new());
    gateway.pre_existing("dataset/d");

    let results = provisioner(Arc::clone(&gateway))
        .provision(plan.specs())
        .await
        .unwrap();

    assert_eq!(results[0].outcome, ProvisionOutcome::AlreadyExists);
    assert!(results[1..]
        .iter()
        .all(|r| r.outcome == ProvisionOutcome::Created));
}

#[tokio::test]
async fn cancellation_stops_before_any_call() {
    let plan = scenario_plan();
    let gateway = Arc::new(FakeGateway::new());
    let cancel = CancelFlag::new();
    cancel.cancel();

    let provisioner = Provisioner::new(
        Arc::clone(&gateway),
        RetryPolicy::fixed(3, Duration::ZERO),
        cancel,
    );
    let result = provisioner.provision(plan.specs()).await;

    assert!(matches!(result, Err(SetupError::Cancelled)));
    assert!(gateway.calls().is_empty());
}
