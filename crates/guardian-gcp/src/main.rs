use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use guardian_core::catalog;
use guardian_core::config::DeploymentConfig;
use guardian_core::flow::SetupFlow;
use guardian_core::retry::RetryPolicy;
use guardian_core::verify::VerificationReporter;
use guardian_gcp::GcpControlPlane;
use std::sync::Arc;
use std::time::Duration;

fn deployment_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("project")
            .long("project")
            .required(true)
            .help("Cloud project identifier"),
    )
    .arg(
        Arg::new("location")
            .long("location")
            .default_value("us-central1")
            .help("Location for dataset, bucket, and connection"),
    )
    .arg(
        Arg::new("dataset")
            .long("dataset")
            .default_value("clinical_guardian")
            .help("Warehouse dataset name"),
    )
    .arg(
        Arg::new("bucket")
            .long("bucket")
            .help("Document bucket name (defaults to <project>-clinical-docs)"),
    )
    .arg(
        Arg::new("connection")
            .long("connection")
            .default_value("vertex-ai")
            .help("Connection name for remote model calls"),
    )
    .arg(
        Arg::new("endpoint")
            .long("endpoint")
            .default_value("gemini-2.0-flash")
            .help("Hosted model endpoint backing the model resource"),
    )
    .arg(
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Emit JSON instead of text"),
    )
}

fn config_from(args: &ArgMatches) -> DeploymentConfig {
    let project = args.get_one::<String>("project").unwrap();
    let mut config = DeploymentConfig::new(project)
        .with_location(args.get_one::<String>("location").unwrap())
        .with_dataset(args.get_one::<String>("dataset").unwrap())
        .with_connection(args.get_one::<String>("connection").unwrap())
        .with_model_endpoint(args.get_one::<String>("endpoint").unwrap());
    if let Some(bucket) = args.get_one::<String>("bucket") {
        config = config.with_bucket(bucket);
    }
    config
}

fn access_token() -> anyhow::Result<String> {
    std::env::var("GUARDIAN_ACCESS_TOKEN").context(
        "set GUARDIAN_ACCESS_TOKEN to an OAuth access token \
         (e.g. `gcloud auth print-access-token`)",
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Command::new("guardian-setup")
        .version(guardian_core::VERSION)
        .about("Provision the Clinical Guardian demo environment")
        .subcommand_required(true)
        .subcommand(
            deployment_args(
                Command::new("setup").about("Run the full idempotent provisioning flow"),
            )
            .arg(
                Arg::new("wait-attempts")
                    .long("wait-attempts")
                    .default_value("6")
                    .value_parser(value_parser!(u32))
                    .help("Polls for the connection's service identity"),
            )
            .arg(
                Arg::new("wait-interval-secs")
                    .long("wait-interval-secs")
                    .default_value("10")
                    .value_parser(value_parser!(u64))
                    .help("Seconds between identity polls"),
            ),
        )
        .subcommand(deployment_args(
            Command::new("verify").about("Re-check the critical resources and report"),
        ))
        .subcommand(deployment_args(
            Command::new("plan").about("Print the resolved resource plan without touching anything"),
        ));

    match cli.get_matches().subcommand() {
        Some(("setup", args)) => {
            let attempts = *args.get_one::<u32>("wait-attempts").unwrap();
            let interval = *args.get_one::<u64>("wait-interval-secs").unwrap();
            let config = config_from(args).with_identity_wait(RetryPolicy::fixed(
                attempts,
                Duration::from_secs(interval),
            ));
            let plan = catalog::clinical_guardian(&config)?;
            let gateway = Arc::new(GcpControlPlane::new(config.project.clone(), access_token()?));

            let flow = SetupFlow::new(gateway, config);
            let cancel = flow.cancel_flag();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            });

            let report = flow.run(&plan).await;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.generate_text());
            }
            std::process::exit(report.exit_code());
        }
        Some(("verify", args)) => {
            let config = config_from(args);
            let plan = catalog::clinical_guardian(&config)?;
            let gateway = Arc::new(GcpControlPlane::new(config.project.clone(), access_token()?));

            let reporter = VerificationReporter::new(gateway);
            let summary = reporter.verify(&plan.critical()).await;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{}", summary.generate_text());
            }
            std::process::exit(i32::from(!summary.passed));
        }
        Some(("plan", args)) => {
            let config = config_from(args);
            let plan = catalog::clinical_guardian(&config)?;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                for spec in plan.specs() {
                    if spec.depends_on.is_empty() {
                        println!("{} ({})", spec.id, spec.kind());
                    } else {
                        let deps: Vec<&str> =
                            spec.depends_on.iter().map(|d| d.as_str()).collect();
                        println!("{} ({}) <- {}", spec.id, spec.kind(), deps.join(", "));
                    }
                }
            }
            Ok(())
        }
        _ => unreachable!("subcommand_required"),
    }
}
