//! netcheck - cluster networking checks
//!
//! A CLI for end-to-end verification of cluster networking changes:
//! CNI live migration, IPsec rollout, BGP route advertisement and
//! Whereabouts IPAM.
//!
//! ## Features
//!
//! - Pod-to-pod connectivity matrix probed through a bounded worker pool
//! - Route table checks for BGP-learned prefixes
//! - Packet capture summaries to confirm tunnel traffic is encrypted
//! - Duplicate and out-of-range IP detection on secondary networks
//! - Status-condition polling and CNI live migration
//!
//! ## Usage
//!
//! ```bash
//! # Probe every pair of probe pods, 16 at a time
//! netcheck connectivity -n netcheck -l app=netcheck-probe --workers 16
//!
//! # Check BGP-learned routes on two FRR pods
//! netcheck routes frr-k8s-abcde frr-k8s-fghij -n openshift-frr-k8s -e 10.128.0.0/23
//!
//! # Migrate to OVN-Kubernetes and back
//! netcheck migrate OVNKubernetes --rollback
//! ```

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

mod capture;
mod cli;
mod config;
mod connectivity;
mod executor;
mod ipam;
mod k8s;
mod models;
mod output;
mod routes;
mod utils;

use cli::Args;
use config::{AppConfig, EnvConfig, SuiteConfig};
use connectivity::{ConnectivityMatrix, KubectlProber};
use executor::{run_bounded, work_item, BoundedParallelRunner, WorkItem};
use k8s::{migration_patch, ConditionWaiter, K8sClient, NetworkMigrator, PodManager, ResourceRef};
use models::{IpPrefix, MigrationPlan, NetworkType};
use output::{write_output_to_file, OutputFormat, ResultFormatter};
use utils::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logger(LogLevel::resolve(args.log_level.as_deref(), args.verbose));

    let env = EnvConfig::load();
    let mut app = AppConfig::discover(args.config.as_deref(), &env)?;
    if let Some(format) = &args.format {
        app.format = format.clone();
    }
    if let Some(kubeconfig) = &args.kubeconfig {
        app.kubeconfig = Some(kubeconfig.clone());
    }

    match args.command {
        cli::Command::Connectivity(c) => {
            if let Some(ns) = &c.namespace {
                app.namespace = ns.clone();
            }
            if let Some(selector) = &c.selector {
                app.selector = Some(selector.clone());
            }
            if let Some(workers) = c.workers {
                app.workers = workers;
            }
            if let Some(probe) = &c.probe {
                app.probe = probe.clone();
            }
            if let Some(timeout) = c.timeout {
                app.probe_timeout_secs = timeout;
            }
            let suite = app.resolve()?;
            run_connectivity(&suite, c, args.no_color).await?;
        }
        cli::Command::Routes(r) => {
            let suite = app.resolve()?;
            run_routes(&suite, r, args.no_color).await?;
        }
        cli::Command::Capture(c) => {
            let suite = app.resolve()?;
            run_capture(&suite, c, args.no_color).await?;
        }
        cli::Command::Ipam(i) => {
            if let Some(ns) = &i.namespace {
                app.namespace = ns.clone();
            }
            if let Some(selector) = &i.selector {
                app.selector = Some(selector.clone());
            }
            let suite = app.resolve()?;
            run_ipam(&suite, i, args.no_color).await?;
        }
        cli::Command::Wait(w) => {
            if let Some(interval) = w.interval {
                app.poll_interval_secs = interval;
            }
            if let Some(timeout) = w.timeout {
                app.poll_timeout_secs = timeout;
            }
            let suite = app.resolve()?;
            run_wait(&suite, w).await?;
        }
        cli::Command::Migrate(m) => {
            let suite = app.resolve()?;
            run_migrate(&suite, m).await?;
        }
        cli::Command::Env => {
            config::print_env_help();
            if env.has_any() {
                println!();
                env.print_summary();
            }
        }
        cli::Command::Config(c) => {
            manage_config(c, &app)?;
        }
    }

    Ok(())
}

fn formatter(suite: &SuiteConfig, no_color: bool) -> ResultFormatter {
    let formatter = ResultFormatter::new(suite.format);
    if no_color {
        formatter.no_color()
    } else {
        formatter
    }
}

async fn connect(suite: &SuiteConfig) -> Result<K8sClient> {
    K8sClient::connect(suite.kubeconfig.as_deref()).await
}

async fn run_connectivity(
    suite: &SuiteConfig,
    args: cli::ConnectivityArgs,
    no_color: bool,
) -> Result<()> {
    let client = connect(suite).await?;
    let pods = PodManager::new(client);

    let endpoints = pods
        .list_endpoints(&suite.namespace, suite.selector.as_deref())
        .await?;
    if endpoints.len() < 2 {
        bail!(
            "Need at least 2 running pods in {} (selector {:?}), found {}",
            suite.namespace,
            suite.selector,
            endpoints.len()
        );
    }

    let mut matrix = ConnectivityMatrix::new(endpoints);
    if args.cross_node {
        matrix = matrix.cross_node_only();
    }

    let mut prober = KubectlProber::new(pods, suite.probe, suite.probe_timeout_secs);
    if let Some(container) = &args.container {
        prober = prober.with_container(container);
    }

    let runner = BoundedParallelRunner::new(suite.workers)?;
    let report = matrix.check(Arc::new(prober), &runner).await;

    println!("{}", formatter(suite, no_color).format_connectivity(&report));

    if let Some(path) = &args.output {
        let format = OutputFormat::from_extension(Path::new(path)).unwrap_or(suite.format);
        let content = ResultFormatter::new(format)
            .no_color()
            .format_connectivity(&report);
        write_output_to_file(path, &content)?;
        info!("Report saved to {}", path);
    }

    if !report.is_healthy() {
        bail!(
            "{} of {} pairs cannot reach each other",
            report.broken.len(),
            report.total_pairs
        );
    }
    Ok(())
}

async fn run_routes(suite: &SuiteConfig, args: cli::RoutesArgs, no_color: bool) -> Result<()> {
    let expected = args
        .expect
        .iter()
        .map(|p| p.parse::<IpPrefix>())
        .collect::<Result<Vec<_>, _>>()?;

    let pods = PodManager::new(connect(suite).await?);
    let namespace = args.namespace.clone().unwrap_or_else(|| suite.namespace.clone());
    let command: Vec<String> = if args.ipv6 {
        vec!["ip", "-6", "route", "show"]
    } else {
        vec!["ip", "route", "show"]
    }
    .into_iter()
    .map(String::from)
    .collect();

    let checks = Arc::new(Mutex::new(Vec::<routes::RouteCheck>::new()));
    let items: Vec<WorkItem> = args
        .pods
        .iter()
        .map(|pod| {
            let pods = pods.clone();
            let pod = pod.clone();
            let namespace = namespace.clone();
            let container = args.container.clone();
            let command = command.clone();
            let expected = expected.clone();
            let proto = args.proto.clone();
            let checks = checks.clone();
            work_item(async move {
                let text = pods
                    .exec_in_pod(&pod, &namespace, container.as_deref(), command)
                    .await?;
                let table = routes::RouteTable::parse(&text)
                    .with_context(|| format!("Failed to parse routes from {pod}"))?;
                let check = routes::RouteCheck::new(pod.as_str(), &table, &expected, &proto);
                let passed = check.passed();
                let missing = check.missing.len();
                checks
                    .lock()
                    .map_err(|_| anyhow!("route check results poisoned"))?
                    .push(check);
                if passed {
                    Ok(())
                } else {
                    Err(anyhow!("{pod}: {missing} expected prefix(es) missing"))
                }
            })
        })
        .collect();

    let failures = run_bounded(items, suite.workers).await?;

    let mut checks = checks
        .lock()
        .map_err(|_| anyhow!("route check results poisoned"))?
        .clone();
    checks.sort_by(|a, b| a.source.cmp(&b.source));

    let formatter = formatter(suite, no_color);
    for check in &checks {
        println!("{}", formatter.format_routes(check));
    }

    if let Some(path) = &args.output {
        let content = serde_json::to_string_pretty(&checks)?;
        write_output_to_file(path, &content)?;
        info!("Report saved to {}", path);
    }

    failures.into_result()
}

async fn run_capture(suite: &SuiteConfig, args: cli::CaptureArgs, no_color: bool) -> Result<()> {
    let pods = PodManager::new(connect(suite).await?);
    let namespace = args.namespace.unwrap_or_else(|| suite.namespace.clone());
    let filter = args.filter.as_deref().unwrap_or(capture::DEFAULT_FILTER);

    info!(
        "Capturing on {}/{} interface {} for up to {}s",
        namespace, args.pod, args.interface, args.seconds
    );
    let command = capture::tcpdump_command(&args.interface, args.count, args.seconds, filter);
    let text = pods
        .exec_in_pod(&args.pod, &namespace, args.container.as_deref(), command)
        .await?;

    let summary = capture::CaptureSummary::parse(&text);
    println!(
        "{}",
        formatter(suite, no_color).format_capture(&args.pod, &summary)
    );

    summary.ensure_encrypted(&format!("{}/{}", args.pod, args.interface))
}

async fn run_ipam(suite: &SuiteConfig, args: cli::IpamArgs, no_color: bool) -> Result<()> {
    let range = match &args.range {
        Some(range) => {
            let mut range = ipam::IpRange::new(range.parse()?);
            for exclude in &args.exclude {
                range = range.excluding(exclude.parse()?);
            }
            Some(range)
        }
        None => None,
    };

    let pods = PodManager::new(connect(suite).await?);
    let mut assignments = Vec::new();
    for pod in pods
        .list_pods(&suite.namespace, suite.selector.as_deref())
        .await?
    {
        let name = pod.metadata.name.clone().unwrap_or_default();
        let found = ipam::assignments_from_pod(&pod)
            .with_context(|| format!("Bad network-status on {name}"))?;
        assignments.extend(found);
    }

    let report = ipam::IpamReport::build(&assignments, &args.network, range.as_ref());
    if report.assignments == 0 {
        warn!("No pods in {} have an address on {}", suite.namespace, args.network);
    }
    println!("{}", formatter(suite, no_color).format_ipam(&report));

    if !report.passed() {
        bail!(
            "{} duplicate and {} out-of-range addresses on {}",
            report.duplicates.len(),
            report.out_of_range.len(),
            report.network
        );
    }
    Ok(())
}

async fn run_wait(suite: &SuiteConfig, args: cli::WaitArgs) -> Result<()> {
    let resource = ResourceRef::from_kind(&args.kind, &args.name, args.namespace.as_deref())?;
    let client = connect(suite).await?;
    if !client.crd_exists(&resource.crd_name()).await? {
        bail!("{} is not installed in this cluster", resource.crd_name());
    }
    let waiter = ConditionWaiter::new(client, suite.poll);

    let condition = waiter
        .wait(&resource, &args.condition, &args.status)
        .await?;
    println!("{resource}: {condition}");
    Ok(())
}

async fn run_migrate(suite: &SuiteConfig, args: cli::MigrateArgs) -> Result<()> {
    let plan = match &args.target {
        Some(target) => {
            let mut plan = MigrationPlan::new(target.parse::<NetworkType>()?);
            if args.rollback {
                plan = plan.with_rollback();
            }
            plan
        }
        None => match &suite.migration {
            Some(plan) if args.rollback => plan.with_rollback(),
            Some(plan) => *plan,
            None => bail!("No migration target: pass one or set NETCHECK_MIGRATION"),
        },
    };

    if args.dry_run {
        for step in plan.steps() {
            println!("{}", serde_json::to_string_pretty(&migration_patch(step))?);
        }
        return Ok(());
    }

    let migrator = NetworkMigrator::new(connect(suite).await?, suite.poll);
    match migrator.current_network_type().await? {
        Some(current) if current == plan.target => {
            bail!("Cluster already runs {current}; no migration would start")
        }
        Some(current) => info!("Cluster runs {}, migrating per plan {}", current, plan),
        None => warn!("Cluster network type is unknown"),
    }

    let stopwatch = migrator.migrate(&plan).await?;
    println!("{}", stopwatch.format());
    Ok(())
}

fn manage_config(args: cli::ConfigArgs, app: &AppConfig) -> Result<()> {
    match args.action {
        cli::ConfigAction::Show => {
            match config::find_config() {
                Some(path) => println!("# discovered {}", path.display()),
                None => println!("# no config file found, showing defaults"),
            }
            print!("{}", serde_yaml::to_string(app)?);
            if let Err(e) = app.resolve() {
                warn!("Configuration is invalid: {}", e);
            }
        }
        cli::ConfigAction::Init { output, force } => {
            if Path::new(&output).exists() && !force {
                bail!("{output} already exists (use --force to overwrite)");
            }
            AppConfig::default().save(&output)?;
            println!("Wrote default configuration to {output}");
        }
        cli::ConfigAction::Example => {
            let example = AppConfig {
                migration: Some("OVNKubernetes:rollback".to_string()),
                kubeconfig: Some("~/.kube/config".to_string()),
                ..Default::default()
            };
            println!("# netcheck.yaml");
            print!("{}", serde_yaml::to_string(&example)?);
        }
    }
    Ok(())
}
