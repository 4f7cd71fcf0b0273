// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Exposure Monitor
 * Worker, one-shot scan and catalog maintenance commands
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use exposure_monitor::cloud::{S3EnumeratorFactory, StsCredentialBroker};
use exposure_monitor::config::{load_config_with_overrides, AppConfig, ObservabilityConfig};
use exposure_monitor::database::DatabaseClient;
use exposure_monitor::orchestrator::{OrchestratorConfig, RunOutcome, ScanOrchestrator};
use exposure_monitor::scheduler::{Scheduler, SchedulerHandle};
use exposure_monitor::search::{BucketDocument, OpenSearchIndexer, SearchIndex};

#[derive(Parser, Debug)]
#[command(name = "exposure-monitor")]
#[command(about = "Audit customer S3 buckets for public exposure", long_about = None)]
struct Cli {
    /// Config file (yaml, toml or json). Defaults plus env overrides when omitted.
    #[arg(long, short, env = "EXPOSURE_MONITOR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run scans on the configured interval until interrupted
    Worker,
    /// Run one full scan and print the run report as JSON
    Scan,
    /// Create catalog tables and the search index
    Init,
    /// Query the bucket index for one organization
    Search {
        #[arg(long)]
        org_id: String,
        /// OpenSearch query_string expression
        #[arg(long, short)]
        query: Option<String>,
    },
    /// Insert a demo account, bucket and finding (development only)
    Seed {
        #[arg(long)]
        org_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config_with_overrides(cli.config.as_deref())?;
    init_tracing(&config.observability);

    match cli.command {
        Command::Worker => run_worker(&config).await,
        Command::Scan => run_once(&config).await,
        Command::Init => init_stores(&config).await,
        Command::Search { org_id, query } => search(&config, &org_id, query.as_deref()).await,
        Command::Seed { org_id } => seed(&config, &org_id).await,
    }
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&observability.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if observability.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn build_orchestrator(config: &AppConfig) -> Result<ScanOrchestrator> {
    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.aws.region.clone()))
        .load()
        .await;

    let retry = config.scanner.retry_config();
    let broker = StsCredentialBroker::new(&sdk_config, &config.aws, retry.clone());
    let enumerators =
        S3EnumeratorFactory::new(&sdk_config, config.scanner.signal_timeout(), retry)
            .with_endpoint(config.aws.s3_endpoint_url.clone(), config.aws.s3_force_path_style);

    let catalog = DatabaseClient::new(&config.database).context("Failed to create catalog pool")?;
    let index = OpenSearchIndexer::new(&config.search).context("Failed to create search client")?;

    Ok(ScanOrchestrator::new(
        Arc::new(catalog),
        Arc::new(index),
        Arc::new(broker),
        Arc::new(enumerators),
        OrchestratorConfig::from(&config.scanner),
    ))
}

async fn run_worker(config: &AppConfig) -> Result<()> {
    let orchestrator = Arc::new(build_orchestrator(config).await?);
    let (scheduler, handle) = Scheduler::new(orchestrator, config.scanner.scan_interval());
    spawn_scan_signal_listener(handle);

    info!(
        interval_secs = config.scanner.scan_interval_secs,
        accounts_in_parallel = config.scanner.max_concurrency,
        "Exposure monitor worker starting (SIGUSR1 triggers a scan)"
    );

    scheduler
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(())
}

/// SIGUSR1 asks a running worker for an immediate scan
#[cfg(unix)]
fn spawn_scan_signal_listener(handle: SchedulerHandle) {
    use futures::stream;
    use tokio::signal::unix::{signal, SignalKind};

    let requests = match signal(SignalKind::user_defined1()) {
        Ok(requests) => requests,
        Err(e) => {
            warn!("Failed to listen for scan request signal: {}", e);
            return;
        }
    };

    let triggers = stream::unfold(requests, |mut requests| async move {
        requests.recv().await.map(|()| ((), requests))
    });

    tokio::spawn(async move {
        handle.serve_triggers(triggers).await;
    });
}

#[cfg(not(unix))]
fn spawn_scan_signal_listener(_handle: SchedulerHandle) {}

async fn run_once(config: &AppConfig) -> Result<()> {
    let orchestrator = build_orchestrator(config).await?;

    match orchestrator.run_full_scan().await? {
        RunOutcome::Completed(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        RunOutcome::Coalesced => info!("Scan already in progress"),
    }

    Ok(())
}

async fn init_stores(config: &AppConfig) -> Result<()> {
    let catalog = DatabaseClient::new(&config.database)?;
    catalog
        .init_schema()
        .await
        .context("Failed to initialize catalog schema")?;

    let index = OpenSearchIndexer::new(&config.search)?;
    let created = index
        .ensure_index()
        .await
        .context("Failed to ensure search index")?;

    info!(index = index.index_name(), created, "Stores initialized");
    Ok(())
}

async fn search(config: &AppConfig, org_id: &str, query: Option<&str>) -> Result<()> {
    let index = OpenSearchIndexer::new(&config.search)?;
    let documents = index.search(org_id, query).await?;

    println!("{}", serde_json::to_string_pretty(&documents)?);
    Ok(())
}

async fn seed(config: &AppConfig, org_id: &str) -> Result<()> {
    let catalog = DatabaseClient::new(&config.database)?;
    catalog.init_schema().await?;
    let seeded = catalog.seed_demo(org_id).await?;

    let index = OpenSearchIndexer::new(&config.search)?;
    index.ensure_index().await?;
    index
        .upsert_document(&BucketDocument::from_scan(
            &seeded.account,
            &seeded.bucket,
            &seeded.result,
        ))
        .await?;

    info!(bucket_id = %seeded.bucket.id, "Seeded demo bucket");
    Ok(())
}
