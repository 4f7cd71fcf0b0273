// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Scan Orchestrator
 * Runs one full exposure scan across all active accounts
 *
 * Accounts and buckets are processed with bounded parallelism. Failures are
 * isolated to the account or bucket that produced them and collected into
 * the run report. At most one run is active; overlapping triggers coalesce
 * into a single follow-up run.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cloud::{CredentialBroker, EnumeratorFactory, ResourceEnumerator};
use crate::config::ScannerConfig;
use crate::database::Catalog;
use crate::errors::{PersistenceError, RunFatalError, ScanError};
use crate::evaluator::evaluate;
use crate::search::{BucketDocument, SearchIndex};
use crate::types::{BucketObservation, BucketRecord, CloudAccount, ScanResult};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub provider: String,
    pub account_concurrency: usize,
    pub bucket_concurrency: usize,
    pub max_run_duration: Duration,
}

impl From<&ScannerConfig> for OrchestratorConfig {
    fn from(config: &ScannerConfig) -> Self {
        Self {
            provider: config.provider.clone(),
            account_concurrency: config.max_concurrency.max(1),
            bucket_concurrency: config.bucket_concurrency.max(1),
            max_run_duration: config.max_run_duration(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&ScannerConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Failed,
}

#[derive(Debug)]
pub enum RunOutcome {
    /// The run (and any coalesced follow-up) finished; report of the last one
    Completed(RunReport),
    /// A run was already in progress; one follow-up run is queued
    Coalesced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Credential,
    Enumeration,
    Persistence,
}

impl From<&ScanError> for FailureKind {
    fn from(error: &ScanError) -> Self {
        match error {
            ScanError::Credential(_) => FailureKind::Credential,
            ScanError::Enumeration(_) => FailureKind::Enumeration,
            ScanError::Persistence(_) => FailureKind::Persistence,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountFailure {
    pub account_id: Uuid,
    pub org_id: String,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BucketFailure {
    pub account_id: Uuid,
    pub bucket: String,
    pub message: String,
}

/// Diagnostics for one run. Partial failures never change the outcome.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub accounts_total: usize,
    pub accounts_scanned: usize,
    pub buckets_scanned: usize,
    pub public_buckets: usize,
    pub findings_recorded: usize,
    pub index_failures: usize,
    pub timed_out: bool,
    pub account_failures: Vec<AccountFailure>,
    pub bucket_failures: Vec<BucketFailure>,
}

#[derive(Default)]
struct RunDiagnostics {
    accounts_scanned: usize,
    buckets_scanned: usize,
    public_buckets: usize,
    findings_recorded: usize,
    index_failures: usize,
    account_failures: Vec<AccountFailure>,
    bucket_failures: Vec<BucketFailure>,
}

struct Control {
    state: RunState,
    pending: bool,
}

/// Resets a run left `Running` when the driving future is dropped
struct RunGuard<'a> {
    control: &'a Mutex<Control>,
    armed: bool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut control = self.control.lock();
            control.state = RunState::Idle;
            control.pending = false;
        }
    }
}

pub struct ScanOrchestrator {
    catalog: Arc<dyn Catalog>,
    index: Arc<dyn SearchIndex>,
    broker: Arc<dyn CredentialBroker>,
    enumerators: Arc<dyn EnumeratorFactory>,
    config: OrchestratorConfig,
    control: Mutex<Control>,
}

impl ScanOrchestrator {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        index: Arc<dyn SearchIndex>,
        broker: Arc<dyn CredentialBroker>,
        enumerators: Arc<dyn EnumeratorFactory>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            catalog,
            index,
            broker,
            enumerators,
            config,
            control: Mutex::new(Control {
                state: RunState::Idle,
                pending: false,
            }),
        }
    }

    pub fn state(&self) -> RunState {
        self.control.lock().state
    }

    /// Run one full scan.
    ///
    /// If a run is already active this returns `Coalesced` immediately and
    /// the active caller performs exactly one more run after the current one.
    /// Only a `RunFatalError` is surfaced; per-account and per-bucket
    /// failures are reported in the `RunReport`.
    pub async fn run_full_scan(&self) -> Result<RunOutcome, RunFatalError> {
        {
            let mut control = self.control.lock();
            if control.state == RunState::Running {
                control.pending = true;
                info!("Scan already in progress, queued one follow-up run");
                return Ok(RunOutcome::Coalesced);
            }
            control.state = RunState::Running;
            control.pending = false;
        }

        let mut guard = RunGuard {
            control: &self.control,
            armed: true,
        };

        loop {
            let result = self.execute_run().await;

            let mut control = self.control.lock();
            match result {
                Err(e) => {
                    control.state = RunState::Failed;
                    control.pending = false;
                    guard.armed = false;
                    error!("Scan run aborted: {}", e);
                    return Err(e);
                }
                Ok(report) if !control.pending => {
                    control.state = RunState::Idle;
                    guard.armed = false;
                    return Ok(RunOutcome::Completed(report));
                }
                Ok(_) => {
                    control.pending = false;
                    debug!("Starting coalesced follow-up run");
                }
            }
        }
    }

    async fn execute_run(&self) -> Result<RunReport, RunFatalError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();

        self.catalog
            .ping()
            .await
            .map_err(RunFatalError::CatalogUnreachable)?;
        self.index
            .ping()
            .await
            .map_err(RunFatalError::SearchUnreachable)?;

        let accounts = self
            .catalog
            .list_active_accounts(&self.config.provider)
            .await
            .map_err(RunFatalError::AccountsUnavailable)?;

        info!(
            %run_id,
            accounts = accounts.len(),
            concurrency = self.config.account_concurrency,
            "Starting exposure scan"
        );

        let diagnostics = Mutex::new(RunDiagnostics::default());
        let diag = &diagnostics;

        let accounts_total = accounts.len();
        let work = stream::iter(accounts)
            .map(move |account| async move { self.scan_account(&account, diag).await })
            .buffer_unordered(self.config.account_concurrency)
            .collect::<Vec<()>>();

        let timed_out = tokio::time::timeout(self.config.max_run_duration, work)
            .await
            .is_err();
        if timed_out {
            warn!(
                %run_id,
                max_run_duration_secs = self.config.max_run_duration.as_secs(),
                "Scan exceeded its time budget, abandoning in-flight work"
            );
        }

        let diagnostics = diagnostics.into_inner();
        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            duration_ms: clock.elapsed().as_millis() as u64,
            accounts_total,
            accounts_scanned: diagnostics.accounts_scanned,
            buckets_scanned: diagnostics.buckets_scanned,
            public_buckets: diagnostics.public_buckets,
            findings_recorded: diagnostics.findings_recorded,
            index_failures: diagnostics.index_failures,
            timed_out,
            account_failures: diagnostics.account_failures,
            bucket_failures: diagnostics.bucket_failures,
        };

        info!(
            %run_id,
            accounts_scanned = report.accounts_scanned,
            account_failures = report.account_failures.len(),
            buckets_scanned = report.buckets_scanned,
            bucket_failures = report.bucket_failures.len(),
            public_buckets = report.public_buckets,
            findings = report.findings_recorded,
            duration_ms = report.duration_ms,
            "Exposure scan finished"
        );

        Ok(report)
    }

    async fn scan_account(&self, account: &CloudAccount, diagnostics: &Mutex<RunDiagnostics>) {
        match self.scan_account_buckets(account, diagnostics).await {
            Ok(()) => diagnostics.lock().accounts_scanned += 1,
            Err(e) => {
                warn!(account_id = %account.id, org_id = %account.org_id, "Skipping account: {}", e);
                diagnostics.lock().account_failures.push(AccountFailure {
                    account_id: account.id,
                    org_id: account.org_id.clone(),
                    kind: FailureKind::from(&e),
                    message: e.to_string(),
                });
            }
        }
    }

    async fn scan_account_buckets(
        &self,
        account: &CloudAccount,
        diagnostics: &Mutex<RunDiagnostics>,
    ) -> Result<(), ScanError> {
        let credentials = self
            .broker
            .assume(&account.role_arn, account.external_id.as_deref())
            .await?;

        let enumerator = self.enumerators.for_account(account, &credentials);
        let names = enumerator.list_buckets().await?;

        debug!(account_id = %account.id, buckets = names.len(), "Enumerated buckets");

        let enumerator: &dyn ResourceEnumerator = enumerator.as_ref();
        stream::iter(names)
            .map(move |name| self.scan_bucket(account, enumerator, name, diagnostics))
            .buffer_unordered(self.config.bucket_concurrency)
            .collect::<Vec<()>>()
            .await;

        Ok(())
    }

    async fn scan_bucket(
        &self,
        account: &CloudAccount,
        enumerator: &dyn ResourceEnumerator,
        name: String,
        diagnostics: &Mutex<RunDiagnostics>,
    ) {
        let observation = enumerator.describe_bucket(&name).await;
        let result = evaluate(&observation.signals);

        let record = match self.persist(account, &observation, &result).await {
            Ok(record) => record,
            Err(e) => {
                warn!(account_id = %account.id, bucket = %name, "Bucket cycle failed: {}", e);
                diagnostics.lock().bucket_failures.push(BucketFailure {
                    account_id: account.id,
                    bucket: name,
                    message: e.to_string(),
                });
                return;
            }
        };

        {
            let mut diag = diagnostics.lock();
            diag.buckets_scanned += 1;
            diag.findings_recorded += result.findings.len();
            if result.is_public {
                diag.public_buckets += 1;
            }
        }

        let document = BucketDocument::from_scan(account, &record, &result);
        if let Err(e) = self.index.upsert_document(&document).await {
            warn!(bucket_id = %record.id, bucket = %record.name, "Search index update failed: {}", e);
            diagnostics.lock().index_failures += 1;
        }
    }

    async fn persist(
        &self,
        account: &CloudAccount,
        observation: &BucketObservation,
        result: &ScanResult,
    ) -> Result<BucketRecord, PersistenceError> {
        self.catalog
            .sync_bucket(
                account,
                &observation.name,
                &observation.region,
                &result.findings,
            )
            .await
    }
}
