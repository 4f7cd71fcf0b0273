// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! In-memory collaborators for orchestrator and scheduler tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

use exposure_monitor::cloud::{
    AssumedCredentials, CloudError, CredentialBroker, EnumeratorFactory, ResourceEnumerator,
};
use exposure_monitor::config::FindingMode;
use exposure_monitor::database::Catalog;
use exposure_monitor::errors::{CredentialError, EnumerationError, IndexError, PersistenceError};
use exposure_monitor::orchestrator::{OrchestratorConfig, ScanOrchestrator};
use exposure_monitor::search::{BucketDocument, SearchIndex};
use exposure_monitor::types::{
    AclGrant, BucketObservation, BucketRecord, CloudAccount, ExposureSignalSet, Finding,
    FindingType, PolicyStatus, PublicAccessBlock, WebsiteConfig, PROVIDER_AWS,
};

pub fn account(org_id: &str) -> CloudAccount {
    let id = Uuid::new_v4();
    CloudAccount {
        id,
        org_id: org_id.to_string(),
        provider: PROVIDER_AWS.to_string(),
        display_name: Some(format!("{}-prod", org_id)),
        role_arn: format!("arn:aws:iam::123456789012:role/Audit-{}", id),
        external_id: Some("ext-123".to_string()),
        is_active: true,
    }
}

pub fn protective_signals() -> ExposureSignalSet {
    ExposureSignalSet {
        public_access_block: Some(PublicAccessBlock::fully_protective()),
        policy_status: Some(PolicyStatus {
            is_public: Some(false),
        }),
        acl: Some(vec![owner_grant()]),
        website: None,
    }
}

pub fn public_policy_signals() -> ExposureSignalSet {
    ExposureSignalSet {
        policy_status: Some(PolicyStatus {
            is_public: Some(true),
        }),
        ..protective_signals()
    }
}

pub fn website_signals() -> ExposureSignalSet {
    ExposureSignalSet {
        website: Some(WebsiteConfig {
            index_document: Some("index.html".to_string()),
            ..WebsiteConfig::default()
        }),
        ..protective_signals()
    }
}

pub fn owner_grant() -> AclGrant {
    AclGrant {
        grantee_id: Some("owner-canonical-id".to_string()),
        permission: Some("FULL_CONTROL".to_string()),
        ..AclGrant::default()
    }
}

pub fn all_users_grant() -> AclGrant {
    AclGrant {
        grantee_uri: Some("http://acs.amazonaws.com/groups/global/AllUsers".to_string()),
        permission: Some("READ".to_string()),
        ..AclGrant::default()
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

pub struct MemoryCatalog {
    mode: FindingMode,
    accounts: Mutex<Vec<CloudAccount>>,
    buckets: Mutex<HashMap<(Uuid, String), BucketRecord>>,
    findings: Mutex<Vec<(Uuid, Finding)>>,
    failing_buckets: Mutex<HashSet<String>>,
    failing_findings: Mutex<HashSet<(String, FindingType)>>,
    pub unreachable: AtomicBool,
    pub pings: AtomicUsize,
}

impl MemoryCatalog {
    pub fn new(mode: FindingMode) -> Self {
        Self {
            mode,
            accounts: Mutex::new(Vec::new()),
            buckets: Mutex::new(HashMap::new()),
            findings: Mutex::new(Vec::new()),
            failing_buckets: Mutex::new(HashSet::new()),
            failing_findings: Mutex::new(HashSet::new()),
            unreachable: AtomicBool::new(false),
            pings: AtomicUsize::new(0),
        }
    }

    pub fn add_account(&self, account: CloudAccount) {
        self.accounts.lock().push(account);
    }

    pub fn fail_writes_for(&self, bucket: &str) {
        self.failing_buckets.lock().insert(bucket.to_string());
    }

    /// Writing this finding type for the bucket fails after the bucket row
    /// and any earlier findings were staged
    pub fn fail_finding_write(&self, bucket: &str, finding_type: FindingType) {
        self.failing_findings
            .lock()
            .insert((bucket.to_string(), finding_type));
    }

    pub fn buckets(&self) -> Vec<BucketRecord> {
        self.buckets.lock().values().cloned().collect()
    }

    pub fn bucket(&self, name: &str) -> Option<BucketRecord> {
        self.buckets.lock().values().find(|b| b.name == name).cloned()
    }

    pub fn findings_for(&self, bucket_id: Uuid) -> Vec<Finding> {
        self.findings
            .lock()
            .iter()
            .filter(|(id, _)| *id == bucket_id)
            .map(|(_, f)| f.clone())
            .collect()
    }

    pub fn ping_count(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn ping(&self) -> Result<(), PersistenceError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(PersistenceError::Connection("connection refused".to_string()));
        }
        Ok(())
    }

    async fn list_active_accounts(
        &self,
        provider: &str,
    ) -> Result<Vec<CloudAccount>, PersistenceError> {
        Ok(self
            .accounts
            .lock()
            .iter()
            .filter(|a| a.is_active && a.provider == provider)
            .cloned()
            .collect())
    }

    async fn sync_bucket(
        &self,
        account: &CloudAccount,
        name: &str,
        region: &str,
        findings: &[Finding],
    ) -> Result<BucketRecord, PersistenceError> {
        if self.failing_buckets.lock().contains(name) {
            return Err(PersistenceError::Query {
                operation: "upsert_bucket",
                reason: "40P01 deadlock detected".to_string(),
            });
        }

        // Stage against copies and publish only when every write succeeded
        let mut buckets = self.buckets.lock();
        let mut staged_findings = self.findings.lock().clone();

        let now = Utc::now();
        let key = (account.id, name.to_string());
        let record = match buckets.get(&key) {
            Some(existing) => BucketRecord {
                region: region.to_string(),
                last_seen_at: existing.last_seen_at.max(now),
                ..existing.clone()
            },
            None => BucketRecord {
                id: Uuid::new_v4(),
                org_id: account.org_id.clone(),
                account_id: account.id,
                name: name.to_string(),
                region: region.to_string(),
                last_seen_at: now,
            },
        };

        let failing = self.failing_findings.lock();
        for finding in findings {
            if failing.contains(&(name.to_string(), finding.finding_type)) {
                return Err(PersistenceError::Query {
                    operation: "append_finding",
                    reason: "23514 new row violates check constraint".to_string(),
                });
            }

            let existing = match self.mode {
                FindingMode::DedupeOpen => staged_findings
                    .iter_mut()
                    .find(|(id, f)| *id == record.id && f.finding_type == finding.finding_type),
                FindingMode::Append => None,
            };
            match existing {
                Some((_, open)) => *open = finding.clone(),
                None => staged_findings.push((record.id, finding.clone())),
            }
        }

        buckets.insert(key, record.clone());
        *self.findings.lock() = staged_findings;
        Ok(record)
    }
}

// ---------------------------------------------------------------------------
// Search index
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemorySearchIndex {
    documents: Mutex<HashMap<Uuid, BucketDocument>>,
    pub unreachable: AtomicBool,
    pub reject_writes: AtomicBool,
    pub writes: AtomicUsize,
}

impl MemorySearchIndex {
    pub fn document(&self, bucket_id: Uuid) -> Option<BucketDocument> {
        self.documents.lock().get(&bucket_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.documents.lock().len()
    }
}

#[async_trait]
impl SearchIndex for MemorySearchIndex {
    async fn ping(&self) -> Result<(), IndexError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(IndexError::Request {
                url: "http://search.test".to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(())
    }

    async fn upsert_document(&self, document: &BucketDocument) -> Result<(), IndexError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(IndexError::Status {
                url: format!("http://search.test/buckets_v1/_doc/{}", document.bucket_id),
                status: 429,
                body: "too many requests".to_string(),
            });
        }

        self.documents
            .lock()
            .insert(document.bucket_id, document.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Credential broker
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct StaticBroker {
    denied: Mutex<HashSet<String>>,
}

impl StaticBroker {
    pub fn deny(&self, role_arn: &str) {
        self.denied.lock().insert(role_arn.to_string());
    }
}

#[async_trait]
impl CredentialBroker for StaticBroker {
    async fn assume(
        &self,
        role_arn: &str,
        _external_id: Option<&str>,
    ) -> Result<AssumedCredentials, CredentialError> {
        if self.denied.lock().contains(role_arn) {
            return Err(CredentialError::Denied {
                role_arn: role_arn.to_string(),
                reason: "AccessDenied".to_string(),
            });
        }

        Ok(AssumedCredentials {
            access_key_id: "ASIATESTKEY".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: "token".to_string(),
            expires_at: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Enumerator
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct FakeBucket {
    pub name: String,
    pub region: String,
    pub signals: ExposureSignalSet,
    /// Never finishes describing; used to exercise the run timeout
    pub stalls: bool,
}

impl FakeBucket {
    pub fn new(name: &str, signals: ExposureSignalSet) -> Self {
        Self {
            name: name.to_string(),
            region: "eu-west-1".to_string(),
            signals,
            stalls: false,
        }
    }

    pub fn stalling(name: &str) -> Self {
        Self {
            stalls: true,
            ..Self::new(name, ExposureSignalSet::default())
        }
    }
}

#[derive(Default)]
struct FakeState {
    buckets: HashMap<Uuid, Vec<FakeBucket>>,
    broken_listing: HashSet<Uuid>,
}

/// Shared view of every fake account; enumerators read it at call time
pub struct FakeCloud {
    state: Arc<Mutex<FakeState>>,
    gate: Option<watch::Receiver<bool>>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState::default())),
            gate: None,
        }
    }

    /// Listing blocks until the returned sender publishes `true`
    pub fn gated() -> (Self, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        let cloud = Self {
            gate: Some(rx),
            ..Self::new()
        };
        (cloud, tx)
    }

    pub fn set_buckets(&self, account: &CloudAccount, buckets: Vec<FakeBucket>) {
        self.state.lock().buckets.insert(account.id, buckets);
    }

    pub fn break_listing(&self, account: &CloudAccount) {
        self.state.lock().broken_listing.insert(account.id);
    }
}

impl EnumeratorFactory for FakeCloud {
    fn for_account(
        &self,
        account: &CloudAccount,
        _credentials: &AssumedCredentials,
    ) -> Arc<dyn ResourceEnumerator> {
        Arc::new(FakeEnumerator {
            account_id: account.id,
            state: Arc::clone(&self.state),
            gate: self.gate.clone(),
        })
    }
}

struct FakeEnumerator {
    account_id: Uuid,
    state: Arc<Mutex<FakeState>>,
    gate: Option<watch::Receiver<bool>>,
}

#[async_trait]
impl ResourceEnumerator for FakeEnumerator {
    async fn list_buckets(&self) -> Result<Vec<String>, EnumerationError> {
        if let Some(gate) = &self.gate {
            let mut gate = gate.clone();
            let _ = gate.wait_for(|open| *open).await;
        }

        let state = self.state.lock();
        if state.broken_listing.contains(&self.account_id) {
            return Err(EnumerationError {
                account_id: self.account_id,
                source: CloudError::AuthorizationError("s3:ListAllMyBuckets denied".to_string()),
            });
        }

        Ok(state
            .buckets
            .get(&self.account_id)
            .map(|buckets| buckets.iter().map(|b| b.name.clone()).collect())
            .unwrap_or_default())
    }

    async fn describe_bucket(&self, name: &str) -> BucketObservation {
        let bucket = self
            .state
            .lock()
            .buckets
            .get(&self.account_id)
            .and_then(|buckets| buckets.iter().find(|b| b.name == name).cloned());

        match bucket {
            Some(bucket) if bucket.stalls => std::future::pending::<BucketObservation>().await,
            Some(bucket) => BucketObservation {
                name: bucket.name,
                region: bucket.region,
                signals: bucket.signals,
            },
            None => BucketObservation {
                name: name.to_string(),
                region: "us-east-1".to_string(),
                signals: ExposureSignalSet::default(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

pub struct Harness {
    pub catalog: Arc<MemoryCatalog>,
    pub index: Arc<MemorySearchIndex>,
    pub broker: Arc<StaticBroker>,
    pub cloud: Arc<FakeCloud>,
}

impl Harness {
    pub fn new(mode: FindingMode) -> Self {
        Self::with_cloud(mode, FakeCloud::new())
    }

    pub fn with_cloud(mode: FindingMode, cloud: FakeCloud) -> Self {
        Self {
            catalog: Arc::new(MemoryCatalog::new(mode)),
            index: Arc::new(MemorySearchIndex::default()),
            broker: Arc::new(StaticBroker::default()),
            cloud: Arc::new(cloud),
        }
    }

    pub fn orchestrator(&self) -> ScanOrchestrator {
        self.orchestrator_with(OrchestratorConfig {
            provider: PROVIDER_AWS.to_string(),
            account_concurrency: 4,
            bucket_concurrency: 4,
            max_run_duration: Duration::from_secs(60),
        })
    }

    pub fn orchestrator_with(&self, config: OrchestratorConfig) -> ScanOrchestrator {
        ScanOrchestrator::new(
            self.catalog.clone(),
            self.index.clone(),
            self.broker.clone(),
            self.cloud.clone(),
            config,
        )
    }
}
