// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - PostgreSQL Catalog
 * System of record for cloud accounts, buckets and findings
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{
    Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts, Transaction,
};
use std::time::Duration;
use tokio_postgres::{NoTls, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{DatabaseConfig, FindingMode};
use crate::errors::PersistenceError;
use crate::types::{
    BucketRecord, CloudAccount, Finding, FindingDetails, FindingType, PolicyStatus, ScanResult,
    DEFAULT_REGION, PROVIDER_AWS,
};

const DEMO_ROLE_ARN: &str = "arn:aws:iam::000000000000:role/Demo";
const DEMO_BUCKET: &str = "demo-public-bucket";

/// Rows written by `DatabaseClient::seed_demo`
#[derive(Debug, Clone)]
pub struct SeededBucket {
    pub account: CloudAccount,
    pub bucket: BucketRecord,
    pub result: ScanResult,
}

/// Catalog operations used by the scan pipeline
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Cheap reachability check run before a scan starts
    async fn ping(&self) -> Result<(), PersistenceError>;

    async fn list_active_accounts(&self, provider: &str)
        -> Result<Vec<CloudAccount>, PersistenceError>;

    /// Upsert the bucket, then record one finding per entry, in a single
    /// transaction. Nothing is written when any step fails.
    ///
    /// The bucket is created on first observation, otherwise region and
    /// last_seen_at are refreshed. Identity fields are never rewritten.
    async fn sync_bucket(
        &self,
        account: &CloudAccount,
        name: &str,
        region: &str,
        findings: &[Finding],
    ) -> Result<BucketRecord, PersistenceError>;
}

/// PostgreSQL catalog client with connection pooling
pub struct DatabaseClient {
    pool: Pool,
    finding_mode: FindingMode,
}

impl DatabaseClient {
    /// Build the pool. Connections are opened lazily; use `ping` to check reachability.
    pub fn new(config: &DatabaseConfig) -> Result<Self, PersistenceError> {
        let mut pg_config = Config::new();
        pg_config.url = Some(config.url.clone());
        pg_config.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let timeout = Some(Duration::from_secs(config.connection_timeout_secs));
        let mut pool_config = PoolConfig::new(config.pool_size);
        pool_config.timeouts = Timeouts {
            wait: timeout,
            create: timeout,
            recycle: timeout,
        };
        pg_config.pool = Some(pool_config);

        let pool = pg_config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| PersistenceError::Connection(e.to_string()))?;

        info!(
            pool_size = config.pool_size,
            finding_mode = ?config.finding_mode,
            "PostgreSQL catalog pool created"
        );

        Ok(Self {
            pool,
            finding_mode: config.finding_mode,
        })
    }

    async fn connection(&self) -> Result<deadpool_postgres::Object, PersistenceError> {
        self.pool
            .get()
            .await
            .map_err(|e| PersistenceError::Connection(e.to_string()))
    }

    /// Create tables and indexes if missing
    pub async fn init_schema(&self) -> Result<(), PersistenceError> {
        let client = self.connection().await?;

        client
            .batch_execute(
                r#"
                CREATE TABLE IF NOT EXISTS cloud_accounts (
                    id UUID PRIMARY KEY,
                    org_id VARCHAR(255) NOT NULL,
                    provider VARCHAR(32) NOT NULL,
                    display_name TEXT,
                    role_arn TEXT NOT NULL,
                    external_id TEXT,
                    is_active BOOLEAN NOT NULL DEFAULT true,
                    created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
                );

                CREATE TABLE IF NOT EXISTS buckets (
                    id UUID PRIMARY KEY,
                    org_id VARCHAR(255) NOT NULL,
                    account_id UUID NOT NULL REFERENCES cloud_accounts(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    region VARCHAR(64) NOT NULL,
                    last_seen_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                    created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                    UNIQUE (account_id, name)
                );

                CREATE TABLE IF NOT EXISTS findings (
                    id UUID PRIMARY KEY,
                    bucket_id UUID NOT NULL REFERENCES buckets(id) ON DELETE CASCADE,
                    type VARCHAR(64) NOT NULL,
                    severity VARCHAR(16) NOT NULL,
                    status VARCHAR(32) NOT NULL DEFAULT 'open',
                    details JSONB NOT NULL,
                    created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                    last_seen_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
                );

                CREATE INDEX IF NOT EXISTS idx_accounts_active ON cloud_accounts(provider, is_active);
                CREATE INDEX IF NOT EXISTS idx_buckets_org_id ON buckets(org_id);
                CREATE INDEX IF NOT EXISTS idx_findings_bucket_id ON findings(bucket_id);
                "#,
            )
            .await
            .map_err(|e| query_error("init_schema", e))?;

        // Append mode keeps one row per cycle, so the open-finding key only
        // exists while deduplicating.
        let finding_index = match self.finding_mode {
            FindingMode::DedupeOpen => {
                r#"
                CREATE UNIQUE INDEX IF NOT EXISTS idx_findings_open_type
                    ON findings(bucket_id, type) WHERE status = 'open';
                "#
            }
            FindingMode::Append => "DROP INDEX IF EXISTS idx_findings_open_type;",
        };

        client
            .batch_execute(finding_index)
            .await
            .map_err(|e| query_error("init_schema", e))?;

        info!(finding_mode = ?self.finding_mode, "Catalog schema initialized");
        Ok(())
    }

    /// Register an account directly. Used by the development seed only;
    /// accounts are otherwise managed outside the scanner.
    pub async fn insert_account(
        &self,
        org_id: &str,
        display_name: &str,
        role_arn: &str,
        external_id: Option<&str>,
    ) -> Result<CloudAccount, PersistenceError> {
        let client = self.connection().await?;
        let id = Uuid::new_v4();

        client
            .execute(
                r#"
                INSERT INTO cloud_accounts (id, org_id, provider, display_name, role_arn, external_id, is_active)
                VALUES ($1, $2, $3, $4, $5, $6, true)
                "#,
                &[&id, &org_id, &PROVIDER_AWS, &display_name, &role_arn, &external_id],
            )
            .await
            .map_err(|e| query_error("insert_account", e))?;

        Ok(CloudAccount {
            id,
            org_id: org_id.to_string(),
            provider: PROVIDER_AWS.to_string(),
            display_name: Some(display_name.to_string()),
            role_arn: role_arn.to_string(),
            external_id: external_id.map(str::to_string),
            is_active: true,
        })
    }

    /// Development seed: a demo account with one public bucket and its
    /// POLICY_PUBLIC finding. The caller indexes the returned bucket.
    pub async fn seed_demo(&self, org_id: &str) -> Result<SeededBucket, PersistenceError> {
        let account = self
            .insert_account(org_id, "demo", DEMO_ROLE_ARN, None)
            .await?;
        let result = ScanResult::from_findings(vec![Finding::new(
            FindingType::PolicyPublic,
            FindingDetails::PolicyPublic {
                policy_status: PolicyStatus {
                    is_public: Some(true),
                },
            },
        )]);
        let bucket = self
            .sync_bucket(&account, DEMO_BUCKET, DEFAULT_REGION, &result.findings)
            .await?;

        info!(org_id, bucket = %bucket.name, "Seeded demo account");
        Ok(SeededBucket {
            account,
            bucket,
            result,
        })
    }

    /// Number of finding rows recorded for a bucket, open or not
    pub async fn count_findings(&self, bucket_id: Uuid) -> Result<i64, PersistenceError> {
        let client = self.connection().await?;
        let row = client
            .query_one("SELECT COUNT(*) FROM findings WHERE bucket_id = $1", &[&bucket_id])
            .await
            .map_err(|e| query_error("count_findings", e))?;

        row.try_get(0).map_err(decode_error)
    }

    /// Get connection pool stats
    pub fn get_pool_stats(&self) -> (usize, usize) {
        let status = self.pool.status();
        (status.size, status.available)
    }
}

#[async_trait]
impl Catalog for DatabaseClient {
    async fn ping(&self) -> Result<(), PersistenceError> {
        let client = self.connection().await?;
        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| query_error("ping", e))?;
        Ok(())
    }

    async fn list_active_accounts(
        &self,
        provider: &str,
    ) -> Result<Vec<CloudAccount>, PersistenceError> {
        let client = self.connection().await?;

        let rows = client
            .query(
                r#"
                SELECT id, org_id, provider, display_name, role_arn, external_id, is_active
                FROM cloud_accounts
                WHERE is_active = true AND provider = $1
                ORDER BY created_at
                "#,
                &[&provider],
            )
            .await
            .map_err(|e| query_error("list_active_accounts", e))?;

        rows.iter().map(account_from_row).collect()
    }

    async fn sync_bucket(
        &self,
        account: &CloudAccount,
        name: &str,
        region: &str,
        findings: &[Finding],
    ) -> Result<BucketRecord, PersistenceError> {
        let mut client = self.connection().await?;
        let transaction = client
            .transaction()
            .await
            .map_err(|e| query_error("begin", e))?;

        let record = upsert_bucket(&transaction, account, name, region).await?;
        for finding in findings {
            append_finding(&transaction, self.finding_mode, record.id, finding).await?;
        }

        transaction
            .commit()
            .await
            .map_err(|e| query_error("commit", e))?;

        debug!(
            bucket_id = %record.id,
            bucket = %record.name,
            findings = findings.len(),
            "Synchronized bucket"
        );
        Ok(record)
    }
}

async fn upsert_bucket(
    transaction: &Transaction<'_>,
    account: &CloudAccount,
    name: &str,
    region: &str,
) -> Result<BucketRecord, PersistenceError> {
    let row = transaction
        .query_one(
            r#"
            INSERT INTO buckets (id, org_id, account_id, name, region, last_seen_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (account_id, name) DO UPDATE SET
                region = EXCLUDED.region,
                last_seen_at = GREATEST(buckets.last_seen_at, EXCLUDED.last_seen_at)
            RETURNING id, org_id, account_id, name, region, last_seen_at
            "#,
            &[&Uuid::new_v4(), &account.org_id, &account.id, &name, &region],
        )
        .await
        .map_err(|e| query_error("upsert_bucket", e))?;

    bucket_from_row(&row)
}

async fn append_finding(
    transaction: &Transaction<'_>,
    mode: FindingMode,
    bucket_id: Uuid,
    finding: &Finding,
) -> Result<(), PersistenceError> {
    let details = serde_json::to_value(&finding.details)
        .map_err(|e| PersistenceError::Decode(e.to_string()))?;

    let query = match mode {
        FindingMode::Append => {
            r#"
            INSERT INTO findings (id, bucket_id, type, severity, status, details)
            VALUES ($1, $2, $3, $4, 'open', $5)
            "#
        }
        FindingMode::DedupeOpen => {
            r#"
            INSERT INTO findings (id, bucket_id, type, severity, status, details)
            VALUES ($1, $2, $3, $4, 'open', $5)
            ON CONFLICT (bucket_id, type) WHERE status = 'open' DO UPDATE SET
                severity = EXCLUDED.severity,
                details = EXCLUDED.details,
                last_seen_at = NOW()
            "#
        }
    };

    transaction
        .execute(
            query,
            &[
                &Uuid::new_v4(),
                &bucket_id,
                &finding.finding_type.as_str(),
                &finding.severity.as_str(),
                &details,
            ],
        )
        .await
        .map_err(|e| query_error("append_finding", e))?;

    Ok(())
}

fn query_error(operation: &'static str, error: tokio_postgres::Error) -> PersistenceError {
    let reason = match error.as_db_error() {
        Some(db) => server_reason(db.code().code(), db.message(), db.detail()),
        None => match std::error::Error::source(&error) {
            Some(source) => format!("{}: {}", error, source),
            None => error.to_string(),
        },
    };

    PersistenceError::Query { operation, reason }
}

/// `<SQLSTATE> <message> (<detail>)`
fn server_reason(sqlstate: &str, message: &str, detail: Option<&str>) -> String {
    match detail {
        Some(detail) => format!("{} {} ({})", sqlstate, message, detail),
        None => format!("{} {}", sqlstate, message),
    }
}

fn account_from_row(row: &Row) -> Result<CloudAccount, PersistenceError> {
    Ok(CloudAccount {
        id: row.try_get("id").map_err(decode_error)?,
        org_id: row.try_get("org_id").map_err(decode_error)?,
        provider: row.try_get("provider").map_err(decode_error)?,
        display_name: row.try_get("display_name").map_err(decode_error)?,
        role_arn: row.try_get("role_arn").map_err(decode_error)?,
        external_id: row.try_get("external_id").map_err(decode_error)?,
        is_active: row.try_get("is_active").map_err(decode_error)?,
    })
}

fn bucket_from_row(row: &Row) -> Result<BucketRecord, PersistenceError> {
    let last_seen_at: DateTime<Utc> = row.try_get("last_seen_at").map_err(decode_error)?;

    Ok(BucketRecord {
        id: row.try_get("id").map_err(decode_error)?,
        org_id: row.try_get("org_id").map_err(decode_error)?,
        account_id: row.try_get("account_id").map_err(decode_error)?,
        name: row.try_get("name").map_err(decode_error)?,
        region: row.try_get("region").map_err(decode_error)?,
        last_seen_at,
    })
}

fn decode_error(error: tokio_postgres::Error) -> PersistenceError {
    PersistenceError::Decode(error.to_string())
}
