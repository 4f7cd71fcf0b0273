// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - S3 Bucket Enumerator
 * Lists buckets in a customer account and fetches exposure signals
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info};
use uuid::Uuid;

use super::credentials::AssumedCredentials;
use super::error_handling::{classify_sdk_error, retry_with_backoff, CloudError, RetryConfig};
use crate::errors::{EnumerationError, SignalFetchError};
use crate::types::{
    AclGrant, BucketObservation, CloudAccount, ExposureSignalSet, PolicyStatus,
    PublicAccessBlock, SignalKind, WebsiteConfig, DEFAULT_REGION,
};

/// Enumerates buckets for one account using that account's credentials
#[async_trait]
pub trait ResourceEnumerator: Send + Sync {
    /// Names of all buckets owned by the account
    async fn list_buckets(&self) -> Result<Vec<String>, EnumerationError>;

    /// Region and exposure signals for one bucket. Never fails: every signal is best-effort.
    async fn describe_bucket(&self, name: &str) -> BucketObservation;
}

/// Builds an enumerator bound to one account's assumed credentials
pub trait EnumeratorFactory: Send + Sync {
    fn for_account(
        &self,
        account: &CloudAccount,
        credentials: &AssumedCredentials,
    ) -> Arc<dyn ResourceEnumerator>;
}

pub struct S3EnumeratorFactory {
    base: aws_config::SdkConfig,
    signal_timeout: Duration,
    retry: RetryConfig,
    endpoint_url: Option<String>,
    force_path_style: bool,
}

impl S3EnumeratorFactory {
    pub fn new(base: &aws_config::SdkConfig, signal_timeout: Duration, retry: RetryConfig) -> Self {
        Self {
            base: base.clone(),
            signal_timeout,
            retry,
            endpoint_url: None,
            force_path_style: false,
        }
    }

    /// Target an S3-compatible endpoint instead of AWS
    pub fn with_endpoint(mut self, endpoint_url: Option<String>, force_path_style: bool) -> Self {
        self.endpoint_url = endpoint_url;
        self.force_path_style = force_path_style;
        self
    }
}

impl EnumeratorFactory for S3EnumeratorFactory {
    fn for_account(
        &self,
        account: &CloudAccount,
        credentials: &AssumedCredentials,
    ) -> Arc<dyn ResourceEnumerator> {
        let provider = Credentials::new(
            credentials.access_key_id.clone(),
            credentials.secret_access_key.clone(),
            Some(credentials.session_token.clone()),
            credentials.expires_at.map(SystemTime::from),
            "exposure-monitor-assumed-role",
        );

        let mut builder = aws_sdk_s3::config::Builder::from(&self.base)
            .credentials_provider(provider)
            .force_path_style(self.force_path_style);
        if let Some(endpoint_url) = &self.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }
        let config = builder.build();

        Arc::new(S3Enumerator {
            account_id: account.id,
            client: aws_sdk_s3::Client::from_conf(config),
            regional_clients: Mutex::new(HashMap::new()),
            signal_timeout: self.signal_timeout,
            retry: self.retry.clone(),
        })
    }
}

pub struct S3Enumerator {
    account_id: Uuid,
    client: aws_sdk_s3::Client,
    regional_clients: Mutex<HashMap<String, aws_sdk_s3::Client>>,
    signal_timeout: Duration,
    retry: RetryConfig,
}

impl S3Enumerator {
    /// Bucket-level calls must go to the bucket's home region
    fn regional_client(&self, region: &str) -> aws_sdk_s3::Client {
        let home: Option<&str> = self.client.config().region().map(|r| r.as_ref());
        if home == Some(region) {
            return self.client.clone();
        }

        self.regional_clients
            .lock()
            .entry(region.to_string())
            .or_insert_with(|| {
                let config = self
                    .client
                    .config()
                    .to_builder()
                    .region(Region::new(region.to_string()))
                    .build();
                aws_sdk_s3::Client::from_conf(config)
            })
            .clone()
    }

    /// Run one signal fetch with bounded retry and a per-signal timeout.
    /// Any failure yields `None` (signal absent).
    async fn fetch_signal<T, F, Fut>(&self, kind: SignalKind, bucket: &str, op: F) -> Option<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Option<T>, CloudError>>,
    {
        let attempt = retry_with_backoff(op, self.retry.clone(), kind.operation());

        let reason = match tokio::time::timeout(self.signal_timeout, attempt).await {
            Ok(Ok(value)) => return value,
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {:?}", self.signal_timeout),
        };

        let err = SignalFetchError {
            signal: kind,
            bucket: bucket.to_string(),
            reason,
        };
        debug!(account_id = %self.account_id, "{}", err);
        None
    }

    async fn resolve_region(&self, bucket: &str) -> String {
        let client = &self.client;
        self.fetch_signal(SignalKind::Location, bucket, move || async move {
            get_bucket_location(client, bucket).await
        })
        .await
        .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }
}

#[async_trait]
impl ResourceEnumerator for S3Enumerator {
    async fn list_buckets(&self) -> Result<Vec<String>, EnumerationError> {
        let client = &self.client;
        let names = retry_with_backoff(
            move || async move { list_bucket_names(client).await },
            self.retry.clone(),
            "s3:ListBuckets",
        )
        .await
        .map_err(|source| EnumerationError {
            account_id: self.account_id,
            source,
        })?;

        info!(account_id = %self.account_id, buckets = names.len(), "Listed buckets");
        Ok(names)
    }

    async fn describe_bucket(&self, name: &str) -> BucketObservation {
        let region = self.resolve_region(name).await;
        let client = &self.regional_client(&region);

        let (public_access_block, policy_status, acl, website) = tokio::join!(
            self.fetch_signal(SignalKind::PublicAccessBlock, name, move || async move {
                get_public_access_block(client, name).await
            }),
            self.fetch_signal(SignalKind::PolicyStatus, name, move || async move {
                get_policy_status(client, name).await
            }),
            self.fetch_signal(SignalKind::Acl, name, move || async move {
                get_acl_grants(client, name).await
            }),
            self.fetch_signal(SignalKind::Website, name, move || async move {
                get_website(client, name).await
            }),
        );

        BucketObservation {
            name: name.to_string(),
            region,
            signals: ExposureSignalSet {
                public_access_block,
                policy_status,
                acl,
                website,
            },
        }
    }
}

async fn list_bucket_names(client: &aws_sdk_s3::Client) -> Result<Vec<String>, CloudError> {
    let mut names = Vec::new();
    let mut continuation_token: Option<String> = None;

    loop {
        let response = client
            .list_buckets()
            .set_continuation_token(continuation_token.take())
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        names.extend(
            response
                .buckets()
                .iter()
                .filter_map(|b| b.name().map(str::to_string)),
        );

        match response.continuation_token() {
            Some(token) if !token.is_empty() => continuation_token = Some(token.to_string()),
            _ => break,
        }
    }

    Ok(names)
}

async fn get_bucket_location(
    client: &aws_sdk_s3::Client,
    bucket: &str,
) -> Result<Option<String>, CloudError> {
    let response = client
        .get_bucket_location()
        .bucket(bucket)
        .send()
        .await
        .map_err(|e| classify_sdk_error(&e))?;

    Ok(Some(normalize_location(
        response.location_constraint().map(|lc| lc.as_str()),
    )))
}

/// Empty constraint is us-east-1; legacy "EU" is eu-west-1
fn normalize_location(constraint: Option<&str>) -> String {
    match constraint {
        None | Some("") => DEFAULT_REGION.to_string(),
        Some("EU") => "eu-west-1".to_string(),
        Some(region) => region.to_string(),
    }
}

async fn get_public_access_block(
    client: &aws_sdk_s3::Client,
    bucket: &str,
) -> Result<Option<PublicAccessBlock>, CloudError> {
    let response = client
        .get_public_access_block()
        .bucket(bucket)
        .send()
        .await
        .map_err(|e| classify_sdk_error(&e))?;

    Ok(response
        .public_access_block_configuration()
        .map(|cfg| PublicAccessBlock {
            block_public_acls: cfg.block_public_acls(),
            ignore_public_acls: cfg.ignore_public_acls(),
            block_public_policy: cfg.block_public_policy(),
            restrict_public_buckets: cfg.restrict_public_buckets(),
        }))
}

async fn get_policy_status(
    client: &aws_sdk_s3::Client,
    bucket: &str,
) -> Result<Option<PolicyStatus>, CloudError> {
    let response = client
        .get_bucket_policy_status()
        .bucket(bucket)
        .send()
        .await
        .map_err(|e| classify_sdk_error(&e))?;

    Ok(response.policy_status().map(|status| PolicyStatus {
        is_public: status.is_public(),
    }))
}

async fn get_acl_grants(
    client: &aws_sdk_s3::Client,
    bucket: &str,
) -> Result<Option<Vec<AclGrant>>, CloudError> {
    let response = client
        .get_bucket_acl()
        .bucket(bucket)
        .send()
        .await
        .map_err(|e| classify_sdk_error(&e))?;

    let grants = response
        .grants()
        .iter()
        .map(|grant| {
            let grantee = grant.grantee();
            AclGrant {
                grantee_uri: grantee.and_then(|g| g.uri()).map(str::to_string),
                grantee_id: grantee.and_then(|g| g.id()).map(str::to_string),
                grantee_display_name: grantee.and_then(|g| g.display_name()).map(str::to_string),
                permission: grant.permission().map(|p| p.as_str().to_string()),
            }
        })
        .collect();

    Ok(Some(grants))
}

async fn get_website(
    client: &aws_sdk_s3::Client,
    bucket: &str,
) -> Result<Option<WebsiteConfig>, CloudError> {
    let response = client
        .get_bucket_website()
        .bucket(bucket)
        .send()
        .await
        .map_err(|e| classify_sdk_error(&e))?;

    Ok(Some(WebsiteConfig {
        index_document: response.index_document().map(|d| d.suffix().to_string()),
        error_document: response.error_document().map(|d| d.key().to_string()),
        redirect_all_requests_to: response
            .redirect_all_requests_to()
            .map(|r| r.host_name().to_string()),
    }))
}
