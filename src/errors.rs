// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Exposure Scan Error Types
 * Per-stage error classification with thiserror
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use thiserror::Error;
use uuid::Uuid;

use crate::cloud::CloudError;
use crate::types::SignalKind;

/// Role assumption into a customer account failed. The account is skipped.
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Role assumption denied for {role_arn}: {reason}")]
    Denied { role_arn: String, reason: String },

    #[error("Identity provider unreachable while assuming {role_arn}: {reason}")]
    Unreachable { role_arn: String, reason: String },

    #[error("AssumeRole response for {role_arn} did not include credentials")]
    MissingCredentials { role_arn: String },
}

impl CredentialError {
    pub fn from_cloud(role_arn: &str, error: CloudError) -> Self {
        let role_arn = role_arn.to_string();
        match error {
            CloudError::AuthenticationError(reason)
            | CloudError::AuthorizationError(reason)
            | CloudError::NotFoundError(reason)
            | CloudError::ConfigError(reason) => Self::Denied { role_arn, reason },
            other => Self::Unreachable {
                role_arn,
                reason: other.to_string(),
            },
        }
    }
}

/// Bucket listing for an account failed. The account is skipped.
#[derive(Error, Debug)]
#[error("Bucket listing failed for account {account_id}: {source}")]
pub struct EnumerationError {
    pub account_id: Uuid,
    #[source]
    pub source: CloudError,
}

/// One configuration signal was unavailable; the signal is treated as absent.
#[derive(Error, Debug)]
#[error("{signal} unavailable for bucket {bucket}: {reason}")]
pub struct SignalFetchError {
    pub signal: SignalKind,
    pub bucket: String,
    pub reason: String,
}

/// Catalog write or read failed
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Catalog connection unavailable: {0}")]
    Connection(String),

    #[error("Catalog query '{operation}' failed: {reason}")]
    Query {
        operation: &'static str,
        reason: String,
    },

    #[error("Catalog row could not be decoded: {0}")]
    Decode(String),
}

/// Search index write or query failed. Writes are logged and swallowed.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Search request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("Search engine returned HTTP {status} for {url}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("Search response could not be decoded: {0}")]
    Decode(String),

    #[error("Search client configuration error: {0}")]
    Configuration(String),
}

/// Aborts a whole run; surfaced to the caller of `run_full_scan`
#[derive(Error, Debug)]
pub enum RunFatalError {
    #[error("Catalog unreachable at run start: {0}")]
    CatalogUnreachable(#[source] PersistenceError),

    #[error("Search engine unreachable at run start: {0}")]
    SearchUnreachable(#[source] IndexError),

    #[error("Active accounts could not be loaded: {0}")]
    AccountsUnavailable(#[source] PersistenceError),
}

/// Failure isolated to one account or one bucket, recorded in run diagnostics
#[derive(Error, Debug)]
pub enum ScanError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Enumeration(#[from] EnumerationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Scheduler is not running")]
    Closed,

    #[error(transparent)]
    Fatal(#[from] RunFatalError),
}
