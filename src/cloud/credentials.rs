// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Credential Broker
 * Exchanges a customer role ARN for short-lived STS credentials
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::error_handling::{classify_sdk_error, retry_with_backoff, RetryConfig};
use crate::config::AwsConfig;
use crate::errors::CredentialError;

/// Temporary credentials scoped to one customer account
#[derive(Clone)]
pub struct AssumedCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for AssumedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssumedCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &"** redacted **")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[async_trait]
pub trait CredentialBroker: Send + Sync {
    async fn assume(
        &self,
        role_arn: &str,
        external_id: Option<&str>,
    ) -> Result<AssumedCredentials, CredentialError>;
}

/// STS AssumeRole broker
pub struct StsCredentialBroker {
    client: aws_sdk_sts::Client,
    session_name: String,
    session_duration_secs: i32,
    retry: RetryConfig,
}

impl StsCredentialBroker {
    pub fn new(sdk_config: &aws_config::SdkConfig, aws: &AwsConfig, retry: RetryConfig) -> Self {
        Self {
            client: aws_sdk_sts::Client::new(sdk_config),
            session_name: aws.role_session_name.clone(),
            session_duration_secs: aws.session_duration_secs,
            retry,
        }
    }
}

#[async_trait]
impl CredentialBroker for StsCredentialBroker {
    async fn assume(
        &self,
        role_arn: &str,
        external_id: Option<&str>,
    ) -> Result<AssumedCredentials, CredentialError> {
        debug!(role_arn, "Assuming customer role");

        let output = retry_with_backoff(
            move || async move {
                self.client
                    .assume_role()
                    .role_arn(role_arn)
                    .role_session_name(&self.session_name)
                    .set_external_id(external_id.map(str::to_string))
                    .duration_seconds(self.session_duration_secs)
                    .send()
                    .await
                    .map_err(|e| classify_sdk_error(&e))
            },
            self.retry.clone(),
            "sts:AssumeRole",
        )
        .await
        .map_err(|e| CredentialError::from_cloud(role_arn, e))?;

        let credentials = output
            .credentials()
            .ok_or_else(|| CredentialError::MissingCredentials {
                role_arn: role_arn.to_string(),
            })?;

        let expires_at = DateTime::from_timestamp(credentials.expiration().secs(), 0);

        info!(role_arn, expires_at = ?expires_at, "Assumed customer role");

        Ok(AssumedCredentials {
            access_key_id: credentials.access_key_id().to_string(),
            secret_access_key: credentials.secret_access_key().to_string(),
            session_token: credentials.session_token().to_string(),
            expires_at,
        })
    }
}
