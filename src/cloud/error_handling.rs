// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Cloud Error Handling
 * AWS error classification and bounded retry for provider calls
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Cloud-specific error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CloudError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Authorization failed: {0}")]
    AuthorizationError(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitError(String),

    #[error("Timeout occurred: {0}")]
    TimeoutError(String),

    #[error("Resource not found: {0}")]
    NotFoundError(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl CloudError {
    /// Classify an AWS error code returned by a service call
    pub fn from_code(code: &str, message: &str) -> Self {
        let detail = if message.is_empty() {
            code.to_string()
        } else {
            format!("{}: {}", code, message)
        };

        match code {
            "Throttling" | "ThrottlingException" | "SlowDown" | "TooManyRequests"
            | "TooManyRequestsException" | "RequestLimitExceeded" | "RequestThrottled"
            | "RequestThrottledException" | "ProvisionedThroughputExceededException" => {
                CloudError::RateLimitError(detail)
            }
            "RequestTimeout" | "RequestTimeoutException" => CloudError::TimeoutError(detail),
            "AccessDenied" | "AccessDeniedException" | "AllAccessDisabled"
            | "AuthorizationHeaderMalformed" => CloudError::AuthorizationError(detail),
            "InvalidAccessKeyId" | "InvalidClientTokenId" | "SignatureDoesNotMatch"
            | "ExpiredToken" | "ExpiredTokenException" | "UnrecognizedClientException" => {
                CloudError::AuthenticationError(detail)
            }
            "InternalError" | "InternalFailure" | "ServiceUnavailable" | "ServiceUnavailableException" => {
                CloudError::ApiError(detail)
            }
            "MalformedPolicyDocument" | "RegionDisabledException" | "PackedPolicyTooLarge"
            | "ValidationError" | "InvalidParameterValue" => CloudError::ConfigError(detail),
            _ if code.starts_with("NoSuch") || code.contains("NotFound") => {
                CloudError::NotFoundError(detail)
            }
            _ => CloudError::Unknown(detail),
        }
    }
}

/// Classify an SDK error into a `CloudError`
pub fn classify_sdk_error<E, R>(error: &SdkError<E, R>) -> CloudError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug + 'static,
{
    match error {
        SdkError::TimeoutError(_) => {
            CloudError::TimeoutError(DisplayErrorContext(error).to_string())
        }
        SdkError::DispatchFailure(_) => {
            CloudError::NetworkError(DisplayErrorContext(error).to_string())
        }
        SdkError::ServiceError(context) => {
            let err = context.err();
            match err.code() {
                Some(code) => CloudError::from_code(code, err.message().unwrap_or_default()),
                None => CloudError::ApiError(DisplayErrorContext(error).to_string()),
            }
        }
        SdkError::ResponseError(_) => CloudError::ApiError(DisplayErrorContext(error).to_string()),
        _ => CloudError::Unknown(DisplayErrorContext(error).to_string()),
    }
}

/// Retry configuration for cloud operations
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub retry_on_rate_limit: bool,
    pub retry_on_timeout: bool,
    pub retry_on_network_error: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 5000,
            backoff_multiplier: 2.0,
            retry_on_rate_limit: true,
            retry_on_timeout: true,
            retry_on_network_error: true,
        }
    }
}

/// Exponential backoff calculator
pub struct ExponentialBackoff {
    config: RetryConfig,
    current_retry: u32,
}

impl ExponentialBackoff {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            current_retry: 0,
        }
    }

    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self.current_retry >= self.config.max_retries {
            return None;
        }

        let backoff_ms = (self.config.initial_backoff_ms as f64
            * self.config.backoff_multiplier.powi(self.current_retry as i32))
            .min(self.config.max_backoff_ms as f64) as u64;

        self.current_retry += 1;

        Some(Duration::from_millis(backoff_ms))
    }

    pub fn attempts(&self) -> u32 {
        self.current_retry
    }

    /// Only transient failures are retried. Not-found and access-denied are final.
    pub fn should_retry(&self, error: &CloudError) -> bool {
        match error {
            CloudError::RateLimitError(_) => self.config.retry_on_rate_limit,
            CloudError::TimeoutError(_) => self.config.retry_on_timeout,
            CloudError::NetworkError(_) => self.config.retry_on_network_error,
            CloudError::ApiError(_) => true,
            _ => false,
        }
    }
}

/// Retry a cloud operation with exponential backoff
pub async fn retry_with_backoff<F, Fut, T>(
    operation: F,
    config: RetryConfig,
    operation_name: &str,
) -> Result<T, CloudError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, CloudError>>,
{
    let mut backoff = ExponentialBackoff::new(config);

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !backoff.should_retry(&e) {
                    debug!("{} failed with non-retryable error: {}", operation_name, e);
                    return Err(e);
                }

                match backoff.next_backoff() {
                    Some(delay) => {
                        warn!(
                            "{} failed (attempt {}): {}. Retrying in {:?}",
                            operation_name,
                            backoff.attempts(),
                            e,
                            delay
                        );
                        sleep(delay).await;
                    }
                    None => {
                        warn!(
                            "{} failed after {} retries: {}",
                            operation_name,
                            backoff.attempts(),
                            e
                        );
                        return Err(e);
                    }
                }
            }
        }
    }
}
