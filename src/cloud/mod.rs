// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Cloud Provider Access
 * Role delegation, bucket enumeration and provider error handling
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */
pub mod credentials;
pub mod enumerator;
pub mod error_handling;

// Re-exports
pub use credentials::{AssumedCredentials, CredentialBroker, StsCredentialBroker};
pub use enumerator::{EnumeratorFactory, ResourceEnumerator, S3Enumerator, S3EnumeratorFactory};
pub use error_handling::{
    classify_sdk_error, retry_with_backoff, CloudError, ExponentialBackoff, RetryConfig,
};
