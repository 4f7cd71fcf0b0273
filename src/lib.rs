// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Exposure Monitor Library
 * Scan pipeline for public S3 bucket exposure across customer accounts
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

pub mod cloud;
pub mod config;
pub mod database;
pub mod errors;
pub mod evaluator;
pub mod orchestrator;
pub mod scheduler;
pub mod search;
pub mod types;

pub use errors::{
    CredentialError, EnumerationError, IndexError, PersistenceError, RunFatalError, ScanError,
    SchedulerError, SignalFetchError,
};
pub use orchestrator::{OrchestratorConfig, RunOutcome, RunReport, RunState, ScanOrchestrator};
pub use types::{ExposureSignalSet, Finding, FindingType, ScanResult, Severity};
