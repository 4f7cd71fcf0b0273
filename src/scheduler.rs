// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Scan Scheduler
 * Periodic tick source and on-demand trigger channel for the orchestrator
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use futures::{Stream, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::errors::{RunFatalError, SchedulerError};
use crate::orchestrator::{RunOutcome, ScanOrchestrator};

const REQUEST_BUFFER: usize = 16;

struct ScanRequest {
    respond_to: oneshot::Sender<Result<RunOutcome, RunFatalError>>,
}

/// Cloneable handle for on-demand scans
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<ScanRequest>,
}

impl SchedulerHandle {
    /// Request a scan and wait for its outcome. Returns `Coalesced` when a
    /// run was already active.
    pub async fn request_scan(&self) -> Result<RunOutcome, SchedulerError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(ScanRequest { respond_to })
            .await
            .map_err(|_| SchedulerError::Closed)?;

        let outcome = response.await.map_err(|_| SchedulerError::Closed)?;
        Ok(outcome?)
    }

    /// Request one scan per trigger, waiting for each outcome, until the
    /// stream ends or the scheduler stops. Returns the number of requests sent.
    pub async fn serve_triggers<S>(&self, triggers: S) -> usize
    where
        S: Stream<Item = ()>,
    {
        tokio::pin!(triggers);
        let mut requested = 0;

        while triggers.next().await.is_some() {
            requested += 1;
            match self.request_scan().await {
                Ok(RunOutcome::Completed(report)) => info!(
                    run_id = %report.run_id,
                    buckets_scanned = report.buckets_scanned,
                    "On-demand scan completed"
                ),
                Ok(RunOutcome::Coalesced) => info!("On-demand scan folded into the active run"),
                Err(SchedulerError::Closed) => {
                    warn!("Scheduler stopped, ignoring further scan triggers");
                    break;
                }
                Err(e) => error!("On-demand scan failed: {}", e),
            }
        }

        requested
    }
}

pub struct Scheduler {
    orchestrator: Arc<ScanOrchestrator>,
    interval: Duration,
    receiver: mpsc::Receiver<ScanRequest>,
}

impl Scheduler {
    pub fn new(orchestrator: Arc<ScanOrchestrator>, interval: Duration) -> (Self, SchedulerHandle) {
        let (sender, receiver) = mpsc::channel(REQUEST_BUFFER);
        let scheduler = Self {
            orchestrator,
            interval,
            receiver,
        };
        (scheduler, SchedulerHandle { sender })
    }

    /// Drive ticks and requests until `shutdown` resolves. The first tick
    /// fires immediately.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(interval_secs = self.interval.as_secs(), "Scheduler started");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Scheduler shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let orchestrator = Arc::clone(&self.orchestrator);
                    tokio::spawn(async move {
                        match orchestrator.run_full_scan().await {
                            Ok(RunOutcome::Completed(report)) => {
                                if report.timed_out {
                                    warn!(run_id = %report.run_id, "Scheduled scan timed out");
                                }
                            }
                            Ok(RunOutcome::Coalesced) => {}
                            Err(e) => error!("Scheduled scan failed: {}", e),
                        }
                    });
                }
                Some(request) = self.receiver.recv() => {
                    let orchestrator = Arc::clone(&self.orchestrator);
                    tokio::spawn(async move {
                        let outcome = orchestrator.run_full_scan().await;
                        let _ = request.respond_to.send(outcome);
                    });
                }
            }
        }
    }
}
