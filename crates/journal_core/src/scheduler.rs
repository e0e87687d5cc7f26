//! crates/journal_core/src/scheduler.rs
//!
//! Periodic selection of users whose weekly summary is due today.

use chrono::Datelike;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::clock::Clock;
use crate::orchestrator::{GenerationOutcome, SummaryOrchestrator};
use crate::ports::{DatabaseService, PortResult};

/// Tally of one scheduler pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub eligible: usize,
    pub generated: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct EligibilityScheduler {
    db: Arc<dyn DatabaseService>,
    orchestrator: Arc<SummaryOrchestrator>,
    clock: Arc<dyn Clock>,
}

impl EligibilityScheduler {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        orchestrator: Arc<SummaryOrchestrator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            orchestrator,
            clock,
        }
    }

    /// Runs the orchestrator for every user due today. A failure for one user is logged and
    /// does not stop the rest of the batch; only failing to list users is returned.
    pub async fn run_once(&self) -> PortResult<BatchReport> {
        let today = self.clock.today().weekday();
        let users = self.db.find_users_for_weekly_summary(today).await?;
        info!(
            "Weekly summary run: {} users eligible for {}",
            users.len(),
            today
        );

        let mut report = BatchReport {
            eligible: users.len(),
            ..BatchReport::default()
        };
        for user in &users {
            match self.orchestrator.generate_weekly_summary(user).await {
                Ok(GenerationOutcome::Generated(_)) => report.generated += 1,
                Ok(GenerationOutcome::AlreadyGenerated | GenerationOutcome::InProgress) => {
                    report.skipped += 1
                }
                Err(e) => {
                    error!(
                        user_id = %user.user_id,
                        "Failed to generate weekly summary for {}: {}",
                        user.username,
                        e
                    );
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Calls [`run_once`](Self::run_once) every `period` until `shutdown` is cancelled.
    /// The first pass runs immediately.
    pub async fn run_periodically(&self, period: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Weekly summary scheduler stopped.");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!("Weekly summary run could not list users: {}", e);
                    }
                }
            }
        }
    }
}
