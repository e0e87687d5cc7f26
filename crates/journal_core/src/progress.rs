//! crates/journal_core/src/progress.rs
//!
//! Keeps each user's streak and entry counters up to date as entries are saved.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::UserProgress;
use crate::ports::{DatabaseService, PortResult};

/// How a new entry relates to the previous entry day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakStep {
    /// No earlier entry on record.
    First,
    /// Already wrote today; nothing changes.
    SameDay,
    /// Wrote yesterday; the streak continues.
    NextDay,
    /// At least one day was skipped; the streak restarts.
    AfterGap,
}

impl StreakStep {
    pub fn classify(last_entry_date: Option<NaiveDate>, today: NaiveDate) -> Self {
        match last_entry_date {
            None => Self::First,
            Some(last) if last == today => Self::SameDay,
            Some(last) if today.pred_opt() == Some(last) => Self::NextDay,
            Some(_) => Self::AfterGap,
        }
    }
}

/// Applies one entry on `today` to `progress`. Returns `false` when the entry was a same-day
/// duplicate and `progress` was left untouched.
pub fn apply_entry(progress: &mut UserProgress, today: NaiveDate) -> bool {
    progress.current_streak = match StreakStep::classify(progress.last_entry_date, today) {
        StreakStep::SameDay => return false,
        StreakStep::NextDay => progress.current_streak + 1,
        StreakStep::First | StreakStep::AfterGap => 1,
    };
    progress.longest_streak = progress.longest_streak.max(progress.current_streak);
    progress.last_entry_date = Some(today);
    progress.weekly_entry_count += 1;
    progress.total_entries += 1;
    true
}

pub struct ProgressTracker {
    db: Arc<dyn DatabaseService>,
    clock: Arc<dyn Clock>,
}

impl ProgressTracker {
    pub fn new(db: Arc<dyn DatabaseService>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Records an entry written today.
    pub async fn record_entry(&self, user_id: Uuid) -> PortResult<UserProgress> {
        self.record_entry_on(user_id, self.clock.today()).await
    }

    /// Records an entry written on `entry_date`, creating the progress record on first use.
    pub async fn record_entry_on(
        &self,
        user_id: Uuid,
        entry_date: NaiveDate,
    ) -> PortResult<UserProgress> {
        let mut progress = self
            .db
            .find_progress(user_id)
            .await?
            .unwrap_or_else(|| UserProgress::empty(user_id));

        if !apply_entry(&mut progress, entry_date) {
            debug!(%user_id, "Second entry today; progress unchanged.");
            return Ok(progress);
        }

        self.db.save_progress(&progress).await?;
        Ok(progress)
    }

    /// The stored progress, or an all-zero snapshot for users who never wrote.
    pub async fn snapshot(&self, user_id: Uuid) -> PortResult<UserProgress> {
        Ok(self
            .db
            .find_progress(user_id)
            .await?
            .unwrap_or_else(|| UserProgress::empty(user_id)))
    }
}
