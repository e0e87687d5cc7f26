//! crates/journal_core/src/entries.rs
//!
//! Saving a new journal entry (optional analysis, persistence, then progress tracking),
//! reading a user's entries back, and re-running analysis on a stored entry.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::{JournalEntry, UserProgress};
use crate::ports::{DatabaseService, EntryAnalysisService, PortError, PortResult};
use crate::progress::ProgressTracker;

/// What a user submits when writing an entry.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub title: Option<String>,
    pub content: String,
}

pub struct EntryRecorder {
    db: Arc<dyn DatabaseService>,
    analysis: Arc<dyn EntryAnalysisService>,
    progress: ProgressTracker,
    clock: Arc<dyn Clock>,
}

impl EntryRecorder {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        analysis: Arc<dyn EntryAnalysisService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            progress: ProgressTracker::new(db.clone(), clock.clone()),
            db,
            analysis,
            clock,
        }
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// Stores the entry dated now and advances the user's progress.
    ///
    /// Analysis is best effort: when it fails the entry is saved without mood, sentiment
    /// or summary.
    pub async fn record(
        &self,
        user_id: Uuid,
        new_entry: NewEntry,
    ) -> PortResult<(JournalEntry, UserProgress)> {
        let mut entry = JournalEntry {
            id: Uuid::new_v4(),
            user_id,
            title: new_entry
                .title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            content: new_entry.content,
            date: self.clock.now(),
            mood: None,
            sentiment_score: None,
            ai_summary: None,
        };

        if entry.content.trim().is_empty() {
            if entry.title.is_none() {
                return Err(PortError::InvalidInput(
                    "An entry needs a title or some content".to_string(),
                ));
            }
        } else {
            match self.analysis.analyze_entry(&entry.content).await {
                Ok(analysis) => {
                    entry.mood = Some(analysis.mood);
                    entry.sentiment_score = Some(analysis.sentiment_score);
                    entry.ai_summary = Some(analysis.summary);
                }
                Err(e) => warn!(%user_id, "Entry analysis failed, saving without it: {}", e),
            }
        }

        self.db.save_journal_entry(&entry).await?;
        let progress = self.progress.record_entry_on(user_id, entry.date.date_naive()).await?;
        Ok((entry, progress))
    }

    /// All entries of `user_id`, newest first.
    pub async fn list(&self, user_id: Uuid) -> PortResult<Vec<JournalEntry>> {
        self.db.find_entries_for_user(user_id).await
    }

    /// One entry of `user_id`. Entries owned by someone else are reported as missing.
    pub async fn find(&self, user_id: Uuid, entry_id: Uuid) -> PortResult<JournalEntry> {
        self.db
            .find_entry_by_id(entry_id)
            .await?
            .filter(|entry| entry.user_id == user_id)
            .ok_or_else(|| PortError::NotFound(format!("Entry {} not found", entry_id)))
    }

    /// Runs analysis again on a stored entry and saves the new mood, summary and score.
    ///
    /// Unlike [`record`](Self::record), an analysis failure here is returned to the caller.
    pub async fn reanalyze(&self, user_id: Uuid, entry_id: Uuid) -> PortResult<JournalEntry> {
        let mut entry = self.find(user_id, entry_id).await?;
        if entry.content.trim().is_empty() {
            return Err(PortError::InvalidInput(
                "Entry has no content to analyse".to_string(),
            ));
        }

        let analysis = self.analysis.analyze_entry(&entry.content).await?;
        self.db.update_entry_analysis(entry_id, &analysis).await?;
        info!(%user_id, %entry_id, mood = %analysis.mood, "Entry re-analysed.");

        entry.mood = Some(analysis.mood);
        entry.ai_summary = Some(analysis.summary);
        entry.sentiment_score = Some(analysis.sentiment_score);
        Ok(entry)
    }
}
