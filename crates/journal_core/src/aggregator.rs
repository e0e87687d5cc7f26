//! crates/journal_core/src/aggregator.rs
//!
//! Read-only statistics over a user's trailing seven days of entries.

use chrono::{Duration, NaiveDate};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::{JournalEntry, WeeklyBaseData, NEUTRAL_MOOD};
use crate::ports::{DatabaseService, PortResult};

/// Length of the trailing window. The window is anchored at call time, not at a calendar week.
pub const WEEKLY_WINDOW_DAYS: i64 = 7;

pub struct WeeklyAggregator {
    db: Arc<dyn DatabaseService>,
    clock: Arc<dyn Clock>,
}

impl WeeklyAggregator {
    pub fn new(db: Arc<dyn DatabaseService>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Collects the entries in `[now - 7 days, now]` and derives the weekly statistics.
    pub async fn fetch_weekly_base_data(&self, user_id: Uuid) -> PortResult<WeeklyBaseData> {
        let now = self.clock.now();
        let week_ago = now - Duration::days(WEEKLY_WINDOW_DAYS);
        let entries = self.db.find_entries_between(user_id, week_ago, now).await?;
        Ok(summarize_entries(entries))
    }
}

pub fn summarize_entries(entries: Vec<JournalEntry>) -> WeeklyBaseData {
    if entries.is_empty() {
        return WeeklyBaseData::empty();
    }

    let days: HashSet<NaiveDate> = entries.iter().map(|e| e.date.date_naive()).collect();

    let daily_ai_summaries = entries
        .iter()
        .filter_map(|e| non_blank(e.ai_summary.as_deref()))
        .map(str::to_string)
        .collect();

    WeeklyBaseData {
        has_entries: true,
        days_written: days.len() as u32,
        daily_ai_summaries,
        dominant_mood: dominant_mood(&entries),
        entries,
    }
}

/// The most frequent non-blank mood. Ties go to the alphabetically first label so that the
/// same week always reports the same mood.
pub fn dominant_mood(entries: &[JournalEntry]) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for mood in entries.iter().filter_map(|e| non_blank(e.mood.as_deref())) {
        *counts.entry(mood).or_default() += 1;
    }

    // `max_by_key` keeps the last maximum, so walk the map in reverse.
    counts
        .into_iter()
        .rev()
        .max_by_key(|(_, count)| *count)
        .map(|(mood, _)| mood.to_string())
        .unwrap_or_else(|| NEUTRAL_MOOD.to_string())
}

/// Blankness is judged on the trimmed value, but the stored value is kept as written.
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::domain::NO_MOOD;
    use crate::testing::{at, entry, InMemoryDb};
    use std::sync::atomic::Ordering;

    fn moods(user_id: Uuid, moods: &[Option<&str>]) -> Vec<JournalEntry> {
        moods
            .iter()
            .map(|mood| entry(user_id, at(2026, 3, 9, 10), *mood))
            .collect()
    }

    #[test]
    fn most_frequent_mood_wins() {
        let user_id = Uuid::new_v4();
        let entries = moods(user_id, &[Some("Happy"), Some("Sad"), Some("Happy")]);
        assert_eq!(dominant_mood(&entries), "Happy");
    }

    #[test]
    fn blank_moods_fall_back_to_neutral() {
        let user_id = Uuid::new_v4();
        let entries = moods(user_id, &[None, Some(""), Some("   ")]);
        assert_eq!(dominant_mood(&entries), NEUTRAL_MOOD);
    }

    #[test]
    fn tied_moods_resolve_alphabetically() {
        let user_id = Uuid::new_v4();
        let entries = moods(user_id, &[Some("Sad"), Some("Calm"), Some("Sad"), Some("Calm")]);
        assert_eq!(dominant_mood(&entries), "Calm");
    }

    #[test]
    fn moods_and_summaries_keep_their_stored_text() {
        let user_id = Uuid::new_v4();
        let mut entries = moods(user_id, &[Some("Happy "), Some("Happy"), Some("Happy ")]);
        entries[0].ai_summary = Some(" Slept in. ".to_string());

        let base = summarize_entries(entries);

        assert_eq!(base.dominant_mood, "Happy ");
        assert_eq!(base.daily_ai_summaries[0], " Slept in. ");
    }

    #[test]
    fn counts_distinct_calendar_days() {
        let user_id = Uuid::new_v4();
        let mut entries = vec![
            entry(user_id, at(2026, 3, 9, 8), Some("Calm")),
            entry(user_id, at(2026, 3, 9, 22), Some("Calm")),
            entry(user_id, at(2026, 3, 11, 7), Some("Tired")),
        ];
        entries[1].ai_summary = Some("  ".to_string());
        entries[2].ai_summary = None;

        let base = summarize_entries(entries);

        assert!(base.has_entries);
        assert_eq!(base.days_written, 2);
        assert_eq!(base.daily_ai_summaries, vec!["A calm day.".to_string()]);
        assert_eq!(base.dominant_mood, "Calm");
        assert_eq!(base.entries.len(), 3);
    }

    #[tokio::test]
    async fn window_covers_the_trailing_seven_days_inclusive() {
        let db = Arc::new(InMemoryDb::new());
        let clock = Arc::new(FixedClock::new(at(2026, 3, 16, 9)));
        let user_id = Uuid::new_v4();
        db.insert_entry(entry(user_id, at(2026, 3, 9, 9), Some("Edge")));
        db.insert_entry(entry(user_id, at(2026, 3, 9, 8), Some("Stale")));
        db.insert_entry(entry(user_id, at(2026, 3, 12, 9), Some("Edge")));
        db.insert_entry(entry(Uuid::new_v4(), at(2026, 3, 12, 9), Some("Other")));

        let aggregator = WeeklyAggregator::new(db.clone(), clock);
        let base = aggregator.fetch_weekly_base_data(user_id).await.unwrap();

        assert_eq!(base.entries.len(), 2);
        assert_eq!(base.days_written, 2);
        assert_eq!(base.dominant_mood, "Edge");
    }

    #[tokio::test]
    async fn empty_window_reports_no_entries() {
        let db = Arc::new(InMemoryDb::new());
        let clock = Arc::new(FixedClock::new(at(2026, 3, 16, 9)));
        let aggregator = WeeklyAggregator::new(db, clock);

        let base = aggregator.fetch_weekly_base_data(Uuid::new_v4()).await.unwrap();

        assert!(!base.has_entries);
        assert_eq!(base.days_written, 0);
        assert_eq!(base.dominant_mood, NO_MOOD);
        assert!(base.daily_ai_summaries.is_empty());
    }

    #[tokio::test]
    async fn store_failure_is_surfaced() {
        let db = Arc::new(InMemoryDb::new());
        db.fail_entry_queries.store(true, Ordering::SeqCst);
        let aggregator = WeeklyAggregator::new(db, Arc::new(FixedClock::new(at(2026, 3, 16, 9))));

        assert!(aggregator.fetch_weekly_base_data(Uuid::new_v4()).await.is_err());
    }
}
