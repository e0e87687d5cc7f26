//! crates/journal_core/src/orchestrator.rs
//!
//! The weekly summary workflow: idempotency gate, aggregation, strategy selection,
//! persistence, idempotency marker and delivery, strictly in that order.

use chrono::Duration;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

use crate::aggregator::{WeeklyAggregator, WEEKLY_WINDOW_DAYS};
use crate::clock::Clock;
use crate::delivery::DeliveryGate;
use crate::domain::{DeliveryStatus, User, WeeklySummary};
use crate::ports::{DatabaseService, NotificationService, PortResult, WeeklyReflectionService};
use crate::reflection::compose_reflection;

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    /// The user already has a summary dated today.
    AlreadyGenerated,
    /// Another run for the same user is in flight in this process.
    InProgress,
    Generated(WeeklySummary),
}

impl GenerationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyGenerated => "ALREADY_GENERATED",
            Self::InProgress => "IN_PROGRESS",
            Self::Generated(_) => "GENERATED",
        }
    }
}

pub struct SummaryOrchestrator {
    db: Arc<dyn DatabaseService>,
    aggregator: WeeklyAggregator,
    reflection: Arc<dyn WeeklyReflectionService>,
    delivery: DeliveryGate,
    clock: Arc<dyn Clock>,
    in_flight: Mutex<HashSet<Uuid>>,
}

/// Holds a user's slot in the in-flight set until dropped.
struct RunClaim<'a> {
    in_flight: &'a Mutex<HashSet<Uuid>>,
    user_id: Uuid,
}

impl Drop for RunClaim<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.user_id);
    }
}

impl SummaryOrchestrator {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        reflection: Arc<dyn WeeklyReflectionService>,
        notifier: Arc<dyn NotificationService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            aggregator: WeeklyAggregator::new(db.clone(), clock.clone()),
            delivery: DeliveryGate::new(db.clone(), notifier),
            db,
            reflection,
            clock,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    fn claim(&self, user_id: Uuid) -> Option<RunClaim<'_>> {
        let inserted = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(user_id);
        inserted.then_some(RunClaim {
            in_flight: &self.in_flight,
            user_id,
        })
    }

    /// Generates, stores and possibly emails this week's summary for `user`.
    ///
    /// Failures before the summary is stored leave the idempotency marker unset, so a later
    /// run on the same day can try again. A delivery failure is returned after the summary
    /// and the marker have been written.
    pub async fn generate_weekly_summary(&self, user: &User) -> PortResult<GenerationOutcome> {
        let now = self.clock.now();
        let today = now.date_naive();
        let user_id = user.user_id;

        if user.last_weekly_summary_date == Some(today) {
            debug!(%user_id, "Weekly summary already generated today.");
            return Ok(GenerationOutcome::AlreadyGenerated);
        }

        let Some(_claim) = self.claim(user_id) else {
            debug!(%user_id, "Weekly summary run already in progress.");
            return Ok(GenerationOutcome::InProgress);
        };

        // A run that finished between the caller's read and our claim has already set the
        // marker, so check the stored user again.
        let stored = self.db.get_user_by_id(user_id).await?;
        if stored.last_weekly_summary_date == Some(today) {
            debug!(%user_id, "Weekly summary generated by a concurrent run.");
            return Ok(GenerationOutcome::AlreadyGenerated);
        }

        let base = self.aggregator.fetch_weekly_base_data(user_id).await?;
        let reflection = compose_reflection(&base, self.reflection.as_ref()).await;

        let mut summary = WeeklySummary {
            id: Uuid::new_v4(),
            user_id,
            week_start_date: today - Duration::days(WEEKLY_WINDOW_DAYS),
            week_end_date: today,
            summary_type: reflection.summary_type,
            summary_text: reflection.summary_text,
            mood: reflection.mood,
            days_written: reflection.days_written,
            trend: reflection.trend,
            suggestion: reflection.suggestion,
            delivery_status: DeliveryStatus::DashboardOnly,
            generated_at: now,
        };

        self.db.save_weekly_summary(&summary).await?;
        self.db.set_last_weekly_summary_date(user_id, today).await?;
        info!(
            %user_id,
            summary_type = %summary.summary_type,
            days_written = summary.days_written,
            "Weekly summary generated."
        );

        let user = User {
            last_weekly_summary_date: Some(today),
            ..stored
        };
        self.delivery.deliver_if_eligible(&user, &mut summary).await?;

        Ok(GenerationOutcome::Generated(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::domain::{SummaryType, Trend, UserPreferences, NO_MOOD};
    use crate::testing::{at, date, entry, user_with, InMemoryDb, RecordingNotifier, StubReflection};
    use std::sync::atomic::Ordering;

    struct Harness {
        db: Arc<InMemoryDb>,
        reflection: Arc<StubReflection>,
        notifier: Arc<RecordingNotifier>,
        clock: Arc<FixedClock>,
        orchestrator: SummaryOrchestrator,
    }

    fn harness() -> Harness {
        let db = Arc::new(InMemoryDb::new());
        let reflection = Arc::new(StubReflection::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let clock = Arc::new(FixedClock::new(at(2026, 3, 16, 9)));
        let orchestrator =
            SummaryOrchestrator::new(db.clone(), reflection.clone(), notifier.clone(), clock.clone());
        Harness {
            db,
            reflection,
            notifier,
            clock,
            orchestrator,
        }
    }

    fn stored_user(db: &InMemoryDb, email_opt_in: bool) -> User {
        let preferences = UserPreferences {
            weekly_summary_enabled: true,
            weekly_summary_day: Some(chrono::Weekday::Mon),
            email_notifications_enabled: email_opt_in,
        };
        let user = user_with(Some(preferences), Some("ana@example.com"));
        db.insert_user(user.clone());
        user
    }

    fn write_week(db: &InMemoryDb, user_id: Uuid, moods: &[(u32, &str)]) {
        for (day, mood) in moods {
            db.insert_entry(entry(user_id, at(2026, 3, *day, 12), Some(mood)));
        }
    }

    fn generated(outcome: GenerationOutcome) -> WeeklySummary {
        match outcome {
            GenerationOutcome::Generated(summary) => summary,
            other => panic!("expected a generated summary, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn second_run_on_the_same_day_is_a_no_op() {
        let h = harness();
        let user = stored_user(&h.db, false);
        write_week(&h.db, user.user_id, &[(10, "Happy")]);

        let first = h.orchestrator.generate_weekly_summary(&user).await.unwrap();
        let reloaded = h.db.user(user.user_id);
        let second = h.orchestrator.generate_weekly_summary(&reloaded).await.unwrap();

        assert!(matches!(first, GenerationOutcome::Generated(_)));
        assert_eq!(second, GenerationOutcome::AlreadyGenerated);
        assert_eq!(h.db.summaries().len(), 1);
        assert_eq!(h.reflection.call_count(), 1);
    }

    #[tokio::test]
    async fn stale_snapshot_does_not_generate_twice() {
        let h = harness();
        let user = stored_user(&h.db, false);

        h.orchestrator.generate_weekly_summary(&user).await.unwrap();
        // `user` still carries the marker from before the first run.
        let second = h.orchestrator.generate_weekly_summary(&user).await.unwrap();

        assert_eq!(second, GenerationOutcome::AlreadyGenerated);
        assert_eq!(h.db.summaries().len(), 1);
    }

    #[tokio::test]
    async fn next_day_generates_again() {
        let h = harness();
        let user = stored_user(&h.db, false);

        h.orchestrator.generate_weekly_summary(&user).await.unwrap();
        h.clock.advance(Duration::days(1));
        let reloaded = h.db.user(user.user_id);
        let outcome = h.orchestrator.generate_weekly_summary(&reloaded).await.unwrap();

        assert!(matches!(outcome, GenerationOutcome::Generated(_)));
        assert_eq!(h.db.summaries().len(), 2);
        assert_eq!(h.db.user(user.user_id).last_weekly_summary_date, Some(date(2026, 3, 17)));
    }

    #[tokio::test]
    async fn empty_week_stores_motivation_and_sets_marker() {
        let h = harness();
        let user = stored_user(&h.db, false);

        let summary = generated(h.orchestrator.generate_weekly_summary(&user).await.unwrap());

        assert_eq!(summary.summary_type, SummaryType::Motivation);
        assert_eq!(summary.days_written, 0);
        assert_eq!(summary.mood, NO_MOOD);
        assert_eq!(summary.week_start_date, date(2026, 3, 9));
        assert_eq!(summary.week_end_date, date(2026, 3, 16));
        assert_eq!(summary.generated_at, at(2026, 3, 16, 9));
        assert_eq!(h.db.summaries(), vec![summary]);
        assert_eq!(h.db.user(user.user_id).last_weekly_summary_date, Some(date(2026, 3, 16)));
        assert_eq!(h.reflection.call_count(), 0);
    }

    #[tokio::test]
    async fn ai_reflection_is_stored_with_trend_and_suggestion() {
        let h = harness();
        let user = stored_user(&h.db, false);
        write_week(&h.db, user.user_id, &[(10, "Happy"), (11, "Sad"), (13, "Happy")]);

        let summary = generated(h.orchestrator.generate_weekly_summary(&user).await.unwrap());

        assert_eq!(summary.summary_type, SummaryType::AiReflection);
        assert_eq!(summary.trend, Some(Trend::Improving));
        assert!(summary.suggestion.is_some());
        assert_eq!(summary.days_written, 3);
        assert_eq!(summary.mood, "Happy");
        let signal = h.reflection.signals.lock().unwrap()[0].clone();
        assert!(signal.starts_with("User wrote 3 entries last week.\n"));
    }

    #[tokio::test]
    async fn ai_failure_falls_back_to_statistical_text() {
        let h = harness();
        h.reflection.fail.store(true, Ordering::SeqCst);
        let user = stored_user(&h.db, false);
        write_week(&h.db, user.user_id, &[(10, "Happy"), (11, "Sad"), (13, "Happy")]);

        let summary = generated(h.orchestrator.generate_weekly_summary(&user).await.unwrap());

        assert_eq!(summary.summary_type, SummaryType::Summary);
        assert_eq!(
            summary.summary_text,
            "You wrote on 3 days this week. Your overall mood was mostly Happy."
        );
        assert_eq!(summary.trend, None);
        assert_eq!(summary.suggestion, None);
        assert_eq!(h.reflection.call_count(), 1);
    }

    #[tokio::test]
    async fn aggregation_failure_leaves_marker_unset() {
        let h = harness();
        let user = stored_user(&h.db, false);
        h.db.fail_entry_queries.store(true, Ordering::SeqCst);

        assert!(h.orchestrator.generate_weekly_summary(&user).await.is_err());
        assert!(h.db.summaries().is_empty());
        assert_eq!(h.db.user(user.user_id).last_weekly_summary_date, None);

        h.db.fail_entry_queries.store(false, Ordering::SeqCst);
        let retry = h.orchestrator.generate_weekly_summary(&user).await.unwrap();
        assert!(matches!(retry, GenerationOutcome::Generated(_)));
    }

    #[tokio::test]
    async fn persistence_failure_leaves_marker_unset() {
        let h = harness();
        let user = stored_user(&h.db, false);
        h.db.fail_summary_saves.store(true, Ordering::SeqCst);

        assert!(h.orchestrator.generate_weekly_summary(&user).await.is_err());
        assert_eq!(h.db.user(user.user_id).last_weekly_summary_date, None);
    }

    #[tokio::test]
    async fn opted_in_user_receives_email_and_summary_is_sent() {
        let h = harness();
        let user = stored_user(&h.db, true);
        write_week(&h.db, user.user_id, &[(12, "Calm")]);

        let summary = generated(h.orchestrator.generate_weekly_summary(&user).await.unwrap());

        assert_eq!(summary.delivery_status, DeliveryStatus::Sent);
        assert_eq!(h.db.summaries()[0].delivery_status, DeliveryStatus::Sent);
        assert_eq!(h.notifier.sent().len(), 1);
        assert_eq!(h.notifier.sent()[0].body, summary.summary_text);
    }

    #[tokio::test]
    async fn delivery_failure_keeps_summary_and_marker() {
        let h = harness();
        h.notifier.fail.store(true, Ordering::SeqCst);
        let user = stored_user(&h.db, true);

        assert!(h.orchestrator.generate_weekly_summary(&user).await.is_err());

        let stored = h.db.summaries();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].delivery_status, DeliveryStatus::DashboardOnly);
        assert_eq!(h.db.user(user.user_id).last_weekly_summary_date, Some(date(2026, 3, 16)));
    }

    #[tokio::test]
    async fn concurrent_trigger_for_same_user_reports_in_progress() {
        let h = harness();
        let user = stored_user(&h.db, false);

        let claim = h.orchestrator.claim(user.user_id).unwrap();
        let outcome = h.orchestrator.generate_weekly_summary(&user).await.unwrap();
        assert_eq!(outcome, GenerationOutcome::InProgress);
        assert!(h.db.summaries().is_empty());

        drop(claim);
        let outcome = h.orchestrator.generate_weekly_summary(&user).await.unwrap();
        assert!(matches!(outcome, GenerationOutcome::Generated(_)));
    }
}
