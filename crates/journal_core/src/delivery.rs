//! crates/journal_core/src/delivery.rs
//!
//! Decides whether a weekly summary is emailed and records the one-way move to `Sent`.

use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::{DeliveryStatus, User, WeeklySummary};
use crate::ports::{DatabaseService, NotificationService, PortResult};

pub const WEEKLY_SUMMARY_SUBJECT: &str = "Your Weekly Journal Summary";

/// Why a summary was not emailed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoPreferences,
    EmailNotificationsDisabled,
    AlreadySent,
    NoEmailAddress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    Skipped(SkipReason),
}

/// Returns the address to send to, or why the summary must stay on the dashboard.
pub fn eligible_address<'a>(user: &'a User, summary: &WeeklySummary) -> Result<&'a str, SkipReason> {
    let preferences = user.preferences.as_ref().ok_or(SkipReason::NoPreferences)?;
    if !preferences.email_notifications_enabled {
        return Err(SkipReason::EmailNotificationsDisabled);
    }
    if summary.delivery_status == DeliveryStatus::Sent {
        return Err(SkipReason::AlreadySent);
    }
    user.deliverable_email().ok_or(SkipReason::NoEmailAddress)
}

pub struct DeliveryGate {
    db: Arc<dyn DatabaseService>,
    notifier: Arc<dyn NotificationService>,
}

impl DeliveryGate {
    pub fn new(db: Arc<dyn DatabaseService>, notifier: Arc<dyn NotificationService>) -> Self {
        Self { db, notifier }
    }

    /// Emails the summary when the user is eligible, then marks it `Sent`.
    ///
    /// A send failure is returned as-is and leaves the summary `DashboardOnly`.
    pub async fn deliver_if_eligible(
        &self,
        user: &User,
        summary: &mut WeeklySummary,
    ) -> PortResult<DeliveryOutcome> {
        let address = match eligible_address(user, summary) {
            Ok(address) => address,
            Err(reason) => {
                debug!(user_id = %user.user_id, ?reason, "Weekly summary kept on dashboard.");
                return Ok(DeliveryOutcome::Skipped(reason));
            }
        };

        self.notifier
            .send(address, WEEKLY_SUMMARY_SUBJECT, &summary.summary_text)
            .await?;

        summary.delivery_status = DeliveryStatus::Sent;
        self.db
            .update_delivery_status(summary.id, DeliveryStatus::Sent)
            .await?;
        info!(user_id = %user.user_id, summary_id = %summary.id, "Weekly summary emailed.");
        Ok(DeliveryOutcome::Sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SummaryType, UserPreferences};
    use crate::testing::{at, date, user_with, InMemoryDb, RecordingNotifier};
    use std::sync::atomic::Ordering;
    use uuid::Uuid;

    fn opted_in() -> UserPreferences {
        UserPreferences {
            email_notifications_enabled: true,
            ..UserPreferences::default()
        }
    }

    fn stored_summary(db: &InMemoryDb, user: &User) -> WeeklySummary {
        let summary = WeeklySummary {
            id: Uuid::new_v4(),
            user_id: user.user_id,
            week_start_date: date(2026, 3, 2),
            week_end_date: date(2026, 3, 9),
            summary_type: SummaryType::Summary,
            summary_text: "You wrote on 2 days this week. Your overall mood was mostly Calm."
                .to_string(),
            mood: "Calm".to_string(),
            days_written: 2,
            trend: None,
            suggestion: None,
            delivery_status: DeliveryStatus::DashboardOnly,
            generated_at: at(2026, 3, 9, 9),
        };
        db.insert_summary(summary.clone());
        summary
    }

    fn gate() -> (Arc<InMemoryDb>, Arc<RecordingNotifier>, DeliveryGate) {
        let db = Arc::new(InMemoryDb::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let gate = DeliveryGate::new(db.clone(), notifier.clone());
        (db, notifier, gate)
    }

    #[tokio::test]
    async fn eligible_summary_is_sent_once() {
        let (db, notifier, gate) = gate();
        let user = user_with(Some(opted_in()), Some("ana@example.com"));
        let mut summary = stored_summary(&db, &user);

        let first = gate.deliver_if_eligible(&user, &mut summary).await.unwrap();
        let second = gate.deliver_if_eligible(&user, &mut summary).await.unwrap();

        assert_eq!(first, DeliveryOutcome::Sent);
        assert_eq!(second, DeliveryOutcome::Skipped(SkipReason::AlreadySent));
        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ana@example.com");
        assert_eq!(sent[0].subject, WEEKLY_SUMMARY_SUBJECT);
        assert_eq!(sent[0].body, summary.summary_text);
        assert_eq!(db.summaries()[0].delivery_status, DeliveryStatus::Sent);
    }

    #[tokio::test]
    async fn opted_out_user_stays_on_dashboard() {
        let (db, notifier, gate) = gate();
        let user = user_with(Some(UserPreferences::default()), Some("ana@example.com"));
        let mut summary = stored_summary(&db, &user);

        let outcome = gate.deliver_if_eligible(&user, &mut summary).await.unwrap();

        assert_eq!(
            outcome,
            DeliveryOutcome::Skipped(SkipReason::EmailNotificationsDisabled)
        );
        assert!(notifier.sent().is_empty());
        assert_eq!(db.summaries()[0].delivery_status, DeliveryStatus::DashboardOnly);
    }

    #[tokio::test]
    async fn missing_preferences_or_address_skip_delivery() {
        let (db, notifier, gate) = gate();

        let no_prefs = user_with(None, Some("ana@example.com"));
        let mut summary = stored_summary(&db, &no_prefs);
        assert_eq!(
            gate.deliver_if_eligible(&no_prefs, &mut summary).await.unwrap(),
            DeliveryOutcome::Skipped(SkipReason::NoPreferences)
        );

        let blank_email = user_with(Some(opted_in()), Some("  "));
        let mut summary = stored_summary(&db, &blank_email);
        assert_eq!(
            gate.deliver_if_eligible(&blank_email, &mut summary).await.unwrap(),
            DeliveryOutcome::Skipped(SkipReason::NoEmailAddress)
        );

        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn send_failure_keeps_dashboard_only() {
        let (db, notifier, gate) = gate();
        notifier.fail.store(true, Ordering::SeqCst);
        let user = user_with(Some(opted_in()), Some("ana@example.com"));
        let mut summary = stored_summary(&db, &user);

        assert!(gate.deliver_if_eligible(&user, &mut summary).await.is_err());
        assert_eq!(summary.delivery_status, DeliveryStatus::DashboardOnly);
        assert_eq!(db.summaries()[0].delivery_status, DeliveryStatus::DashboardOnly);
    }
}
