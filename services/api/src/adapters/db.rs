//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc, Weekday};
use journal_core::domain::{
    DeliveryStatus, EntryAnalysis, JournalEntry, Trend, User, UserCredentials, UserPreferences, UserProgress,
    WeeklySummary,
};
use journal_core::ports::{DatabaseService, PortError, PortResult};
use journal_core::preferences::weekday_from_number;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn malformed(e: impl std::fmt::Display) -> PortError {
    PortError::Unexpected(format!("Malformed record: {}", e))
}

fn weekday_to_column(day: Weekday) -> i16 {
    day.number_from_monday() as i16
}

fn weekday_from_column(day: i16) -> PortResult<Weekday> {
    let day = u8::try_from(day).map_err(malformed)?;
    weekday_from_number(day).map_err(malformed)
}

fn count_from_column(value: i32) -> u32 {
    value.max(0) as u32
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const USER_COLUMNS: &str = "user_id, username, email, weekly_summary_enabled, weekly_summary_day, \
    email_notifications_enabled, last_weekly_summary_date";

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    username: String,
    email: Option<String>,
    weekly_summary_enabled: Option<bool>,
    weekly_summary_day: Option<i16>,
    email_notifications_enabled: Option<bool>,
    last_weekly_summary_date: Option<NaiveDate>,
}
impl UserRecord {
    fn to_domain(self) -> PortResult<User> {
        // Preferences only exist once both flags have been written.
        let preferences = match (self.weekly_summary_enabled, self.email_notifications_enabled) {
            (Some(weekly_summary_enabled), Some(email_notifications_enabled)) => {
                Some(UserPreferences {
                    weekly_summary_enabled,
                    weekly_summary_day: self
                        .weekly_summary_day
                        .map(weekday_from_column)
                        .transpose()?,
                    email_notifications_enabled,
                })
            }
            _ => None,
        };
        Ok(User {
            user_id: self.user_id,
            username: self.username,
            email: self.email,
            preferences,
            last_weekly_summary_date: self.last_weekly_summary_date,
        })
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    username: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            username: self.username,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct EntryRecord {
    id: Uuid,
    user_id: Uuid,
    title: Option<String>,
    content: String,
    entry_date: DateTime<Utc>,
    mood: Option<String>,
    sentiment_score: Option<f64>,
    ai_summary: Option<String>,
}
impl EntryRecord {
    fn to_domain(self) -> JournalEntry {
        JournalEntry {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            content: self.content,
            date: self.entry_date,
            mood: self.mood,
            sentiment_score: self.sentiment_score,
            ai_summary: self.ai_summary,
        }
    }
}

#[derive(FromRow)]
struct ProgressRecord {
    user_id: Uuid,
    current_streak: i32,
    longest_streak: i32,
    last_entry_date: Option<NaiveDate>,
    weekly_entry_count: i32,
    total_entries: i32,
}
impl ProgressRecord {
    fn to_domain(self) -> UserProgress {
        UserProgress {
            user_id: self.user_id,
            current_streak: count_from_column(self.current_streak),
            longest_streak: count_from_column(self.longest_streak),
            last_entry_date: self.last_entry_date,
            weekly_entry_count: count_from_column(self.weekly_entry_count),
            total_entries: count_from_column(self.total_entries),
        }
    }
}

const SUMMARY_COLUMNS: &str = "id, user_id, week_start_date, week_end_date, summary_type, \
    summary_text, mood, days_written, trend, suggestion, delivery_status, generated_at";

#[derive(FromRow)]
struct SummaryRecord {
    id: Uuid,
    user_id: Uuid,
    week_start_date: NaiveDate,
    week_end_date: NaiveDate,
    summary_type: String,
    summary_text: String,
    mood: String,
    days_written: i32,
    trend: Option<String>,
    suggestion: Option<String>,
    delivery_status: String,
    generated_at: DateTime<Utc>,
}
impl SummaryRecord {
    fn to_domain(self) -> PortResult<WeeklySummary> {
        Ok(WeeklySummary {
            id: self.id,
            user_id: self.user_id,
            week_start_date: self.week_start_date,
            week_end_date: self.week_end_date,
            summary_type: self.summary_type.parse().map_err(malformed)?,
            summary_text: self.summary_text,
            mood: self.mood,
            days_written: count_from_column(self.days_written),
            trend: self.trend.as_deref().map(str::parse::<Trend>).transpose().map_err(malformed)?,
            suggestion: self.suggestion,
            delivery_status: self.delivery_status.parse().map_err(malformed)?,
            generated_at: self.generated_at,
        })
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user(
        &self,
        username: &str,
        email: Option<&str>,
        hashed_password: &str,
        preferences: &UserPreferences,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "INSERT INTO users (user_id, username, email, hashed_password, weekly_summary_enabled, \
             weekly_summary_day, email_notifications_enabled) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(email)
        .bind(hashed_password)
        .bind(preferences.weekly_summary_enabled)
        .bind(preferences.weekly_summary_day.map(weekday_to_column))
        .bind(preferences.email_notifications_enabled)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                PortError::InvalidInput(format!("Username {} is already taken", username))
            }
            other => unexpected(other),
        })?;

        record.to_domain()
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE user_id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", user_id)),
            _ => unexpected(e),
        })?;

        record.to_domain()
    }

    async fn get_user_credentials(&self, username: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, username, hashed_password FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", username)),
            _ => unexpected(e),
        })?;

        Ok(record.to_domain())
    }

    async fn update_user_preferences(
        &self,
        user_id: Uuid,
        email: Option<&str>,
        preferences: &UserPreferences,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE users SET email = $1, weekly_summary_enabled = $2, weekly_summary_day = $3, \
             email_notifications_enabled = $4 WHERE user_id = $5",
        )
        .bind(email)
        .bind(preferences.weekly_summary_enabled)
        .bind(preferences.weekly_summary_day.map(weekday_to_column))
        .bind(preferences.email_notifications_enabled)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(())
    }

    async fn find_users_for_weekly_summary(&self, day: Weekday) -> PortResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users \
             WHERE weekly_summary_enabled = TRUE AND weekly_summary_day = $1 \
             ORDER BY username ASC",
            USER_COLUMNS
        ))
        .bind(weekday_to_column(day))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(UserRecord::to_domain).collect()
    }

    async fn set_last_weekly_summary_date(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> PortResult<()> {
        sqlx::query("UPDATE users SET last_weekly_summary_date = $1 WHERE user_id = $2")
            .bind(date)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn save_journal_entry(&self, entry: &JournalEntry) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO journal_entries \
             (id, user_id, title, content, entry_date, mood, sentiment_score, ai_summary) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(entry.id)
        .bind(entry.user_id)
        .bind(entry.title.as_deref())
        .bind(&entry.content)
        .bind(entry.date)
        .bind(entry.mood.as_deref())
        .bind(entry.sentiment_score)
        .bind(entry.ai_summary.as_deref())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn find_entries_between(
        &self,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> PortResult<Vec<JournalEntry>> {
        let records = sqlx::query_as::<_, EntryRecord>(
            "SELECT id, user_id, title, content, entry_date, mood, sentiment_score, ai_summary \
             FROM journal_entries \
             WHERE user_id = $1 AND entry_date >= $2 AND entry_date <= $3 \
             ORDER BY entry_date ASC",
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let entries = records.into_iter().map(|r| r.to_domain()).collect();
        Ok(entries)
    }

    async fn find_entries_for_user(&self, user_id: Uuid) -> PortResult<Vec<JournalEntry>> {
        let records = sqlx::query_as::<_, EntryRecord>(
            "SELECT id, user_id, title, content, entry_date, mood, sentiment_score, ai_summary \
             FROM journal_entries WHERE user_id = $1 ORDER BY entry_date DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn find_entry_by_id(&self, entry_id: Uuid) -> PortResult<Option<JournalEntry>> {
        let record = sqlx::query_as::<_, EntryRecord>(
            "SELECT id, user_id, title, content, entry_date, mood, sentiment_score, ai_summary \
             FROM journal_entries WHERE id = $1",
        )
        .bind(entry_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.map(|r| r.to_domain()))
    }

    async fn update_entry_analysis(
        &self,
        entry_id: Uuid,
        analysis: &EntryAnalysis,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE journal_entries SET mood = $2, ai_summary = $3, sentiment_score = $4 \
             WHERE id = $1",
        )
        .bind(entry_id)
        .bind(&analysis.mood)
        .bind(&analysis.summary)
        .bind(analysis.sentiment_score)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Entry {} not found", entry_id)));
        }
        Ok(())
    }

    async fn find_progress(&self, user_id: Uuid) -> PortResult<Option<UserProgress>> {
        let record = sqlx::query_as::<_, ProgressRecord>(
            "SELECT user_id, current_streak, longest_streak, last_entry_date, \
             weekly_entry_count, total_entries FROM user_progress WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.map(|r| r.to_domain()))
    }

    async fn save_progress(&self, progress: &UserProgress) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO user_progress \
             (user_id, current_streak, longest_streak, last_entry_date, weekly_entry_count, total_entries) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (user_id) DO UPDATE SET \
             current_streak = EXCLUDED.current_streak, \
             longest_streak = EXCLUDED.longest_streak, \
             last_entry_date = EXCLUDED.last_entry_date, \
             weekly_entry_count = EXCLUDED.weekly_entry_count, \
             total_entries = EXCLUDED.total_entries",
        )
        .bind(progress.user_id)
        .bind(progress.current_streak as i32)
        .bind(progress.longest_streak as i32)
        .bind(progress.last_entry_date)
        .bind(progress.weekly_entry_count as i32)
        .bind(progress.total_entries as i32)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn save_weekly_summary(&self, summary: &WeeklySummary) -> PortResult<()> {
        sqlx::query(&format!(
            "INSERT INTO weekly_summaries ({}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            SUMMARY_COLUMNS
        ))
        .bind(summary.id)
        .bind(summary.user_id)
        .bind(summary.week_start_date)
        .bind(summary.week_end_date)
        .bind(summary.summary_type.as_str())
        .bind(&summary.summary_text)
        .bind(&summary.mood)
        .bind(summary.days_written as i32)
        .bind(summary.trend.map(|t| t.as_str()))
        .bind(summary.suggestion.as_deref())
        .bind(summary.delivery_status.as_str())
        .bind(summary.generated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn update_delivery_status(
        &self,
        summary_id: Uuid,
        status: DeliveryStatus,
    ) -> PortResult<()> {
        let result = sqlx::query("UPDATE weekly_summaries SET delivery_status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(summary_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Summary {} not found", summary_id)));
        }
        Ok(())
    }

    async fn find_latest_weekly_summary(
        &self,
        user_id: Uuid,
    ) -> PortResult<Option<WeeklySummary>> {
        let record = sqlx::query_as::<_, SummaryRecord>(&format!(
            "SELECT {} FROM weekly_summaries WHERE user_id = $1 \
             ORDER BY generated_at DESC LIMIT 1",
            SUMMARY_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        record.map(SummaryRecord::to_domain).transpose()
    }

    async fn find_weekly_summaries_between(
        &self,
        user_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PortResult<Vec<WeeklySummary>> {
        let records = sqlx::query_as::<_, SummaryRecord>(&format!(
            "SELECT {} FROM weekly_summaries \
             WHERE user_id = $1 AND week_end_date >= $2 AND week_end_date <= $3 \
             ORDER BY generated_at DESC",
            SUMMARY_COLUMNS
        ))
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(SummaryRecord::to_domain).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use journal_core::domain::SummaryType;

    fn summary_record(summary_type: &str, trend: Option<&str>) -> SummaryRecord {
        SummaryRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            week_start_date: NaiveDate::from_ymd_opt(2026, 3, 9).unwrap(),
            week_end_date: NaiveDate::from_ymd_opt(2026, 3, 16).unwrap(),
            summary_type: summary_type.to_string(),
            summary_text: "A steady week.".to_string(),
            mood: "Calm".to_string(),
            days_written: 4,
            trend: trend.map(str::to_string),
            suggestion: Some("Rest.".to_string()),
            delivery_status: "SENT".to_string(),
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn summary_record_maps_tags_to_variants() {
        let summary = summary_record("AI_REFLECTION", Some("MIXED")).to_domain().unwrap();

        assert_eq!(summary.summary_type, SummaryType::AiReflection);
        assert_eq!(summary.trend, Some(Trend::Mixed));
        assert_eq!(summary.delivery_status, DeliveryStatus::Sent);
        assert_eq!(summary.days_written, 4);
    }

    #[test]
    fn unknown_tag_is_a_malformed_record() {
        let err = summary_record("WEEKLY", None).to_domain().unwrap_err();
        assert!(matches!(err, PortError::Unexpected(msg) if msg.contains("WEEKLY")));
    }

    #[test]
    fn preferences_need_both_flags() {
        let record = UserRecord {
            user_id: Uuid::new_v4(),
            username: "ana".to_string(),
            email: None,
            weekly_summary_enabled: Some(true),
            weekly_summary_day: Some(3),
            email_notifications_enabled: None,
            last_weekly_summary_date: None,
        };
        assert_eq!(record.to_domain().unwrap().preferences, None);

        let record = UserRecord {
            user_id: Uuid::new_v4(),
            username: "ana".to_string(),
            email: None,
            weekly_summary_enabled: Some(true),
            weekly_summary_day: Some(3),
            email_notifications_enabled: Some(false),
            last_weekly_summary_date: None,
        };
        let preferences = record.to_domain().unwrap().preferences.unwrap();
        assert_eq!(preferences.weekly_summary_day, Some(Weekday::Wed));
    }

    #[test]
    fn weekday_columns_are_monday_first() {
        assert_eq!(weekday_to_column(Weekday::Mon), 1);
        assert_eq!(weekday_to_column(Weekday::Sun), 7);
        assert_eq!(weekday_from_column(7).unwrap(), Weekday::Sun);
        assert!(weekday_from_column(0).is_err());
        assert!(weekday_from_column(-2).is_err());
    }
}
