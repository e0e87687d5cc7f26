//! crates/journal_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc, Weekday};
use uuid::Uuid;

use crate::domain::{
    DeliveryStatus, EntryAnalysis, JournalEntry, User, UserCredentials, UserPreferences,
    UserProgress, WeeklyAiReflection, WeeklySummary,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    async fn create_user(
        &self,
        username: &str,
        email: Option<&str>,
        hashed_password: &str,
        preferences: &UserPreferences,
    ) -> PortResult<User>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    async fn get_user_credentials(&self, username: &str) -> PortResult<UserCredentials>;

    /// Replaces the stored email and preferences of a user.
    async fn update_user_preferences(
        &self,
        user_id: Uuid,
        email: Option<&str>,
        preferences: &UserPreferences,
    ) -> PortResult<()>;

    /// Users with weekly summaries enabled whose chosen day is `day`.
    async fn find_users_for_weekly_summary(&self, day: Weekday) -> PortResult<Vec<User>>;

    async fn set_last_weekly_summary_date(&self, user_id: Uuid, date: NaiveDate)
        -> PortResult<()>;

    // --- Auth Methods ---
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Journal Entries ---
    async fn save_journal_entry(&self, entry: &JournalEntry) -> PortResult<()>;

    /// Entries of a user dated within `[from, to]`, both ends inclusive.
    async fn find_entries_between(
        &self,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> PortResult<Vec<JournalEntry>>;

    /// Every entry of a user, newest first.
    async fn find_entries_for_user(&self, user_id: Uuid) -> PortResult<Vec<JournalEntry>>;

    async fn find_entry_by_id(&self, entry_id: Uuid) -> PortResult<Option<JournalEntry>>;

    /// Overwrites the mood, summary and sentiment score of an entry.
    async fn update_entry_analysis(
        &self,
        entry_id: Uuid,
        analysis: &EntryAnalysis,
    ) -> PortResult<()>;

    // --- Progress ---
    async fn find_progress(&self, user_id: Uuid) -> PortResult<Option<UserProgress>>;

    /// Inserts or replaces the progress record keyed by its user id.
    async fn save_progress(&self, progress: &UserProgress) -> PortResult<()>;

    // --- Weekly Summaries ---
    async fn save_weekly_summary(&self, summary: &WeeklySummary) -> PortResult<()>;

    async fn update_delivery_status(
        &self,
        summary_id: Uuid,
        status: DeliveryStatus,
    ) -> PortResult<()>;

    async fn find_latest_weekly_summary(&self, user_id: Uuid)
        -> PortResult<Option<WeeklySummary>>;

    /// Summaries whose week ends within `[from, to]`, newest first.
    async fn find_weekly_summaries_between(
        &self,
        user_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PortResult<Vec<WeeklySummary>>;
}

#[async_trait]
pub trait WeeklyReflectionService: Send + Sync {
    /// Turns a textual digest of a week of entries into a reflection.
    async fn generate_weekly_reflection(&self, weekly_signal: &str)
        -> PortResult<WeeklyAiReflection>;
}

#[async_trait]
pub trait EntryAnalysisService: Send + Sync {
    /// Extracts mood, a short summary and a sentiment score from an entry's text.
    async fn analyze_entry(&self, content: &str) -> PortResult<EntryAnalysis>;
}

#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Sends a plain-text message to a single address.
    async fn send(&self, to_address: &str, subject: &str, body: &str) -> PortResult<()>;
}
