//! crates/journal_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Text used for the mood of a summary generated without any entries.
pub const NO_MOOD: &str = "N/A";

/// Mood reported when entries exist but none of them carries a mood label.
pub const NEUTRAL_MOOD: &str = "Neutral";

//=========================================================================================
// Users
//=========================================================================================

/// Weekly summary and notification settings chosen by a user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPreferences {
    pub weekly_summary_enabled: bool,
    /// `None` means no day has been selected yet.
    pub weekly_summary_day: Option<Weekday>,
    pub email_notifications_enabled: bool,
}

impl UserPreferences {
    /// Preferences given to freshly created accounts.
    pub fn for_new_account() -> Self {
        Self {
            weekly_summary_day: Some(Weekday::Mon),
            ..Self::default()
        }
    }
}

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub preferences: Option<UserPreferences>,
    /// Date of the last weekly summary run; guards against a second run on the same day.
    pub last_weekly_summary_date: Option<NaiveDate>,
}

impl User {
    /// The email address, if one is set and not blank.
    pub fn deliverable_email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub username: String,
    pub hashed_password: String,
}

//=========================================================================================
// Journal entries and progress
//=========================================================================================

/// A dated journal entry. Mood, sentiment and summary come from entry analysis and may be absent.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: Option<String>,
    pub content: String,
    pub date: DateTime<Utc>,
    pub mood: Option<String>,
    pub sentiment_score: Option<f64>,
    pub ai_summary: Option<String>,
}

/// Result of analysing a single entry's text.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryAnalysis {
    pub mood: String,
    pub summary: String,
    pub sentiment_score: f64,
}

/// Streak and counter state for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProgress {
    pub user_id: Uuid,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_entry_date: Option<NaiveDate>,
    /// Cumulative; never reset.
    pub weekly_entry_count: u32,
    pub total_entries: u32,
}

impl UserProgress {
    /// A record with every counter at zero.
    pub fn empty(user_id: Uuid) -> Self {
        Self {
            user_id,
            current_streak: 0,
            longest_streak: 0,
            last_entry_date: None,
            weekly_entry_count: 0,
            total_entries: 0,
        }
    }
}

//=========================================================================================
// Weekly summaries
//=========================================================================================

/// Error returned when a stored tag does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} tag: {value}")]
pub struct UnknownTag {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! tagged_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $tag:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $tag,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownTag;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($tag => Ok(Self::$variant),)+
                    other => Err(UnknownTag {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// Which reflection strategy produced a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryType {
    Motivation,
    AiReflection,
    Summary,
}

tagged_enum!(SummaryType, "summary type", {
    Motivation => "MOTIVATION",
    AiReflection => "AI_REFLECTION",
    Summary => "SUMMARY",
});

/// Delivery state of a summary. The only allowed transition is `DashboardOnly -> Sent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    DashboardOnly,
    Sent,
}

tagged_enum!(DeliveryStatus, "delivery status", {
    DashboardOnly => "DASHBOARD_ONLY",
    Sent => "SENT",
});

/// Direction of the week as judged by the reflection service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Improving,
    Declining,
    Mixed,
}

tagged_enum!(Trend, "trend", {
    Improving => "IMPROVING",
    Declining => "DECLINING",
    Mixed => "MIXED",
});

/// One generated weekly summary.
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklySummary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub week_start_date: NaiveDate,
    pub week_end_date: NaiveDate,
    pub summary_type: SummaryType,
    pub summary_text: String,
    pub mood: String,
    pub days_written: u32,
    pub trend: Option<Trend>,
    pub suggestion: Option<String>,
    pub delivery_status: DeliveryStatus,
    pub generated_at: DateTime<Utc>,
}

/// What the reflection service returns for a week of entries.
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyAiReflection {
    pub reflection_text: String,
    pub trend: Trend,
    pub suggestion: String,
}

/// Read-only statistics over a user's trailing week of entries.
#[derive(Debug, Clone)]
pub struct WeeklyBaseData {
    pub has_entries: bool,
    pub days_written: u32,
    pub daily_ai_summaries: Vec<String>,
    pub dominant_mood: String,
    pub entries: Vec<JournalEntry>,
}

impl WeeklyBaseData {
    pub fn empty() -> Self {
        Self {
            has_entries: false,
            days_written: 0,
            daily_ai_summaries: Vec::new(),
            dominant_mood: NO_MOOD.to_string(),
            entries: Vec::new(),
        }
    }
}
