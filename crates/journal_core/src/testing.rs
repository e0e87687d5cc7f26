//! In-memory fakes of every port. Used by the unit tests of this crate, and by dependent
//! crates through the `testing` feature.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc, Weekday};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use crate::domain::{
    DeliveryStatus, EntryAnalysis, JournalEntry, Trend, User, UserCredentials, UserPreferences,
    UserProgress, WeeklyAiReflection, WeeklySummary,
};
use crate::ports::{
    DatabaseService, EntryAnalysisService, NotificationService, PortError, PortResult,
    WeeklyReflectionService,
};

pub fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn user_with(preferences: Option<UserPreferences>, email: Option<&str>) -> User {
    User {
        user_id: Uuid::new_v4(),
        username: format!("user-{}", Uuid::new_v4().simple()),
        email: email.map(str::to_string),
        preferences,
        last_weekly_summary_date: None,
    }
}

pub fn entry(user_id: Uuid, date: DateTime<Utc>, mood: Option<&str>) -> JournalEntry {
    JournalEntry {
        id: Uuid::new_v4(),
        user_id,
        title: None,
        content: "Dear diary".to_string(),
        date,
        mood: mood.map(str::to_string),
        sentiment_score: Some(0.5),
        ai_summary: Some("A calm day.".to_string()),
    }
}

//=========================================================================================
// Database
//=========================================================================================

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    passwords: HashMap<Uuid, String>,
    sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    entries: Vec<JournalEntry>,
    progress: HashMap<Uuid, UserProgress>,
    summaries: Vec<WeeklySummary>,
}

#[derive(Default)]
pub struct InMemoryDb {
    tables: Mutex<Tables>,
    pub fail_entry_queries: AtomicBool,
    pub fail_summary_saves: AtomicBool,
    /// Fails `find_entries_between` only for this user, when set.
    pub fail_entries_for: Mutex<Option<Uuid>>,
}

impl InMemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    pub fn insert_user(&self, user: User) {
        self.tables().users.insert(user.user_id, user);
    }

    pub fn insert_entry(&self, entry: JournalEntry) {
        self.tables().entries.push(entry);
    }

    pub fn user(&self, user_id: Uuid) -> User {
        self.tables().users[&user_id].clone()
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.tables().entries.clone()
    }

    pub fn progress(&self, user_id: Uuid) -> Option<UserProgress> {
        self.tables().progress.get(&user_id).cloned()
    }

    pub fn summaries(&self) -> Vec<WeeklySummary> {
        self.tables().summaries.clone()
    }

    pub fn insert_summary(&self, summary: WeeklySummary) {
        self.tables().summaries.push(summary);
    }
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn create_user(
        &self,
        username: &str,
        email: Option<&str>,
        hashed_password: &str,
        preferences: &UserPreferences,
    ) -> PortResult<User> {
        let mut tables = self.tables();
        if tables.users.values().any(|u| u.username == username) {
            return Err(PortError::InvalidInput(format!("Username {} is taken", username)));
        }
        let user = User {
            user_id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.map(str::to_string),
            preferences: Some(preferences.clone()),
            last_weekly_summary_date: None,
        };
        tables.passwords.insert(user.user_id, hashed_password.to_string());
        tables.users.insert(user.user_id, user.clone());
        Ok(user)
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        self.tables()
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn get_user_credentials(&self, username: &str) -> PortResult<UserCredentials> {
        let tables = self.tables();
        let user = tables
            .users
            .values()
            .find(|u| u.username == username)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", username)))?;
        Ok(UserCredentials {
            user_id: user.user_id,
            username: user.username.clone(),
            hashed_password: tables.passwords.get(&user.user_id).cloned().unwrap_or_default(),
        })
    }

    async fn update_user_preferences(
        &self,
        user_id: Uuid,
        email: Option<&str>,
        preferences: &UserPreferences,
    ) -> PortResult<()> {
        let mut tables = self.tables();
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        user.email = email.map(str::to_string);
        user.preferences = Some(preferences.clone());
        Ok(())
    }

    async fn find_users_for_weekly_summary(&self, day: Weekday) -> PortResult<Vec<User>> {
        let mut users: Vec<User> = self
            .tables()
            .users
            .values()
            .filter(|u| {
                u.preferences
                    .as_ref()
                    .is_some_and(|p| p.weekly_summary_enabled && p.weekly_summary_day == Some(day))
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn set_last_weekly_summary_date(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> PortResult<()> {
        let mut tables = self.tables();
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        user.last_weekly_summary_date = Some(date);
        Ok(())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.tables()
            .sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        self.tables()
            .sessions
            .get(session_id)
            .map(|(user_id, _)| *user_id)
            .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.tables().sessions.remove(session_id);
        Ok(())
    }

    async fn save_journal_entry(&self, entry: &JournalEntry) -> PortResult<()> {
        self.tables().entries.push(entry.clone());
        Ok(())
    }

    async fn find_entries_between(
        &self,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> PortResult<Vec<JournalEntry>> {
        if self.fail_entry_queries.load(Ordering::SeqCst)
            || *self.fail_entries_for.lock().unwrap() == Some(user_id)
        {
            return Err(PortError::Unexpected("entry store unreachable".to_string()));
        }
        let mut entries: Vec<JournalEntry> = self
            .tables()
            .entries
            .iter()
            .filter(|e| e.user_id == user_id && e.date >= from && e.date <= to)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.date);
        Ok(entries)
    }

    async fn find_entries_for_user(&self, user_id: Uuid) -> PortResult<Vec<JournalEntry>> {
        if self.fail_entry_queries.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("entry store unreachable".to_string()));
        }
        let mut entries: Vec<JournalEntry> = self
            .tables()
            .entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(entries)
    }

    async fn find_entry_by_id(&self, entry_id: Uuid) -> PortResult<Option<JournalEntry>> {
        Ok(self
            .tables()
            .entries
            .iter()
            .find(|e| e.id == entry_id)
            .cloned())
    }

    async fn update_entry_analysis(
        &self,
        entry_id: Uuid,
        analysis: &EntryAnalysis,
    ) -> PortResult<()> {
        let mut tables = self.tables();
        let entry = tables
            .entries
            .iter_mut()
            .find(|e| e.id == entry_id)
            .ok_or_else(|| PortError::NotFound(format!("Entry {} not found", entry_id)))?;
        entry.mood = Some(analysis.mood.clone());
        entry.ai_summary = Some(analysis.summary.clone());
        entry.sentiment_score = Some(analysis.sentiment_score);
        Ok(())
    }

    async fn find_progress(&self, user_id: Uuid) -> PortResult<Option<UserProgress>> {
        Ok(self.progress(user_id))
    }

    async fn save_progress(&self, progress: &UserProgress) -> PortResult<()> {
        self.tables()
            .progress
            .insert(progress.user_id, progress.clone());
        Ok(())
    }

    async fn save_weekly_summary(&self, summary: &WeeklySummary) -> PortResult<()> {
        if self.fail_summary_saves.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("summary store unreachable".to_string()));
        }
        self.tables().summaries.push(summary.clone());
        Ok(())
    }

    async fn update_delivery_status(
        &self,
        summary_id: Uuid,
        status: DeliveryStatus,
    ) -> PortResult<()> {
        let mut tables = self.tables();
        let summary = tables
            .summaries
            .iter_mut()
            .find(|s| s.id == summary_id)
            .ok_or_else(|| PortError::NotFound(format!("Summary {} not found", summary_id)))?;
        summary.delivery_status = status;
        Ok(())
    }

    async fn find_latest_weekly_summary(
        &self,
        user_id: Uuid,
    ) -> PortResult<Option<WeeklySummary>> {
        Ok(self
            .tables()
            .summaries
            .iter()
            .filter(|s| s.user_id == user_id)
            .max_by_key(|s| s.generated_at)
            .cloned())
    }

    async fn find_weekly_summaries_between(
        &self,
        user_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PortResult<Vec<WeeklySummary>> {
        let mut summaries: Vec<WeeklySummary> = self
            .tables()
            .summaries
            .iter()
            .filter(|s| s.user_id == user_id && s.week_end_date >= from && s.week_end_date <= to)
            .cloned()
            .collect();
        summaries.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        Ok(summaries)
    }
}

//=========================================================================================
// AI services
//=========================================================================================

/// Reflection service that answers with a fixed reflection, or fails when `fail` is set.
#[derive(Default)]
pub struct StubReflection {
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
    pub signals: Mutex<Vec<String>>,
}

impl StubReflection {
    pub fn failing() -> Self {
        let stub = Self::default();
        stub.fail.store(true, Ordering::SeqCst);
        stub
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeeklyReflectionService for StubReflection {
    async fn generate_weekly_reflection(
        &self,
        weekly_signal: &str,
    ) -> PortResult<WeeklyAiReflection> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.signals.lock().unwrap().push(weekly_signal.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("reflection service timed out".to_string()));
        }
        Ok(WeeklyAiReflection {
            reflection_text: "A steady week with room to rest.".to_string(),
            trend: Trend::Improving,
            suggestion: "Take a short walk after writing.".to_string(),
        })
    }
}

#[derive(Default)]
pub struct StubAnalysis {
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl EntryAnalysisService for StubAnalysis {
    async fn analyze_entry(&self, _content: &str) -> PortResult<EntryAnalysis> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("analysis unavailable".to_string()));
        }
        Ok(EntryAnalysis {
            mood: "Grateful".to_string(),
            summary: "Thankful for friends.".to_string(),
            sentiment_score: 0.7,
        })
    }
}

//=========================================================================================
// Notifier
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub fail: AtomicBool,
    sent: Mutex<Vec<SentMessage>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationService for RecordingNotifier {
    async fn send(&self, to_address: &str, subject: &str, body: &str) -> PortResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("smtp relay refused connection".to_string()));
        }
        self.sent.lock().unwrap().push(SentMessage {
            to: to_address.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
