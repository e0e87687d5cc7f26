//! crates/journal_core/src/preferences.rs
//!
//! Partial updates of a user's weekly summary settings. Updating never triggers a run.

use chrono::Weekday;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{User, UserPreferences};
use crate::ports::{DatabaseService, PortError, PortResult};

/// Fields left as `None` keep their current value.
#[derive(Debug, Clone, Default)]
pub struct PreferencesUpdate {
    pub email: Option<String>,
    pub weekly_summary_enabled: Option<bool>,
    /// 1 = Monday ... 7 = Sunday.
    pub weekly_summary_day: Option<u8>,
    pub email_notifications_enabled: Option<bool>,
}

/// Maps 1..=7 (Monday first) onto a weekday.
pub fn weekday_from_number(day: u8) -> PortResult<Weekday> {
    match day {
        1 => Ok(Weekday::Mon),
        2 => Ok(Weekday::Tue),
        3 => Ok(Weekday::Wed),
        4 => Ok(Weekday::Thu),
        5 => Ok(Weekday::Fri),
        6 => Ok(Weekday::Sat),
        7 => Ok(Weekday::Sun),
        other => Err(PortError::InvalidInput(format!(
            "weekly summary day must be between 1 and 7, got {}",
            other
        ))),
    }
}

/// Applies `update` to `user` in memory.
pub fn apply_update(user: &mut User, update: PreferencesUpdate) -> PortResult<()> {
    // Validate before touching anything so a bad day leaves the user unchanged.
    let day = update.weekly_summary_day.map(weekday_from_number).transpose()?;

    if let Some(email) = update.email {
        user.email = Some(email.trim().to_string()).filter(|e| !e.is_empty());
    }

    let preferences = user.preferences.get_or_insert_with(UserPreferences::default);
    if let Some(enabled) = update.weekly_summary_enabled {
        preferences.weekly_summary_enabled = enabled;
    }
    if let Some(day) = day {
        preferences.weekly_summary_day = Some(day);
    }
    if let Some(enabled) = update.email_notifications_enabled {
        preferences.email_notifications_enabled = enabled;
    }
    Ok(())
}

/// Loads the user, applies `update` and stores the result.
pub async fn update_preferences(
    db: &Arc<dyn DatabaseService>,
    user_id: Uuid,
    update: PreferencesUpdate,
) -> PortResult<User> {
    let mut user = db.get_user_by_id(user_id).await?;
    apply_update(&mut user, update)?;
    let preferences = user.preferences.clone().unwrap_or_default();
    db.update_user_preferences(user_id, user.email.as_deref(), &preferences)
        .await?;
    Ok(user)
}
