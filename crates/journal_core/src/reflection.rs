//! crates/journal_core/src/reflection.rs
//!
//! Chooses how a weekly summary is worded: a motivational nudge when the week is empty,
//! an AI reflection when the service answers, and a fixed statistical sentence otherwise.

use std::fmt::Write as _;
use tracing::warn;

use crate::domain::{JournalEntry, SummaryType, Trend, WeeklyBaseData, NO_MOOD};
use crate::ports::WeeklyReflectionService;

pub const MOTIVATION_TEXT: &str = "You didn’t write anything last week. Even a few lines can help clear your mind. Want to start today?";

/// Placeholder for entry fields that analysis never filled in.
const MISSING_FIELD: &str = "n/a";

/// The text and statistics a strategy contributes to a summary.
#[derive(Debug, Clone, PartialEq)]
pub struct Reflection {
    pub summary_type: SummaryType,
    pub summary_text: String,
    pub mood: String,
    pub days_written: u32,
    pub trend: Option<Trend>,
    pub suggestion: Option<String>,
}

impl Reflection {
    pub fn motivation() -> Self {
        Self {
            summary_type: SummaryType::Motivation,
            summary_text: MOTIVATION_TEXT.to_string(),
            mood: NO_MOOD.to_string(),
            days_written: 0,
            trend: None,
            suggestion: None,
        }
    }

    pub fn deterministic(base: &WeeklyBaseData) -> Self {
        Self {
            summary_type: SummaryType::Summary,
            summary_text: format!(
                "You wrote on {} days this week. Your overall mood was mostly {}.",
                base.days_written, base.dominant_mood
            ),
            mood: base.dominant_mood.clone(),
            days_written: base.days_written,
            trend: None,
            suggestion: None,
        }
    }
}

/// Applies the strategies in order. The reflection service is called at most once and any
/// failure it reports is absorbed into the deterministic sentence.
pub async fn compose_reflection(
    base: &WeeklyBaseData,
    service: &dyn WeeklyReflectionService,
) -> Reflection {
    if !base.has_entries {
        return Reflection::motivation();
    }

    let signal = build_weekly_signal(&base.entries);
    match service.generate_weekly_reflection(&signal).await {
        Ok(ai) => Reflection {
            summary_type: SummaryType::AiReflection,
            summary_text: ai.reflection_text,
            mood: base.dominant_mood.clone(),
            days_written: base.days_written,
            trend: Some(ai.trend),
            suggestion: Some(ai.suggestion),
        },
        Err(e) => {
            warn!("Weekly reflection failed, using the statistical summary: {}", e);
            Reflection::deterministic(base)
        }
    }
}

/// Renders the digest sent to the reflection service: an entry count followed by one line
/// per entry.
pub fn build_weekly_signal(entries: &[JournalEntry]) -> String {
    let mut signal = format!("User wrote {} entries last week.\n", entries.len());
    for entry in entries {
        let sentiment = entry
            .sentiment_score
            .map(|score| score.to_string())
            .unwrap_or_else(|| MISSING_FIELD.to_string());
        // Writing into a String cannot fail.
        let _ = writeln!(
            signal,
            "- {}: Mood={}, Sentiment={}, Summary=\"{}\"",
            entry.date.date_naive(),
            entry.mood.as_deref().unwrap_or(MISSING_FIELD),
            sentiment,
            entry.ai_summary.as_deref().unwrap_or(MISSING_FIELD),
        );
    }
    signal
}
