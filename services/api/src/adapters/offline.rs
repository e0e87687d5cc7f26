//! services/api/src/adapters/offline.rs
//!
//! Stands in for the AI ports when no API key is configured. Every call fails, so weekly
//! runs take the statistical summary and entries are saved without analysis.

use async_trait::async_trait;
use journal_core::{
    domain::{EntryAnalysis, WeeklyAiReflection},
    ports::{EntryAnalysisService, PortError, PortResult, WeeklyReflectionService},
};

#[derive(Clone, Copy, Default)]
pub struct OfflineAiAdapter;

fn not_configured() -> PortError {
    PortError::Unexpected("AI service is not configured (OPENAI_API_KEY unset)".to_string())
}

#[async_trait]
impl WeeklyReflectionService for OfflineAiAdapter {
    async fn generate_weekly_reflection(
        &self,
        _weekly_signal: &str,
    ) -> PortResult<WeeklyAiReflection> {
        Err(not_configured())
    }
}

#[async_trait]
impl EntryAnalysisService for OfflineAiAdapter {
    async fn analyze_entry(&self, _content: &str) -> PortResult<EntryAnalysis> {
        Err(not_configured())
    }
}
