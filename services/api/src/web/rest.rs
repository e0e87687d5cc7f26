//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::port_status;
use crate::web::auth::{AuthResponse, LoginRequest, SignupRequest};
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use chrono::{DateTime, NaiveDate, Utc};
use journal_core::domain::{JournalEntry, UserProgress, WeeklySummary};
use journal_core::entries::NewEntry;
use journal_core::orchestrator::GenerationOutcome;
use journal_core::ports::PortError;
use journal_core::preferences::{update_preferences, PreferencesUpdate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        create_entry_handler,
        list_entries_handler,
        get_entry_handler,
        reanalyze_entry_handler,
        get_progress_handler,
        get_weekly_summary_handler,
        list_weekly_summaries_handler,
        update_preferences_handler,
        trigger_weekly_summary_handler,
    ),
    components(
        schemas(
            SignupRequest,
            LoginRequest,
            AuthResponse,
            CreateEntryRequest,
            CreateEntryResponse,
            EntryResponse,
            ProgressResponse,
            WeeklySummaryResponse,
            UpdatePreferencesRequest,
            TriggerSummaryResponse,
        )
    ),
    tags(
        (name = "Journal API", description = "Journal entries, writing progress and weekly summaries.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateEntryRequest {
    pub title: Option<String>,
    pub content: String,
}

#[derive(Serialize, ToSchema)]
pub struct CreateEntryResponse {
    pub entry_id: Uuid,
    pub date: DateTime<Utc>,
    pub mood: Option<String>,
    pub sentiment_score: Option<f64>,
    pub ai_summary: Option<String>,
    pub progress: ProgressResponse,
}

/// A stored journal entry. Analysis fields are absent when analysis never succeeded.
#[derive(Serialize, ToSchema)]
pub struct EntryResponse {
    pub id: Uuid,
    pub title: Option<String>,
    pub content: String,
    pub date: DateTime<Utc>,
    pub mood: Option<String>,
    pub sentiment_score: Option<f64>,
    pub ai_summary: Option<String>,
}

impl From<JournalEntry> for EntryResponse {
    fn from(e: JournalEntry) -> Self {
        Self {
            id: e.id,
            title: e.title,
            content: e.content,
            date: e.date,
            mood: e.mood,
            sentiment_score: e.sentiment_score,
            ai_summary: e.ai_summary,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ProgressResponse {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_entry_date: Option<NaiveDate>,
    pub weekly_entry_count: u32,
    pub total_entries: u32,
}

impl From<UserProgress> for ProgressResponse {
    fn from(p: UserProgress) -> Self {
        Self {
            current_streak: p.current_streak,
            longest_streak: p.longest_streak,
            last_entry_date: p.last_entry_date,
            weekly_entry_count: p.weekly_entry_count,
            total_entries: p.total_entries,
        }
    }
}

/// A weekly summary as shown on the dashboard.
#[derive(Serialize, ToSchema)]
pub struct WeeklySummaryResponse {
    pub id: Uuid,
    pub week_start_date: NaiveDate,
    pub week_end_date: NaiveDate,
    /// One of `MOTIVATION`, `AI_REFLECTION` or `SUMMARY`.
    pub summary_type: String,
    pub summary_text: String,
    pub mood: String,
    pub days_written: u32,
    pub trend: Option<String>,
    pub suggestion: Option<String>,
    pub delivery_status: String,
    pub generated_at: DateTime<Utc>,
}

impl From<WeeklySummary> for WeeklySummaryResponse {
    fn from(s: WeeklySummary) -> Self {
        Self {
            id: s.id,
            week_start_date: s.week_start_date,
            week_end_date: s.week_end_date,
            summary_type: s.summary_type.to_string(),
            summary_text: s.summary_text,
            mood: s.mood,
            days_written: s.days_written,
            trend: s.trend.map(|t| t.to_string()),
            suggestion: s.suggestion,
            delivery_status: s.delivery_status.to_string(),
            generated_at: s.generated_at,
        }
    }
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SummaryRangeQuery {
    /// First week end date to include.
    pub from: NaiveDate,
    /// Last week end date to include.
    pub to: NaiveDate,
}

/// Omitted fields keep their current value.
#[derive(Deserialize, ToSchema)]
pub struct UpdatePreferencesRequest {
    pub email: Option<String>,
    pub weekly_summary_enabled: Option<bool>,
    /// 1 = Monday ... 7 = Sunday.
    pub weekly_summary_day: Option<u8>,
    pub email_notifications_enabled: Option<bool>,
}

impl From<UpdatePreferencesRequest> for PreferencesUpdate {
    fn from(req: UpdatePreferencesRequest) -> Self {
        Self {
            email: req.email,
            weekly_summary_enabled: req.weekly_summary_enabled,
            weekly_summary_day: req.weekly_summary_day,
            email_notifications_enabled: req.email_notifications_enabled,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TriggerSummaryResponse {
    /// One of `GENERATED`, `ALREADY_GENERATED` or `IN_PROGRESS`.
    pub outcome: String,
    pub summary: Option<WeeklySummaryResponse>,
}

impl From<GenerationOutcome> for TriggerSummaryResponse {
    fn from(outcome: GenerationOutcome) -> Self {
        let tag = outcome.as_str().to_string();
        let summary = match outcome {
            GenerationOutcome::Generated(summary) => Some(summary.into()),
            GenerationOutcome::AlreadyGenerated | GenerationOutcome::InProgress => None,
        };
        Self {
            outcome: tag,
            summary,
        }
    }
}

/// Logs a port failure and converts it to the handler error shape.
fn port_failure(context: &str, e: PortError) -> (StatusCode, String) {
    let status = port_status(&e);
    match &e {
        PortError::InvalidInput(msg) | PortError::NotFound(msg) => (status, msg.clone()),
        _ => {
            error!("{}: {:?}", context, e);
            (status, context.to_string())
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Write a journal entry. The entry is dated now and the writing streak is updated.
#[utoipa::path(
    post,
    path = "/journal/entries",
    request_body = CreateEntryRequest,
    responses(
        (status = 201, description = "Entry saved", body = CreateEntryResponse),
        (status = 400, description = "Entry has neither title nor content"),
        (status = 401, description = "Not logged in"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_entry_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<CreateEntryRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (entry, progress) = app_state
        .entries
        .record(
            user_id,
            NewEntry {
                title: req.title,
                content: req.content,
            },
        )
        .await
        .map_err(|e| port_failure("Failed to save entry", e))?;

    let response = CreateEntryResponse {
        entry_id: entry.id,
        date: entry.date,
        mood: entry.mood,
        sentiment_score: entry.sentiment_score,
        ai_summary: entry.ai_summary,
        progress: progress.into(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// The caller's journal entries, newest first.
#[utoipa::path(
    get,
    path = "/journal/entries",
    responses(
        (status = 200, description = "The caller's entries", body = [EntryResponse]),
        (status = 401, description = "Not logged in"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_entries_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<Vec<EntryResponse>>, (StatusCode, String)> {
    let entries = app_state
        .entries
        .list(user_id)
        .await
        .map_err(|e| port_failure("Failed to list entries", e))?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

/// One of the caller's journal entries.
#[utoipa::path(
    get,
    path = "/journal/entries/{entry_id}",
    params(
        ("entry_id" = Uuid, Path, description = "The entry to fetch.")
    ),
    responses(
        (status = 200, description = "The entry", body = EntryResponse),
        (status = 400, description = "Malformed entry id"),
        (status = 401, description = "Not logged in"),
        (status = 404, description = "No such entry for this user"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_entry_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<EntryResponse>, (StatusCode, String)> {
    let entry = app_state
        .entries
        .find(user_id, entry_id)
        .await
        .map_err(|e| port_failure("Failed to load entry", e))?;
    Ok(Json(entry.into()))
}

/// Run analysis again on one of the caller's entries and store the result.
#[utoipa::path(
    post,
    path = "/journal/entries/{entry_id}/reanalyze",
    params(
        ("entry_id" = Uuid, Path, description = "The entry to analyse again.")
    ),
    responses(
        (status = 200, description = "Entry with fresh analysis", body = EntryResponse),
        (status = 400, description = "Malformed entry id or entry has no content"),
        (status = 401, description = "Not logged in"),
        (status = 404, description = "No such entry for this user"),
        (status = 500, description = "Analysis failed")
    )
)]
pub async fn reanalyze_entry_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<EntryResponse>, (StatusCode, String)> {
    let entry = app_state
        .entries
        .reanalyze(user_id, entry_id)
        .await
        .map_err(|e| port_failure("Failed to re-analyse entry", e))?;
    Ok(Json(entry.into()))
}

/// The caller's writing streak and entry counters.
#[utoipa::path(
    get,
    path = "/dashboard/progress",
    responses(
        (status = 200, description = "Current progress", body = ProgressResponse),
        (status = 401, description = "Not logged in"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_progress_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<ProgressResponse>, (StatusCode, String)> {
    let progress = app_state
        .entries
        .progress()
        .snapshot(user_id)
        .await
        .map_err(|e| port_failure("Failed to load progress", e))?;
    Ok(Json(progress.into()))
}

/// The caller's most recent weekly summary.
#[utoipa::path(
    get,
    path = "/dashboard/weekly-summary",
    responses(
        (status = 200, description = "Latest weekly summary", body = WeeklySummaryResponse),
        (status = 204, description = "No summary generated yet"),
        (status = 401, description = "Not logged in"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_weekly_summary_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Response, (StatusCode, String)> {
    let latest = app_state
        .db
        .find_latest_weekly_summary(user_id)
        .await
        .map_err(|e| port_failure("Failed to load weekly summary", e))?;

    Ok(match latest {
        Some(summary) => Json(WeeklySummaryResponse::from(summary)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// The caller's weekly summaries whose week ends between `from` and `to`, newest first.
#[utoipa::path(
    get,
    path = "/dashboard/weekly-summaries",
    params(SummaryRangeQuery),
    responses(
        (status = 200, description = "Summaries in range", body = [WeeklySummaryResponse]),
        (status = 400, description = "`from` is after `to`"),
        (status = 401, description = "Not logged in"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_weekly_summaries_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(range): Query<SummaryRangeQuery>,
) -> Result<Json<Vec<WeeklySummaryResponse>>, (StatusCode, String)> {
    if range.from > range.to {
        return Err((
            StatusCode::BAD_REQUEST,
            "`from` must not be after `to`".to_string(),
        ));
    }

    let summaries = app_state
        .db
        .find_weekly_summaries_between(user_id, range.from, range.to)
        .await
        .map_err(|e| port_failure("Failed to list weekly summaries", e))?;

    Ok(Json(summaries.into_iter().map(Into::into).collect()))
}

/// Update the caller's email address and weekly summary settings.
#[utoipa::path(
    put,
    path = "/user/preferences",
    request_body = UpdatePreferencesRequest,
    responses(
        (status = 204, description = "Preferences updated"),
        (status = 400, description = "Invalid weekly summary day"),
        (status = 401, description = "Not logged in"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn update_preferences_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<UpdatePreferencesRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    update_preferences(&app_state.db, user_id, req.into())
        .await
        .map_err(|e| port_failure("Failed to update preferences", e))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Generate the caller's weekly summary right away, ignoring the configured day.
///
/// A summary already generated today is not regenerated.
#[utoipa::path(
    post,
    path = "/test/weekly-summary",
    responses(
        (status = 200, description = "Run finished", body = TriggerSummaryResponse),
        (status = 401, description = "Not logged in"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn trigger_weekly_summary_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<TriggerSummaryResponse>, (StatusCode, String)> {
    let user = app_state
        .db
        .get_user_by_id(user_id)
        .await
        .map_err(|e| port_failure("Failed to load user", e))?;

    let outcome = app_state
        .orchestrator
        .generate_weekly_summary(&user)
        .await
        .map_err(|e| port_failure("Failed to generate weekly summary", e))?;

    info!(%user_id, outcome = outcome.as_str(), "Manual weekly summary run finished.");
    Ok(Json(outcome.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::to_bytes;
    use chrono::TimeZone;
    use journal_core::domain::{DeliveryStatus, SummaryType, Trend};
    use journal_core::entries::EntryRecorder;
    use journal_core::orchestrator::SummaryOrchestrator;
    use journal_core::testing::{
        at, entry, InMemoryDb, RecordingNotifier, StubAnalysis, StubReflection,
    };
    use journal_core::FixedClock;

    fn summary(user_id: Uuid, week_end: u32) -> WeeklySummary {
        WeeklySummary {
            id: Uuid::new_v4(),
            user_id,
            week_start_date: NaiveDate::from_ymd_opt(2026, 3, week_end - 7).unwrap(),
            week_end_date: NaiveDate::from_ymd_opt(2026, 3, week_end).unwrap(),
            summary_type: SummaryType::AiReflection,
            summary_text: "A steady week.".to_string(),
            mood: "Calm".to_string(),
            days_written: 4,
            trend: Some(Trend::Improving),
            suggestion: Some("Keep going.".to_string()),
            delivery_status: DeliveryStatus::DashboardOnly,
            generated_at: Utc.with_ymd_and_hms(2026, 3, week_end, 8, 0, 0).unwrap(),
        }
    }

    fn app_state() -> (Arc<InMemoryDb>, Arc<StubAnalysis>, Arc<AppState>) {
        let db = Arc::new(InMemoryDb::new());
        let analysis = Arc::new(StubAnalysis::default());
        let clock = Arc::new(FixedClock::new(at(2026, 3, 16, 9)));
        let config = Config::from_lookup(|key| {
            (key == "DATABASE_URL").then(|| "postgres://localhost/journal".to_string())
        })
        .unwrap();
        let orchestrator = Arc::new(SummaryOrchestrator::new(
            db.clone(),
            Arc::new(StubReflection::failing()),
            Arc::new(RecordingNotifier::default()),
            clock.clone(),
        ));
        let entries = Arc::new(EntryRecorder::new(db.clone(), analysis.clone(), clock));
        let state = Arc::new(AppState {
            db: db.clone(),
            config: Arc::new(config),
            entries,
            orchestrator,
        });
        (db, analysis, state)
    }

    #[tokio::test]
    async fn latest_summary_is_no_content_until_one_is_stored() {
        let (db, _analysis, state) = app_state();
        let user_id = Uuid::new_v4();

        let empty = get_weekly_summary_handler(State(state.clone()), Extension(user_id))
            .await
            .unwrap();
        assert_eq!(empty.status(), StatusCode::NO_CONTENT);

        db.insert_summary(summary(user_id, 9));
        let found = get_weekly_summary_handler(State(state), Extension(user_id))
            .await
            .unwrap();
        assert_eq!(found.status(), StatusCode::OK);
        let body = to_bytes(found.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["summary_text"], "A steady week.");
        assert_eq!(json["summary_type"], "AI_REFLECTION");
    }

    #[tokio::test]
    async fn summary_range_filters_by_week_end_and_rejects_inverted_bounds() {
        let (db, _analysis, state) = app_state();
        let user_id = Uuid::new_v4();
        db.insert_summary(summary(user_id, 9));
        db.insert_summary(summary(user_id, 16));
        let day = |d| NaiveDate::from_ymd_opt(2026, 3, d).unwrap();

        let Json(listed) = list_weekly_summaries_handler(
            State(state.clone()),
            Extension(user_id),
            Query(SummaryRangeQuery { from: day(10), to: day(20) }),
        )
        .await
        .unwrap_or_else(|(status, msg)| panic!("unexpected {}: {}", status, msg));
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].week_end_date, day(16));

        let Err((status, _)) = list_weekly_summaries_handler(
            State(state),
            Extension(user_id),
            Query(SummaryRangeQuery { from: day(20), to: day(10) }),
        )
        .await
        else {
            panic!("an inverted range must be rejected");
        };
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn entries_are_listed_and_fetched_for_their_owner_only() {
        let (db, _analysis, state) = app_state();
        let owner = Uuid::new_v4();
        let stored = entry(owner, at(2026, 3, 12, 8), Some("Calm"));
        db.insert_entry(stored.clone());
        db.insert_entry(entry(Uuid::new_v4(), at(2026, 3, 13, 8), Some("Sad")));

        let Json(listed) = list_entries_handler(State(state.clone()), Extension(owner))
            .await
            .unwrap_or_else(|(status, msg)| panic!("unexpected {}: {}", status, msg));
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, stored.id);

        let Json(fetched) =
            get_entry_handler(State(state.clone()), Extension(owner), Path(stored.id))
                .await
                .unwrap_or_else(|(status, msg)| panic!("unexpected {}: {}", status, msg));
        assert_eq!(fetched.mood.as_deref(), Some("Calm"));

        let Err((status, _)) =
            get_entry_handler(State(state), Extension(Uuid::new_v4()), Path(stored.id)).await
        else {
            panic!("another user's entry must not be returned");
        };
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn reanalyze_stores_fresh_analysis() {
        let (db, analysis, state) = app_state();
        let owner = Uuid::new_v4();
        let mut stored = entry(owner, at(2026, 3, 12, 8), None);
        stored.sentiment_score = None;
        stored.ai_summary = None;
        db.insert_entry(stored.clone());

        let Json(updated) =
            reanalyze_entry_handler(State(state.clone()), Extension(owner), Path(stored.id))
                .await
                .unwrap_or_else(|(status, msg)| panic!("unexpected {}: {}", status, msg));
        assert_eq!(updated.mood.as_deref(), Some("Grateful"));
        assert_eq!(db.entries()[0].sentiment_score, Some(0.7));

        analysis.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        let Err((status, _)) =
            reanalyze_entry_handler(State(state), Extension(owner), Path(stored.id)).await
        else {
            panic!("a failing analysis must be reported");
        };
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn summary_response_uses_wire_tags() {
        let json =
            serde_json::to_value(WeeklySummaryResponse::from(summary(Uuid::new_v4(), 9))).unwrap();

        assert_eq!(json["summary_type"], "AI_REFLECTION");
        assert_eq!(json["trend"], "IMPROVING");
        assert_eq!(json["delivery_status"], "DASHBOARD_ONLY");
        assert_eq!(json["week_end_date"], "2026-03-09");
    }

    #[test]
    fn trigger_response_carries_summary_only_when_generated() {
        let generated = TriggerSummaryResponse::from(GenerationOutcome::Generated(summary(
            Uuid::new_v4(),
            9,
        )));
        assert_eq!(generated.outcome, "GENERATED");
        assert!(generated.summary.is_some());

        let skipped = TriggerSummaryResponse::from(GenerationOutcome::AlreadyGenerated);
        assert_eq!(skipped.outcome, "ALREADY_GENERATED");
        assert!(skipped.summary.is_none());
    }

    #[test]
    fn invalid_input_message_reaches_the_client() {
        let (status, msg) = port_failure("ctx", PortError::InvalidInput("bad day".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(msg, "bad day");

        let (status, msg) = port_failure("ctx", PortError::Unexpected("db down".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(msg, "ctx");
    }
}
