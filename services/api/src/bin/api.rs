//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        DbAdapter, HttpMailAdapter, LogMailAdapter, OfflineAiAdapter, OpenAiAnalysisAdapter,
        OpenAiReflectionAdapter,
    },
    config::Config,
    error::ApiError,
    web::{
        create_entry_handler, get_entry_handler, get_progress_handler,
        get_weekly_summary_handler, list_entries_handler, list_weekly_summaries_handler,
        login_handler, logout_handler, reanalyze_entry_handler, require_auth, rest::ApiDoc,
        signup_handler, state::AppState, trigger_weekly_summary_handler,
        update_preferences_handler,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use journal_core::{
    entries::EntryRecorder,
    orchestrator::SummaryOrchestrator,
    ports::{DatabaseService, EntryAnalysisService, NotificationService, WeeklyReflectionService},
    scheduler::EligibilityScheduler,
    Clock, SystemClock,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");
    let db: Arc<dyn DatabaseService> = db_adapter;

    // --- 3. Initialize Service Adapters ---
    // Shared by the AI and mail adapters so every outbound call is bounded.
    let http_client = reqwest::Client::builder()
        .connect_timeout(config.ai_connect_timeout)
        .timeout(config.ai_response_timeout)
        .build()
        .map_err(|e| ApiError::Internal(format!("Failed to build HTTP client: {}", e)))?;

    let (reflection, analysis): (
        Arc<dyn WeeklyReflectionService>,
        Arc<dyn EntryAnalysisService>,
    ) = match &config.openai_api_key {
        Some(api_key) => {
            let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
            if let Some(base) = &config.openai_api_base {
                openai_config = openai_config.with_api_base(base);
            }
            let openai_client =
                Client::with_config(openai_config).with_http_client(http_client.clone());
            (
                Arc::new(OpenAiReflectionAdapter::new(
                    openai_client.clone(),
                    config.reflection_model.clone(),
                )),
                Arc::new(OpenAiAnalysisAdapter::new(
                    openai_client,
                    config.analysis_model.clone(),
                )),
            )
        }
        None => {
            warn!("OPENAI_API_KEY not set; weekly summaries will use the statistical fallback.");
            (Arc::new(OfflineAiAdapter), Arc::new(OfflineAiAdapter))
        }
    };

    let notifier: Arc<dyn NotificationService> = match &config.mail_api_url {
        Some(endpoint) => Arc::new(HttpMailAdapter::new(
            http_client,
            endpoint.clone(),
            config.mail_api_key.clone(),
            config.mail_from.clone(),
        )),
        None => {
            warn!("MAIL_API_URL not set; summary emails will only be logged.");
            Arc::new(LogMailAdapter)
        }
    };

    // --- 4. Build the Core Services & Shared AppState ---
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let orchestrator = Arc::new(SummaryOrchestrator::new(
        db.clone(),
        reflection,
        notifier,
        clock.clone(),
    ));
    let entries = Arc::new(EntryRecorder::new(db.clone(), analysis, clock.clone()));

    let app_state = Arc::new(AppState {
        db: db.clone(),
        config: config.clone(),
        entries,
        orchestrator: orchestrator.clone(),
    });

    // --- 5. Start the Weekly Summary Scheduler ---
    let shutdown = CancellationToken::new();
    let scheduler_task = if config.scheduler_enabled {
        let scheduler = EligibilityScheduler::new(db, orchestrator, clock);
        let period = config.scheduler_interval;
        let token = shutdown.clone();
        info!("Weekly summary scheduler running every {:?}.", period);
        Some(tokio::spawn(async move {
            scheduler.run_periodically(period, token).await;
        }))
    } else {
        info!("Weekly summary scheduler disabled.");
        None
    };

    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS origin '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 6. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route(
            "/journal/entries",
            post(create_entry_handler).get(list_entries_handler),
        )
        .route("/journal/entries/{entry_id}", get(get_entry_handler))
        .route(
            "/journal/entries/{entry_id}/reanalyze",
            post(reanalyze_entry_handler),
        )
        .route("/dashboard/progress", get(get_progress_handler))
        .route("/dashboard/weekly-summary", get(get_weekly_summary_handler))
        .route("/dashboard/weekly-summaries", get(list_weekly_summaries_handler))
        .route("/user/preferences", put(update_preferences_handler))
        .route("/test/weekly-summary", post(trigger_weekly_summary_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    let server_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received.");
            server_token.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Some(task) = scheduler_task {
        if let Err(e) = task.await {
            warn!("Scheduler task ended abnormally: {}", e);
        }
    }

    Ok(())
}
