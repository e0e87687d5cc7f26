pub mod auth;
pub mod middleware;
pub mod rest;
pub mod state;

// Re-export the handlers the binary mounts on the router.
pub use auth::{login_handler, logout_handler, signup_handler};
pub use middleware::require_auth;
pub use rest::{
    create_entry_handler, get_entry_handler, get_progress_handler, get_weekly_summary_handler,
    list_entries_handler, list_weekly_summaries_handler, reanalyze_entry_handler,
    trigger_weekly_summary_handler, update_preferences_handler,
};
