pub mod aggregator;
pub mod clock;
pub mod delivery;
pub mod domain;
pub mod entries;
pub mod orchestrator;
pub mod ports;
pub mod preferences;
pub mod progress;
pub mod reflection;
pub mod scheduler;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::{
    DeliveryStatus, EntryAnalysis, JournalEntry, SummaryType, Trend, User,
    UserCredentials, UserPreferences, UserProgress, WeeklyAiReflection, WeeklyBaseData,
    WeeklySummary,
};
pub use ports::{
    DatabaseService, EntryAnalysisService, NotificationService, PortError, PortResult,
    WeeklyReflectionService,
};
