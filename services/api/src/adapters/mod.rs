pub mod analysis_llm;
pub mod db;
pub mod mailer;
pub mod offline;
pub mod reflection_llm;

pub use analysis_llm::OpenAiAnalysisAdapter;
pub use db::DbAdapter;
pub use mailer::{HttpMailAdapter, LogMailAdapter};
pub use offline::OfflineAiAdapter;
pub use reflection_llm::OpenAiReflectionAdapter;
