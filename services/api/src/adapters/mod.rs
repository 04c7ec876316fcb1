pub mod analysis_llm;
pub mod assistant_llm;
pub mod db;
pub mod fallback;

pub use analysis_llm::OpenAiAnalysisAdapter;
pub use assistant_llm::OpenAiAssistantAdapter;
pub use db::DbAdapter;
pub use fallback::{GuideAssistant, UnconfiguredAnalysis};
