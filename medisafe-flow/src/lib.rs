pub mod client;
pub mod comparison;
pub mod config;
pub mod error;
pub mod models;
pub mod notify;
pub mod progress;
pub mod report;
pub mod state;
pub mod workflow;

// Re-export commonly used types
pub use client::{AnalysisService, HttpAnalysisService};
pub use comparison::{ComparisonSet, MAX_COMPARISON_ITEMS};
pub use config::WorkflowConfig;
pub use error::{Result, WorkflowError};
pub use models::{AnalysisResult, Citation, HistoryEntry, QueryRequest, RiskLevel, Stats};
pub use notify::{CollectingNotifier, Notification, NotificationLevel, Notifier, TracingNotifier};
pub use progress::{PROGRESS_STAGES, Progress, ProgressStage};
pub use report::{DirectorySink, ExportedReport, MemorySink, ReportSink};
pub use state::{DashboardState, Phase, View};
pub use workflow::InteractionWorkflow;
