//! Research chat engine: job API client, poller, session runner and exports.
mod api;
mod export;
mod filename;
mod persist;
mod poller;
mod session;
mod types;

pub use api::{ApiSettings, JobApi, ReqwestJobApi, DEFAULT_BASE_URL, DEFAULT_USER_ID};
pub use export::{
    html_document, markdown_document, ExportError, ExportFormat, ExportOptions, ExportSummary,
    ReportExporter,
};
pub use filename::report_filename;
pub use persist::{ensure_export_dir, PersistError, ReportWriter};
pub use poller::{
    JobPoller, PollReport, PollSettings, Sleeper, SnapshotSink, TokioSleeper,
    DEFAULT_FAILURE_TEXT, TIMEOUT_TEXT,
};
pub use session::{ChatSession, Clock, RestoreSettings, SessionObserver, SessionOptions};
pub use types::{ApiError, ApiFailureKind};
