use crate::{JobId, JobOutcome, JobSummary, StatusSnapshot};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User sent a query. `now` is an ISO-8601 timestamp.
    QuerySubmitted { text: String, now: String },
    /// The start endpoint accepted the query.
    JobStarted { job_id: JobId },
    JobStartFailed { error: String },
    /// One poll tick's status payload.
    SnapshotReceived {
        job_id: JobId,
        snapshot: StatusSnapshot,
        now: String,
    },
    /// The poller reached a terminal outcome.
    JobFinished { job_id: JobId, outcome: JobOutcome },
    /// Job list fetched at session start, used to reattach to an unfinished job.
    RestoreListReceived { jobs: Vec<JobSummary> },
    /// Job list fetched for the history side list only.
    HistoryListReceived { jobs: Vec<JobSummary> },
    /// User picked a history entry.
    HistorySelected { job_id: JobId },
    HistoryMessagesLoaded {
        job_id: JobId,
        snapshot: StatusSnapshot,
    },
    HistoryLoadFailed { job_id: JobId, error: String },
    ClearChat,
}
