use std::fmt;

use serde::Deserialize;

use crate::wire::{lenient_status, lenient_string, StatusSnapshot};

pub type JobId = String;

/// Placeholder the backend uses when a job has no thread yet.
pub const MISSING_ID: &str = "-";

const SUMMARY_CHARS: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum JobStatus {
    Created,
    Starting,
    Queued,
    InProgress,
    RequiresAction,
    Completed,
    Failed,
    /// Anything the backend reports that we do not recognize. Never terminal.
    Other(String),
}

impl JobStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "created" => Self::Created,
            "starting" => Self::Starting,
            "queued" => Self::Queued,
            "in_progress" => Self::InProgress,
            "requires_action" => Self::RequiresAction,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "created",
            Self::Starting => "starting",
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::RequiresAction => "requires_action",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Other(raw) => raw,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Statuses that mark a job worth reattaching a poller to after a restart.
    pub fn is_unfinished(&self) -> bool {
        matches!(
            self,
            Self::Created | Self::Starting | Self::Queued | Self::InProgress | Self::RequiresAction
        )
    }
}

impl Default for JobStatus {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<String> for JobStatus {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle record for one backend job, updated as snapshots arrive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub created_at: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub thread_id: Option<String>,
    pub run_id: Option<String>,
    pub current_step: Option<String>,
    pub error_message: Option<String>,
}

impl Job {
    pub fn new(id: impl Into<JobId>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Starting,
            created_at: None,
            started_at: None,
            completed_at: None,
            thread_id: None,
            run_id: None,
            current_step: None,
            error_message: None,
        }
    }

    /// Folds a status snapshot into the record. Fields the snapshot omits keep
    /// their previous value.
    pub fn observe(&mut self, snapshot: &StatusSnapshot) {
        self.status = snapshot.status.clone();
        merge(&mut self.created_at, &snapshot.created_at);
        if self.started_at.is_none() {
            self.started_at = self.created_at.clone();
        }
        merge(&mut self.completed_at, &snapshot.completed_at);
        merge(&mut self.thread_id, &snapshot.thread_id);
        merge(&mut self.run_id, &snapshot.run_id);
        merge(&mut self.current_step, &snapshot.current_step);
        if let Some(message) = snapshot.failure_text() {
            self.error_message = Some(message.to_string());
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// `[Thread ID: t / Run ID: r]`, with `-` standing in for unknown ids.
pub fn id_trailer(thread_id: Option<&str>, run_id: Option<&str>) -> String {
    format!(
        "[Thread ID: {} / Run ID: {}]",
        thread_id.filter(|id| !id.is_empty()).unwrap_or(MISSING_ID),
        run_id.filter(|id| !id.is_empty()).unwrap_or(MISSING_ID)
    )
}

fn merge(target: &mut Option<String>, incoming: &Option<String>) {
    if let Some(value) = incoming {
        *target = Some(value.clone());
    }
}

/// One row of the job list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct JobSummary {
    pub id: JobId,
    #[serde(deserialize_with = "lenient_status")]
    pub status: JobStatus,
    #[serde(deserialize_with = "lenient_string")]
    pub thread_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub query: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub result: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub error_message: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub created_at: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub start_time: Option<String>,
}

impl JobSummary {
    pub fn to_history_entry(&self) -> HistoryEntry {
        let summary = non_empty(&self.query)
            .map(ToOwned::to_owned)
            .or_else(|| {
                non_empty(&self.result)
                    .or_else(|| non_empty(&self.error_message))
                    .map(|text| text.chars().take(SUMMARY_CHARS).collect())
            })
            .unwrap_or_default();
        HistoryEntry {
            job_id: self.id.clone(),
            thread_id: non_empty(&self.thread_id)
                .unwrap_or(MISSING_ID)
                .to_string(),
            summary,
            status: self.status.clone(),
            created_at: self
                .created_at
                .clone()
                .or_else(|| self.start_time.clone())
                .unwrap_or_default(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|text| !text.is_empty())
}

/// Read-only side-list entry for a finished job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub job_id: JobId,
    pub thread_id: String,
    pub summary: String,
    pub status: JobStatus,
    pub created_at: String,
}

impl HistoryEntry {
    pub fn has_thread(&self) -> bool {
        !self.thread_id.is_empty() && self.thread_id != MISSING_ID
    }
}
