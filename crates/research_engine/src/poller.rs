use std::time::Duration;

use research_core::{
    id_trailer, FailureReason, Job, JobOutcome, JobStatus, ResultPayload, StatusSnapshot, Step,
};
use research_logging::{research_debug, research_warn};

use crate::{ApiError, JobApi};

pub const TIMEOUT_TEXT: &str = "Timeout: the investigation took too long";
pub const DEFAULT_FAILURE_TEXT: &str = "Investigation failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// Status fetches before giving up; 360 at 10s is one hour.
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_attempts: 360,
        }
    }
}

#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Receives every status snapshot the poller observes, in order.
pub trait SnapshotSink: Send + Sync {
    fn on_snapshot(&self, job_id: &str, snapshot: &StatusSnapshot);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    pub job: Job,
    pub outcome: JobOutcome,
    pub attempts: u32,
}

/// Polls one job until it reaches a terminal status or the attempt budget runs out.
pub struct JobPoller<'a> {
    api: &'a dyn JobApi,
    sleeper: &'a dyn Sleeper,
    settings: PollSettings,
}

impl<'a> JobPoller<'a> {
    pub fn new(api: &'a dyn JobApi, sleeper: &'a dyn Sleeper, settings: PollSettings) -> Self {
        Self {
            api,
            sleeper,
            settings,
        }
    }

    pub async fn run(&self, job_id: &str, sink: &dyn SnapshotSink) -> PollReport {
        let mut job = Job::new(job_id);
        let max_attempts = self.settings.max_attempts;

        for attempt in 1..=max_attempts {
            let last = attempt == max_attempts;
            match self.tick(attempt, &mut job, sink).await {
                Ok(Some(outcome)) => {
                    return PollReport {
                        job,
                        outcome,
                        attempts: attempt,
                    }
                }
                Ok(None) => {}
                Err(err) if last => {
                    research_warn!("Job {} poll failed on final attempt: {}", job_id, err);
                    let reason = if err.is_malformed() {
                        FailureReason::MalformedResponse
                    } else {
                        FailureReason::Network
                    };
                    return PollReport {
                        job,
                        outcome: JobOutcome::Failed {
                            reason,
                            message: format!("Polling error: {err}"),
                        },
                        attempts: attempt,
                    };
                }
                Err(err) => {
                    research_warn!("Job {} poll attempt {} failed: {}", job_id, attempt, err);
                }
            }
            if !last {
                self.sleeper.sleep(self.settings.interval).await;
            }
        }

        research_warn!("Job {} exceeded {} attempts", job_id, max_attempts);
        PollReport {
            job,
            outcome: JobOutcome::Failed {
                reason: FailureReason::Timeout,
                message: TIMEOUT_TEXT.to_string(),
            },
            attempts: max_attempts,
        }
    }

    async fn tick(
        &self,
        attempt: u32,
        job: &mut Job,
        sink: &dyn SnapshotSink,
    ) -> Result<Option<JobOutcome>, ApiError> {
        let snapshot = self.api.fetch_status(&job.id).await?;
        job.observe(&snapshot);
        research_debug!(
            "Job {} poll {}: status={} steps={} messages={}",
            job.id,
            attempt,
            job.status,
            snapshot.steps.len(),
            snapshot.messages.as_ref().map_or(0, Vec::len)
        );
        sink.on_snapshot(&job.id, &snapshot);

        // Ids come from this snapshot alone, not from earlier ticks.
        let trailer = id_trailer(snapshot.thread_id.as_deref(), snapshot.run_id.as_deref());
        match snapshot.status {
            JobStatus::Completed => {
                let payload = self.api.fetch_result(&job.id).await?;
                Ok(Some(success(payload, &trailer)))
            }
            JobStatus::Failed => {
                let detail = snapshot.failure_text().unwrap_or(DEFAULT_FAILURE_TEXT);
                Ok(Some(JobOutcome::Failed {
                    reason: FailureReason::JobFailed,
                    message: format!("{detail}\n{trailer}"),
                }))
            }
            _ => Ok(None),
        }
    }
}

fn success(payload: ResultPayload, trailer: &str) -> JobOutcome {
    JobOutcome::Succeeded {
        result: format!("{}\n\n{trailer}", payload.result.unwrap_or_default()),
        steps: Step::from_raw_list(&payload.steps),
    }
}
