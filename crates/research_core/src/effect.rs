use crate::JobId;

/// Side effects requested by [`crate::update`], executed by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartJob { query: String },
    /// Attach a poller to the job; it reports back through snapshot and finish messages.
    PollJob { job_id: JobId },
    LoadJobMessages { job_id: JobId },
}
