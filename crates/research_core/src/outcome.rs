use std::fmt;

use crate::message::Step;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The backend reported `status: "failed"`.
    JobFailed,
    /// The attempt budget ran out.
    Timeout,
    /// Transport error or non-2xx response on the final attempt.
    Network,
    MalformedResponse,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::JobFailed => write!(f, "job failed"),
            FailureReason::Timeout => write!(f, "timeout"),
            FailureReason::Network => write!(f, "network error"),
            FailureReason::MalformedResponse => write!(f, "malformed response"),
        }
    }
}

/// How a polled job ended, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded { result: String, steps: Vec<Step> },
    Failed { reason: FailureReason, message: String },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded { .. })
    }

    pub fn text(&self) -> &str {
        match self {
            JobOutcome::Succeeded { result, .. } => result,
            JobOutcome::Failed { message, .. } => message,
        }
    }
}
