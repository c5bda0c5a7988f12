use crate::{DisplayMessage, HistoryEntry, JobContext, JobId, ProgressContext};

/// Snapshot of the session handed to renderers and exporters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionView {
    pub messages: Vec<DisplayMessage>,
    pub loading: bool,
    pub progress: Option<ProgressContext>,
    pub active_job: Option<JobId>,
    pub history: Vec<HistoryEntry>,
    pub job_context: Option<JobContext>,
}

impl SessionView {
    /// AI messages that are not error notices, oldest first.
    pub fn answers(&self) -> impl Iterator<Item = &DisplayMessage> {
        self.messages
            .iter()
            .filter(|message| message.kind == crate::MessageKind::Ai && !message.is_error())
    }
}
