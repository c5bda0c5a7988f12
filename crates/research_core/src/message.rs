use std::sync::Arc;

use crate::annotations::AnnotationIndex;
use crate::citations::{CitationContext, JobContext, LocalCitationMap};
use crate::content::Reference;
use crate::job::{id_trailer, JobId, JobStatus};
use crate::markdown::{render_html, render_markdown};
use crate::wire::RawStep;

/// Prefix for every user-visible failure in the transcript.
pub const ERROR_INDICATOR: &str = "❌ ";
pub const PROGRESS_STARTING: &str = "Starting deep research...";
pub const PROGRESS_RUNNING: &str = "Deep research in progress...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    User,
    Ai,
    Progress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub sequence_index: usize,
    pub message_text: String,
    pub status_label: Option<String>,
    pub timestamp: Option<String>,
}

impl Step {
    pub fn from_raw(sequence_index: usize, raw: &RawStep) -> Self {
        Self {
            sequence_index,
            message_text: raw.message_text().to_string(),
            status_label: raw.status.clone(),
            timestamp: raw.timestamp_text(),
        }
    }

    pub fn from_raw_list(raw: &[RawStep]) -> Vec<Self> {
        raw.iter()
            .enumerate()
            .map(|(index, step)| Self::from_raw(index, step))
            .collect()
    }
}

/// What the live progress message currently knows about the running job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressContext {
    pub status: JobStatus,
    pub message: String,
    pub job_id: Option<JobId>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub step: Option<String>,
    pub thread_id: Option<String>,
    pub run_id: Option<String>,
}

impl ProgressContext {
    pub fn starting(start_time: Option<String>) -> Self {
        Self {
            status: JobStatus::Starting,
            message: PROGRESS_STARTING.to_string(),
            job_id: None,
            start_time,
            end_time: None,
            step: None,
            thread_id: None,
            run_id: None,
        }
    }

    pub fn running(job_id: JobId, status: JobStatus, start_time: Option<String>) -> Self {
        Self {
            status,
            message: PROGRESS_RUNNING.to_string(),
            job_id: Some(job_id),
            ..Self::starting(start_time)
        }
    }

    /// `"{step}\n[Thread ID: t / Run ID: r]"` once a step is known.
    pub fn display_text(&self) -> String {
        match &self.step {
            Some(step) => format!(
                "{step}\n{}",
                id_trailer(self.thread_id.as_deref(), self.run_id.as_deref())
            ),
            None => self.message.clone(),
        }
    }
}

/// Citation lookups carried alongside a message so it can be re-rendered.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageCitations {
    pub local: LocalCitationMap,
    pub annotations: Arc<AnnotationIndex>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMessage {
    pub kind: MessageKind,
    pub body: String,
    pub references: Vec<Reference>,
    pub status_steps: Option<Vec<Step>>,
    pub job_id: Option<JobId>,
    pub message_id: Option<String>,
    pub timestamp: Option<String>,
    pub progress: Option<ProgressContext>,
    /// Set on the single placeholder that tracks the running job.
    pub live: bool,
    pub citations: Option<MessageCitations>,
}

impl DisplayMessage {
    fn base(kind: MessageKind, body: impl Into<String>) -> Self {
        Self {
            kind,
            body: body.into(),
            references: Vec::new(),
            status_steps: None,
            job_id: None,
            message_id: None,
            timestamp: None,
            progress: None,
            live: false,
            citations: None,
        }
    }

    pub fn user(text: impl Into<String>, timestamp: Option<String>) -> Self {
        Self {
            timestamp,
            ..Self::base(MessageKind::User, text)
        }
    }

    pub fn ai(body: impl Into<String>, job_id: Option<JobId>) -> Self {
        Self {
            job_id,
            ..Self::base(MessageKind::Ai, body)
        }
    }

    pub fn error(text: impl AsRef<str>, job_id: Option<JobId>) -> Self {
        Self::ai(format!("{ERROR_INDICATOR}{}", text.as_ref()), job_id)
    }

    pub fn live_progress(progress: ProgressContext) -> Self {
        Self {
            job_id: progress.job_id.clone(),
            timestamp: progress.start_time.clone(),
            live: true,
            progress: Some(progress.clone()),
            ..Self::base(MessageKind::Progress, progress.display_text())
        }
    }

    pub fn step_progress(step: Step, progress: Option<ProgressContext>) -> Self {
        Self {
            job_id: progress.as_ref().and_then(|ctx| ctx.job_id.clone()),
            timestamp: step.timestamp.clone(),
            progress,
            status_steps: Some(vec![step.clone()]),
            ..Self::base(MessageKind::Progress, step.message_text)
        }
    }

    pub fn is_progress(&self) -> bool {
        self.kind == MessageKind::Progress
    }

    pub fn is_error(&self) -> bool {
        self.kind == MessageKind::Ai && self.body.starts_with(ERROR_INDICATOR)
    }

    /// Lookups for this message. A missing job context is inferred from the body.
    pub fn citation_context<'a>(
        &'a self,
        job: Option<&'a JobContext>,
    ) -> CitationContext<'a> {
        CitationContext {
            annotations: self.citations.as_ref().map(|c| c.annotations.as_ref()),
            local: self.citations.as_ref().map(|c| &c.local),
            job,
        }
    }

    /// Body rendered to HTML with citations resolved.
    pub fn render_html(&self, selected: Option<&JobContext>) -> String {
        let inferred = self.inferred_context(selected);
        render_html(&self.body, &self.citation_context(selected.or(inferred.as_ref())))
    }

    /// Body as markdown with citations turned into markdown links.
    pub fn resolved_markdown(&self, selected: Option<&JobContext>) -> String {
        let inferred = self.inferred_context(selected);
        render_markdown(&self.body, &self.citation_context(selected.or(inferred.as_ref())))
    }

    fn inferred_context(&self, selected: Option<&JobContext>) -> Option<JobContext> {
        match selected {
            Some(_) => None,
            None => JobContext::infer(&self.body),
        }
    }
}
