use std::sync::Arc;

use crate::annotations::AnnotationIndex;
use crate::job::{id_trailer, JobStatus, JobSummary, MISSING_ID};
use crate::message::{MessageCitations, ProgressContext, Step};
use crate::reconcile::{convert_message, refresh_progress, ReconcileReport, Reconciler};
use crate::view_model::SessionView;
use crate::{DisplayMessage, HistoryEntry, JobContext, JobId, JobOutcome, StatusSnapshot};

const HISTORY_NO_THREAD: &str = "Failed to load history: thread ID not found";
const HISTORY_NO_MESSAGES: &str = "Failed to load history: messages not found";

/// Everything a chat session shows. Mutated only through [`crate::update`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    messages: Vec<DisplayMessage>,
    loading: bool,
    progress: Option<ProgressContext>,
    active_job: Option<JobId>,
    pending_history: Option<JobId>,
    reconciler: Reconciler,
    history: Vec<HistoryEntry>,
    job_context: Option<JobContext>,
    dirty: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[DisplayMessage] {
        &self.messages
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn progress(&self) -> Option<&ProgressContext> {
        self.progress.as_ref()
    }

    pub fn active_job(&self) -> Option<&str> {
        self.active_job.as_deref()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Title of the selected or running job, used for citation search fallbacks.
    pub fn job_context(&self) -> Option<&JobContext> {
        self.job_context.as_ref()
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            messages: self.messages.clone(),
            loading: self.loading,
            progress: self.progress.clone(),
            active_job: self.active_job.clone(),
            history: self.history.clone(),
            job_context: self.job_context.clone(),
        }
    }

    pub fn consume_dirty(&mut self) -> bool {
        let was_dirty = self.dirty;
        self.dirty = false;
        was_dirty
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn begin_query(&mut self, query: &str, now: &str) {
        self.messages
            .push(DisplayMessage::user(query, Some(now.to_string())));
        let progress = ProgressContext::starting(Some(now.to_string()));
        self.messages.push(DisplayMessage::live_progress(progress.clone()));
        self.progress = Some(progress);
        self.loading = true;
        self.active_job = None;
        self.reconciler = Reconciler::new();
        self.job_context = Some(JobContext::new(query));
        self.mark_dirty();
    }

    /// Returns false when the start acknowledgement does not belong to a pending query.
    pub(crate) fn attach_job(&mut self, job_id: JobId) -> bool {
        if !self.loading || self.active_job.is_some() || self.pending_history.is_some() {
            return false;
        }
        if let Some(progress) = self.progress.as_mut() {
            *progress = ProgressContext::running(
                job_id.clone(),
                progress.status.clone(),
                progress.start_time.clone(),
            );
        }
        self.active_job = Some(job_id);
        self.sync_live_progress();
        self.mark_dirty();
        true
    }

    pub(crate) fn apply_snapshot(
        &mut self,
        job_id: &str,
        snapshot: &StatusSnapshot,
        now: &str,
    ) -> Option<ReconcileReport> {
        if self.active_job.as_deref() != Some(job_id) {
            return None;
        }
        let report =
            self.reconciler
                .apply(job_id, snapshot, self.progress.as_ref(), &mut self.messages);
        if snapshot.current_step.is_some() {
            if let Some(progress) = self.progress.as_mut() {
                refresh_progress(progress, snapshot, now);
            }
            self.sync_live_progress();
        }
        self.mark_dirty();
        Some(report)
    }

    /// Replaces all progress messages with the outcome message and clears the
    /// in-flight markers. Returns false for a job that is not the active one.
    pub(crate) fn finish_job(&mut self, job_id: &str, outcome: JobOutcome) -> bool {
        if self.active_job.as_deref() != Some(job_id) {
            return false;
        }
        self.messages.retain(|message| !message.is_progress());
        let message = match outcome {
            JobOutcome::Succeeded { result, steps } => {
                let mut message = DisplayMessage::ai(result, None);
                message.references = self.reconciler.latest_references().to_vec();
                message.status_steps = (!steps.is_empty()).then_some(steps);
                message.citations = Some(MessageCitations {
                    annotations: self.reconciler.latest_annotations(),
                    ..MessageCitations::default()
                });
                message
            }
            JobOutcome::Failed { message, .. } => DisplayMessage::error(message, None),
        };
        self.messages.push(message);
        self.settle();
        true
    }

    pub(crate) fn fail_start(&mut self, error: &str) -> bool {
        if !self.loading || self.active_job.is_some() || self.pending_history.is_some() {
            return false;
        }
        self.messages.retain(|message| !message.is_progress());
        self.messages.push(DisplayMessage::error(
            format!("Failed to start research: {error}"),
            None,
        ));
        self.settle();
        true
    }

    pub(crate) fn record_history(&mut self, jobs: &[JobSummary]) {
        self.history = jobs
            .iter()
            .filter(|job| matches!(job.status, JobStatus::Completed | JobStatus::Failed))
            .map(JobSummary::to_history_entry)
            .collect();
        self.mark_dirty();
    }

    /// Reattaches to the first unfinished job. No-op while anything is in flight,
    /// so a second job list can never start a duplicate poller.
    pub(crate) fn restore_job(&mut self, jobs: &[JobSummary]) -> Option<JobId> {
        if self.loading || self.active_job.is_some() {
            return None;
        }
        let job = jobs
            .iter()
            .find(|job| job.status.is_unfinished() && !job.id.is_empty())?;
        let progress = ProgressContext::running(
            job.id.clone(),
            job.status.clone(),
            job.start_time.clone().or_else(|| job.created_at.clone()),
        );
        self.messages = vec![DisplayMessage::live_progress(progress.clone())];
        self.progress = Some(progress);
        self.loading = true;
        self.active_job = Some(job.id.clone());
        self.reconciler = Reconciler::new();
        self.job_context = job.query.as_deref().map(JobContext::new);
        self.mark_dirty();
        Some(job.id.clone())
    }

    /// Returns true when the entry needs its messages fetched.
    pub(crate) fn select_history(&mut self, job_id: &str) -> bool {
        if self.loading {
            return false;
        }
        let Some(entry) = self.history.iter().find(|entry| entry.job_id == job_id) else {
            return false;
        };
        let has_thread = entry.has_thread();
        self.job_context = Some(JobContext::new(entry.summary.clone()));
        self.mark_dirty();
        if !has_thread {
            self.messages = vec![DisplayMessage::error(HISTORY_NO_THREAD, None)];
            return false;
        }
        self.messages.clear();
        self.loading = true;
        self.pending_history = Some(job_id.to_string());
        true
    }

    pub(crate) fn show_history(&mut self, job_id: &str, snapshot: &StatusSnapshot) -> bool {
        if self.pending_history.as_deref() != Some(job_id) {
            return false;
        }
        self.messages = reconstruct_history(job_id, snapshot);
        self.pending_history = None;
        self.settle();
        true
    }

    pub(crate) fn history_failed(&mut self, job_id: &str, error: &str) -> bool {
        if self.pending_history.as_deref() != Some(job_id) {
            return false;
        }
        self.messages = vec![DisplayMessage::error(
            format!("Failed to load history: {error}"),
            None,
        )];
        self.pending_history = None;
        self.settle();
        true
    }

    pub(crate) fn clear(&mut self) -> bool {
        if self.loading {
            return false;
        }
        self.messages.clear();
        self.job_context = None;
        self.mark_dirty();
        true
    }

    fn sync_live_progress(&mut self) {
        let Some(progress) = self.progress.as_ref() else {
            return;
        };
        if let Some(live) = self.messages.iter_mut().find(|message| message.live) {
            live.body = progress.display_text();
            live.job_id = progress.job_id.clone();
            live.progress = Some(progress.clone());
        }
    }

    fn settle(&mut self) {
        self.loading = false;
        self.progress = None;
        self.active_job = None;
        self.reconciler = Reconciler::new();
        self.mark_dirty();
    }
}

/// Rebuilds a finished job's transcript: failure notice, thread messages and
/// step history, reversed for display.
fn reconstruct_history(job_id: &str, snapshot: &StatusSnapshot) -> Vec<DisplayMessage> {
    let Some(raw_messages) = snapshot.messages.as_deref() else {
        return vec![DisplayMessage::error(HISTORY_NO_MESSAGES, None)];
    };
    let failed = snapshot.status == JobStatus::Failed;
    let mut rebuilt = Vec::with_capacity(raw_messages.len() + 2);

    if failed {
        if let Some(error) = snapshot.error_message.as_deref().filter(|e| !e.is_empty()) {
            rebuilt.push(DisplayMessage::error(failure_notice(error, snapshot), None));
        }
    }

    let annotations = Arc::new(AnnotationIndex::build(raw_messages));
    rebuilt.extend(
        raw_messages
            .iter()
            .enumerate()
            .map(|(ordinal, raw)| convert_message(raw, ordinal, Some(job_id), &annotations)),
    );

    if failed && !snapshot.steps.is_empty() {
        let steps = Step::from_raw_list(&snapshot.steps);
        let mut message = DisplayMessage::ai(step_history_text(&steps), None);
        message.status_steps = Some(steps);
        rebuilt.push(message);
    }

    rebuilt.reverse();
    rebuilt
}

fn failure_notice(error: &str, snapshot: &StatusSnapshot) -> String {
    let finished = snapshot
        .completed_at
        .as_deref()
        .or(snapshot.created_at.as_deref())
        .unwrap_or(MISSING_ID);
    format!(
        "**Research failed**\n\n{error}\n\nExecution time: {finished}\n{}",
        id_trailer(snapshot.thread_id.as_deref(), snapshot.run_id.as_deref())
    )
}

fn step_history_text(steps: &[Step]) -> String {
    let mut text = String::from("**Step history:**\n");
    for step in steps {
        text.push_str(&format!(
            "\n- **{}** ({}): {}",
            step.status_label.as_deref().unwrap_or("step"),
            step.timestamp.as_deref().unwrap_or(MISSING_ID),
            step.message_text
        ));
    }
    text
}
