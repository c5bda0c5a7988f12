//! Merges status snapshots into the display log.

use std::collections::HashSet;
use std::sync::Arc;

use research_logging::research_trace;

use crate::annotations::AnnotationIndex;
use crate::citations::LocalCitationMap;
use crate::content::{extract_references, Reference};
use crate::job::JobStatus;
use crate::message::{DisplayMessage, MessageCitations, MessageKind, ProgressContext, Step};
use crate::wire::{timestamp_text, RawMessage, StatusSnapshot};

/// Per-poll-session memory: how many steps were shown and which message ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciler {
    step_count: usize,
    shown: HashSet<String>,
    annotations: Arc<AnnotationIndex>,
    references: Vec<Reference>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileReport {
    pub steps_appended: usize,
    pub messages_appended: usize,
    pub messages_dropped: usize,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn shown_count(&self) -> usize {
        self.shown.len()
    }

    /// Annotation lookup built from the most recent snapshot with messages.
    pub fn latest_annotations(&self) -> Arc<AnnotationIndex> {
        Arc::clone(&self.annotations)
    }

    /// References carried by the assistant messages of the most recent snapshot.
    pub fn latest_references(&self) -> &[Reference] {
        &self.references
    }

    /// Appends new steps, then new messages, to `log`. Messages from other jobs
    /// are dropped first, keeping progress entries and job-less notices.
    pub fn apply(
        &mut self,
        job_id: &str,
        snapshot: &StatusSnapshot,
        progress: Option<&ProgressContext>,
        log: &mut Vec<DisplayMessage>,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        if snapshot.steps.len() > self.step_count {
            for (index, raw) in snapshot.steps.iter().enumerate().skip(self.step_count) {
                let step = Step::from_raw(index, raw);
                log.push(DisplayMessage::step_progress(step, progress.cloned()));
                report.steps_appended += 1;
            }
            self.step_count = snapshot.steps.len();
        }

        let Some(messages) = snapshot.messages.as_deref() else {
            return report;
        };

        let before = log.len();
        log.retain(|message| {
            message.is_progress() || message.job_id.as_deref().map_or(true, |id| id == job_id)
        });
        report.messages_dropped = before - log.len();

        let annotations = Arc::new(AnnotationIndex::build(messages));
        for (ordinal, raw) in messages.iter().enumerate() {
            // Only backend ids are deduplicated; id-less records are appended every time.
            if let Some(id) = &raw.id {
                if !self.shown.insert(id.clone()) {
                    continue;
                }
            }
            log.push(convert_message(raw, ordinal, Some(job_id), &annotations));
            report.messages_appended += 1;
        }

        self.references = messages
            .iter()
            .filter(|raw| !raw.is_user())
            .flat_map(extract_references)
            .collect();
        self.annotations = annotations;

        research_trace!(
            "Reconciled job {}: +{} steps, +{} messages, -{} foreign",
            job_id,
            report.steps_appended,
            report.messages_appended,
            report.messages_dropped
        );
        report
    }
}

/// Converts one raw thread message. `ordinal` is its position in the snapshot.
pub fn convert_message(
    raw: &RawMessage,
    ordinal: usize,
    job_id: Option<&str>,
    annotations: &Arc<AnnotationIndex>,
) -> DisplayMessage {
    let kind = if raw.is_user() {
        MessageKind::User
    } else {
        MessageKind::Ai
    };
    let citations = (kind == MessageKind::Ai).then(|| MessageCitations {
        local: LocalCitationMap::build(raw.citation_records(), Some(ordinal)),
        annotations: Arc::clone(annotations),
    });
    DisplayMessage {
        kind,
        body: raw.content.extract_text(),
        references: extract_references(raw),
        status_steps: None,
        job_id: job_id.map(ToOwned::to_owned),
        message_id: raw.id.clone(),
        timestamp: raw.created_at.as_ref().and_then(timestamp_text),
        progress: None,
        live: false,
        citations,
    }
}

/// Folds a snapshot carrying `current_step` into the tracked progress context.
pub fn refresh_progress(progress: &mut ProgressContext, snapshot: &StatusSnapshot, now: &str) {
    if let Some(step) = &snapshot.current_step {
        progress.step = Some(step.clone());
    }
    progress.status = snapshot.status.clone();
    if let Some(created) = &snapshot.created_at {
        progress.start_time = Some(created.clone());
    }
    if snapshot.status == JobStatus::Completed {
        progress.end_time = Some(
            snapshot
                .completed_at
                .clone()
                .unwrap_or_else(|| now.to_string()),
        );
    }
    if snapshot.thread_id.is_some() {
        progress.thread_id = snapshot.thread_id.clone();
    }
    if snapshot.run_id.is_some() {
        progress.run_id = snapshot.run_id.clone();
    }
}
