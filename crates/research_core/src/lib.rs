//! Research chat core: payload decoding, citation rendering and the pure
//! session state machine.
mod annotations;
mod citations;
mod content;
mod effect;
mod job;
mod markdown;
mod message;
mod msg;
mod outcome;
mod patterns;
mod reconcile;
mod state;
mod update;
mod view_model;
mod wire;

pub use annotations::{
    resolve_record, AnnotationEntry, AnnotationIndex, AnnotationKey, CitationTarget,
};
pub use citations::{
    normalize_marker_punctuation, render_marker, rewrite_citations, CitationContext, JobContext,
    LinkStyle, LocalCitationMap, Resolution, RewrittenText,
};
pub use content::{extract_references, RawContent, Reference};
pub use effect::Effect;
pub use job::{id_trailer, HistoryEntry, Job, JobId, JobStatus, JobSummary, MISSING_ID};
pub use markdown::{
    escape_attr, escape_text, markdown_to_html, plain_text_fallback, render_html, render_markdown,
    try_render_html, RenderError,
};
pub use message::{
    DisplayMessage, MessageCitations, MessageKind, ProgressContext, Step, ERROR_INDICATOR,
    PROGRESS_RUNNING, PROGRESS_STARTING,
};
pub use msg::Msg;
pub use outcome::{FailureReason, JobOutcome};
pub use reconcile::{convert_message, refresh_progress, ReconcileReport, Reconciler};
pub use state::SessionState;
pub use update::update;
pub use view_model::SessionView;
pub use wire::{
    timestamp_text, JobListPayload, RawMessage, RawStep, ResultPayload, StartJobResponse,
    StatusSnapshot,
};
