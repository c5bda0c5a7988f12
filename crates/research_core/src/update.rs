use research_logging::{research_debug, research_info};

use crate::{Effect, Msg, SessionState};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: SessionState, msg: Msg) -> (SessionState, Vec<Effect>) {
    let effects = match msg {
        Msg::QuerySubmitted { text, now } => {
            let query = text.trim();
            if query.is_empty() || state.is_loading() {
                return (state, Vec::new());
            }
            state.begin_query(query, &now);
            vec![Effect::StartJob {
                query: query.to_string(),
            }]
        }
        Msg::JobStarted { job_id } => {
            if state.attach_job(job_id.clone()) {
                vec![Effect::PollJob { job_id }]
            } else {
                research_debug!("Ignoring start acknowledgement for job {}", job_id);
                Vec::new()
            }
        }
        Msg::JobStartFailed { error } => {
            state.fail_start(&error);
            Vec::new()
        }
        Msg::SnapshotReceived {
            job_id,
            snapshot,
            now,
        } => {
            if state.apply_snapshot(&job_id, &snapshot, &now).is_none() {
                research_debug!("Dropping snapshot for inactive job {}", job_id);
            }
            Vec::new()
        }
        Msg::JobFinished { job_id, outcome } => {
            if state.finish_job(&job_id, outcome) {
                research_info!("Job {} settled", job_id);
            }
            Vec::new()
        }
        Msg::RestoreListReceived { jobs } => {
            state.record_history(&jobs);
            match state.restore_job(&jobs) {
                Some(job_id) => {
                    research_info!("Reattaching to unfinished job {}", job_id);
                    vec![Effect::PollJob { job_id }]
                }
                None => Vec::new(),
            }
        }
        Msg::HistoryListReceived { jobs } => {
            state.record_history(&jobs);
            Vec::new()
        }
        Msg::HistorySelected { job_id } => {
            if state.select_history(&job_id) {
                vec![Effect::LoadJobMessages { job_id }]
            } else {
                Vec::new()
            }
        }
        Msg::HistoryMessagesLoaded { job_id, snapshot } => {
            state.show_history(&job_id, &snapshot);
            Vec::new()
        }
        Msg::HistoryLoadFailed { job_id, error } => {
            state.history_failed(&job_id, &error);
            Vec::new()
        }
        Msg::ClearChat => {
            state.clear();
            Vec::new()
        }
    };

    (state, effects)
}
