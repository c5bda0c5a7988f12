use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use research_core::{
    update, DisplayMessage, Effect, JobContext, JobOutcome, Msg, SessionState, SessionView,
    StatusSnapshot,
};
use research_logging::{research_debug, research_error, research_info, research_warn};

use crate::poller::{JobPoller, PollSettings, Sleeper, SnapshotSink, TokioSleeper};
use crate::JobApi;

/// Produces the ISO-8601 timestamps stamped on user messages and progress.
pub type Clock = Arc<dyn Fn() -> String + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreSettings {
    /// Extra job-list fetches after the first one fails.
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RestoreSettings {
    fn default() -> Self {
        Self {
            retries: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// Notified with a fresh view after every state change.
pub trait SessionObserver: Send + Sync {
    fn session_changed(&self, view: &SessionView);
}

#[derive(Clone)]
pub struct SessionOptions {
    pub poll: PollSettings,
    pub restore: RestoreSettings,
    pub sleeper: Arc<dyn Sleeper>,
    pub clock: Clock,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            poll: PollSettings::default(),
            restore: RestoreSettings::default(),
            sleeper: Arc::new(TokioSleeper),
            clock: Arc::new(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}

/// Drives one chat: owns the session state and runs the effects `update` asks for.
pub struct ChatSession {
    api: Arc<dyn JobApi>,
    options: SessionOptions,
    state: Mutex<SessionState>,
    observer: Option<Arc<dyn SessionObserver>>,
}

impl ChatSession {
    pub fn new(api: Arc<dyn JobApi>, options: SessionOptions) -> Self {
        Self {
            api,
            options,
            state: Mutex::new(SessionState::new()),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn view(&self) -> SessionView {
        self.lock_state().view()
    }

    pub fn messages(&self) -> Vec<DisplayMessage> {
        self.lock_state().messages().to_vec()
    }

    pub fn is_loading(&self) -> bool {
        self.lock_state().is_loading()
    }

    pub fn job_context(&self) -> Option<JobContext> {
        self.lock_state().job_context().cloned()
    }

    /// Sends a query and polls the started job to completion. Ignored while
    /// another job is in flight or when the text is blank.
    pub async fn submit_query(&self, text: &str) {
        let now = (self.options.clock)();
        let effects = self.dispatch(Msg::QuerySubmitted {
            text: text.to_string(),
            now,
        });
        self.run_effects(effects).await;
    }

    /// Reattaches to the first unfinished job reported by the backend, if any.
    pub async fn restore_in_flight_job(&self) {
        let RestoreSettings { retries, delay } = self.options.restore;
        for attempt in 0..=retries {
            match self.api.list_jobs().await {
                Ok(jobs) => {
                    research_debug!("Restore found {} jobs", jobs.len());
                    let effects = self.dispatch(Msg::RestoreListReceived { jobs });
                    self.run_effects(effects).await;
                    return;
                }
                Err(err) if attempt < retries => {
                    research_warn!(
                        "Job list fetch failed (attempt {} of {}): {}",
                        attempt + 1,
                        retries + 1,
                        err
                    );
                    self.options.sleeper.sleep(delay).await;
                }
                Err(err) => {
                    research_error!("Giving up on restoring in-flight job: {}", err);
                }
            }
        }
    }

    /// Refreshes the history side list. Failures leave the list as it was.
    pub async fn load_history(&self) {
        match self.api.list_jobs().await {
            Ok(jobs) => {
                self.dispatch(Msg::HistoryListReceived { jobs });
            }
            Err(err) => research_warn!("History load failed: {}", err),
        }
    }

    pub async fn select_history(&self, job_id: &str) {
        let effects = self.dispatch(Msg::HistorySelected {
            job_id: job_id.to_string(),
        });
        self.run_effects(effects).await;
    }

    pub fn clear(&self) {
        self.dispatch(Msg::ClearChat);
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, msg: Msg) -> Vec<Effect> {
        let (effects, view) = {
            let mut guard = self.lock_state();
            let current = std::mem::take(&mut *guard);
            let (next, effects) = update(current, msg);
            *guard = next;
            let view = guard.consume_dirty().then(|| guard.view());
            (effects, view)
        };
        if let (Some(observer), Some(view)) = (&self.observer, view) {
            observer.session_changed(&view);
        }
        effects
    }

    async fn run_effects(&self, effects: Vec<Effect>) {
        let mut queue: VecDeque<Effect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            let follow_up = match effect {
                Effect::StartJob { query } => self.start_job(&query).await,
                Effect::PollJob { job_id } => self.poll_job(&job_id).await,
                Effect::LoadJobMessages { job_id } => self.load_job_messages(&job_id).await,
            };
            queue.extend(follow_up);
        }
    }

    async fn start_job(&self, query: &str) -> Vec<Effect> {
        research_info!("Starting research job query_len={}", query.len());
        match self.api.start_job(query).await {
            Ok(job_id) => {
                research_info!("Job {} started", job_id);
                self.dispatch(Msg::JobStarted { job_id })
            }
            Err(err) => {
                research_error!("Job start failed: {}", err);
                self.dispatch(Msg::JobStartFailed {
                    error: err.to_string(),
                })
            }
        }
    }

    async fn poll_job(&self, job_id: &str) -> Vec<Effect> {
        let poller = JobPoller::new(
            self.api.as_ref(),
            self.options.sleeper.as_ref(),
            self.options.poll,
        );
        let sink = DispatchSink { session: self };
        let report = poller.run(job_id, &sink).await;
        match &report.outcome {
            JobOutcome::Succeeded { .. } => {
                research_info!("Job {} completed after {} polls", job_id, report.attempts)
            }
            JobOutcome::Failed { reason, .. } => {
                research_info!("Job {} ended ({}) after {} polls", job_id, reason, report.attempts)
            }
        }
        self.dispatch(Msg::JobFinished {
            job_id: job_id.to_string(),
            outcome: report.outcome,
        })
    }

    async fn load_job_messages(&self, job_id: &str) -> Vec<Effect> {
        match self.api.fetch_status(job_id).await {
            Ok(snapshot) => self.dispatch(Msg::HistoryMessagesLoaded {
                job_id: job_id.to_string(),
                snapshot,
            }),
            Err(err) => {
                research_warn!("History fetch for job {} failed: {}", job_id, err);
                self.dispatch(Msg::HistoryLoadFailed {
                    job_id: job_id.to_string(),
                    error: err.to_string(),
                })
            }
        }
    }
}

/// Feeds poller snapshots back into the session as messages.
struct DispatchSink<'a> {
    session: &'a ChatSession,
}

impl SnapshotSink for DispatchSink<'_> {
    fn on_snapshot(&self, job_id: &str, snapshot: &StatusSnapshot) {
        let now = (self.session.options.clock)();
        self.session.dispatch(Msg::SnapshotReceived {
            job_id: job_id.to_string(),
            snapshot: snapshot.clone(),
            now,
        });
    }
}
