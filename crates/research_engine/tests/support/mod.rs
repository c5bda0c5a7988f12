#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use research_core::{JobId, JobSummary, ResultPayload, SessionView, StatusSnapshot};
use research_engine::{
    ApiError, ApiFailureKind, JobApi, PollSettings, RestoreSettings, SessionObserver,
    SessionOptions, Sleeper,
};
use serde_json::Value;

pub fn snapshot(value: Value) -> StatusSnapshot {
    serde_json::from_value(value).unwrap()
}

pub fn result(value: Value) -> ResultPayload {
    serde_json::from_value(value).unwrap()
}

pub fn jobs(value: Value) -> Vec<JobSummary> {
    serde_json::from_value(value).unwrap()
}

pub fn network_error(message: &str) -> ApiError {
    ApiError {
        kind: ApiFailureKind::Network,
        message: message.to_string(),
    }
}

/// Replays scripted responses. The last entry of each script repeats forever.
#[derive(Default)]
pub struct ScriptedApi {
    start: Mutex<VecDeque<Result<JobId, ApiError>>>,
    statuses: Mutex<HashMap<String, VecDeque<Result<StatusSnapshot, ApiError>>>>,
    results: Mutex<HashMap<String, VecDeque<Result<ResultPayload, ApiError>>>>,
    job_lists: Mutex<VecDeque<Result<Vec<JobSummary>, ApiError>>>,
    pub start_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub result_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_start(self, response: Result<JobId, ApiError>) -> Self {
        self.start.lock().unwrap().push_back(response);
        self
    }

    pub fn on_status(self, job_id: &str, response: Result<StatusSnapshot, ApiError>) -> Self {
        self.statuses
            .lock()
            .unwrap()
            .entry(job_id.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub fn on_result(self, job_id: &str, response: Result<ResultPayload, ApiError>) -> Self {
        self.results
            .lock()
            .unwrap()
            .entry(job_id.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub fn on_list(self, response: Result<Vec<JobSummary>, ApiError>) -> Self {
        self.job_lists.lock().unwrap().push_back(response);
        self
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

fn next<T: Clone>(script: &mut VecDeque<Result<T, ApiError>>) -> Result<T, ApiError> {
    if script.len() > 1 {
        if let Some(item) = script.pop_front() {
            return item;
        }
    }
    script
        .front()
        .cloned()
        .unwrap_or_else(|| Err(network_error("no scripted response")))
}

#[async_trait::async_trait]
impl JobApi for ScriptedApi {
    async fn start_job(&self, _query: &str) -> Result<JobId, ApiError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        next(&mut self.start.lock().unwrap())
    }

    async fn fetch_status(&self, job_id: &str) -> Result<StatusSnapshot, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let mut statuses = self.statuses.lock().unwrap();
        next(statuses.entry(job_id.to_string()).or_default())
    }

    async fn fetch_result(&self, job_id: &str) -> Result<ResultPayload, ApiError> {
        self.result_calls.fetch_add(1, Ordering::SeqCst);
        let mut results = self.results.lock().unwrap();
        next(results.entry(job_id.to_string()).or_default())
    }

    async fn list_jobs(&self) -> Result<Vec<JobSummary>, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        next(&mut self.job_lists.lock().unwrap())
    }
}

/// Returns immediately and remembers every requested delay.
#[derive(Default)]
pub struct RecordingSleeper {
    pub slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn naps(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    pub views: Mutex<Vec<SessionView>>,
}

impl SessionObserver for RecordingObserver {
    fn session_changed(&self, view: &SessionView) {
        self.views.lock().unwrap().push(view.clone());
    }
}

pub fn fast_options(sleeper: Arc<RecordingSleeper>) -> SessionOptions {
    SessionOptions {
        poll: PollSettings::default(),
        restore: RestoreSettings::default(),
        sleeper,
        clock: Arc::new(|| "2024-05-01T10:00:00.000Z".to_string()),
    }
}
