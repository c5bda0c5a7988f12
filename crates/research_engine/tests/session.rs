mod support;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use research_core::{MessageKind, Reference};
use research_engine::{ChatSession, RestoreSettings};
use serde_json::json;
use support::{
    fast_options, jobs, network_error, result, snapshot, RecordingObserver, RecordingSleeper,
    ScriptedApi,
};

fn bodies(session: &ChatSession) -> Vec<String> {
    session.messages().into_iter().map(|m| m.body).collect()
}

#[tokio::test]
async fn query_runs_to_a_single_final_answer() {
    research_logging::initialize_for_tests();
    let api = Arc::new(
        ScriptedApi::new()
            .on_start(Ok("j1".to_string()))
            .on_status(
                "j1",
                Ok(snapshot(json!({"status": "in_progress", "steps": [{"message": "planning"}]}))),
            )
            .on_status(
                "j1",
                Ok(snapshot(json!({"status": "completed", "thread_id": "t1", "run_id": "r1"}))),
            )
            .on_result("j1", Ok(result(json!({"result": "Done"})))),
    );
    let sleeper = Arc::new(RecordingSleeper::default());
    let observer = Arc::new(RecordingObserver::default());
    let session = ChatSession::new(api.clone(), fast_options(sleeper))
        .with_observer(observer.clone());

    session.submit_query("grid battery storage").await;

    assert_eq!(
        bodies(&session),
        vec![
            "grid battery storage".to_string(),
            "Done\n\n[Thread ID: t1 / Run ID: r1]".to_string(),
        ]
    );
    assert!(!session.is_loading());
    assert_eq!(ScriptedApi::count(&api.start_calls), 1);

    let views = observer.views.lock().unwrap();
    assert!(views.iter().any(|view| view.loading));
    let last = views.last().unwrap();
    assert!(!last.loading);
    assert_eq!(last.answers().count(), 1);
}

#[tokio::test]
async fn final_answer_carries_references_of_last_snapshot() {
    let api = Arc::new(
        ScriptedApi::new()
            .on_start(Ok("j1".to_string()))
            .on_status(
                "j1",
                Ok(snapshot(json!({
                    "status": "completed",
                    "messages": [
                        {"id": "m1", "role": "user", "content": "q"},
                        {"id": "m2", "role": "assistant", "content": "draft",
                         "urls": ["https://example.com/a"]}
                    ]
                }))),
            )
            .on_result("j1", Ok(result(json!({"result": "Final"})))),
    );
    let session = ChatSession::new(api, fast_options(Arc::new(RecordingSleeper::default())));

    session.submit_query("q").await;

    let messages = session.messages();
    let last = messages.last().unwrap();
    assert_eq!(last.kind, MessageKind::Ai);
    assert_eq!(last.job_id, None);
    assert_eq!(
        last.references,
        vec![Reference::new("https://example.com/a", "https://example.com/a")]
    );
    assert!(messages.iter().all(|m| !m.is_progress()));
}

#[tokio::test]
async fn start_failure_shows_error_and_settles() {
    let api = Arc::new(ScriptedApi::new().on_start(Err(network_error("connection refused"))));
    let session = ChatSession::new(api.clone(), fast_options(Arc::new(RecordingSleeper::default())));

    session.submit_query("anything").await;

    assert_eq!(
        bodies(&session),
        vec![
            "anything".to_string(),
            "❌ Failed to start research: network error: connection refused".to_string(),
        ]
    );
    assert!(!session.is_loading());
    assert_eq!(ScriptedApi::count(&api.status_calls), 0);
}

#[tokio::test]
async fn blank_query_does_nothing() {
    let api = Arc::new(ScriptedApi::new());
    let session = ChatSession::new(api.clone(), fast_options(Arc::new(RecordingSleeper::default())));

    session.submit_query("   ").await;

    assert!(session.messages().is_empty());
    assert_eq!(ScriptedApi::count(&api.start_calls), 0);
}

#[tokio::test]
async fn restore_and_history_load_together_poll_once() {
    let listing = jobs(json!([
        {"id": "j0", "status": "completed", "thread_id": "t0", "query": "older question"},
        {"id": "j1", "status": "in_progress", "query": "current question"}
    ]));
    let api = Arc::new(
        ScriptedApi::new()
            .on_list(Ok(listing))
            .on_status("j1", Ok(snapshot(json!({"status": "in_progress"}))))
            .on_status("j1", Ok(snapshot(json!({"status": "completed"}))))
            .on_result("j1", Ok(result(json!({"result": "Restored answer"})))),
    );
    let observer = Arc::new(RecordingObserver::default());
    let session = ChatSession::new(api.clone(), fast_options(Arc::new(RecordingSleeper::default())))
        .with_observer(observer.clone());

    tokio::join!(session.restore_in_flight_job(), session.load_history());

    let restored = observer
        .views
        .lock()
        .unwrap()
        .iter()
        .find(|view| view.active_job.as_deref() == Some("j1"))
        .map(|view| view.messages.clone())
        .unwrap();
    assert_eq!(restored.len(), 1);
    assert!(restored[0].is_progress());

    assert_eq!(ScriptedApi::count(&api.list_calls), 2);
    assert_eq!(ScriptedApi::count(&api.status_calls), 2);
    assert_eq!(ScriptedApi::count(&api.result_calls), 1);
    assert_eq!(
        bodies(&session),
        vec!["Restored answer\n\n[Thread ID: - / Run ID: -]".to_string()]
    );
    let view = session.view();
    assert_eq!(view.history.len(), 1);
    assert_eq!(view.history[0].job_id, "j0");
    assert_eq!(
        session.job_context().map(|c| c.title().to_string()),
        Some("current question".to_string())
    );
}

#[tokio::test]
async fn restore_retries_then_succeeds() {
    let api = Arc::new(
        ScriptedApi::new()
            .on_list(Err(network_error("down")))
            .on_list(Err(network_error("down")))
            .on_list(Ok(Vec::new())),
    );
    let sleeper = Arc::new(RecordingSleeper::default());
    let session = ChatSession::new(api.clone(), fast_options(sleeper.clone()));

    session.restore_in_flight_job().await;

    assert_eq!(ScriptedApi::count(&api.list_calls), 3);
    assert_eq!(sleeper.naps(), vec![Duration::from_secs(2); 2]);
    assert!(session.messages().is_empty());
}

#[tokio::test]
async fn restore_gives_up_quietly() {
    let api = Arc::new(ScriptedApi::new().on_list(Err(network_error("down"))));
    let sleeper = Arc::new(RecordingSleeper::default());
    let mut options = fast_options(sleeper.clone());
    options.restore = RestoreSettings {
        retries: 3,
        delay: Duration::from_millis(50),
    };
    let session = ChatSession::new(api.clone(), options);

    session.restore_in_flight_job().await;

    assert_eq!(ScriptedApi::count(&api.list_calls), 4);
    assert_eq!(sleeper.naps().len(), 3);
    assert!(session.messages().is_empty());
    assert!(!session.is_loading());
}

#[tokio::test]
async fn selecting_history_rebuilds_thread_newest_first() {
    let api = Arc::new(
        ScriptedApi::new()
            .on_list(Ok(jobs(json!([
                {"id": "j0", "status": "completed", "thread_id": "t0", "query": "solar"}
            ]))))
            .on_status(
                "j0",
                Ok(snapshot(json!({
                    "status": "completed",
                    "messages": [
                        {"id": "m1", "role": "user", "content": "solar?"},
                        {"id": "m2", "role": "assistant", "content": "sunny"}
                    ]
                }))),
            ),
    );
    let session = ChatSession::new(api, fast_options(Arc::new(RecordingSleeper::default())));

    session.load_history().await;
    session.select_history("j0").await;

    assert_eq!(bodies(&session), vec!["sunny".to_string(), "solar?".to_string()]);
    assert_eq!(
        session.job_context().map(|c| c.title().to_string()),
        Some("solar".to_string())
    );
    assert!(!session.is_loading());
}

#[tokio::test]
async fn history_fetch_failure_shows_one_error() {
    let api = Arc::new(
        ScriptedApi::new()
            .on_list(Ok(jobs(json!([
                {"id": "j0", "status": "failed", "thread_id": "t0", "query": "wind"}
            ]))))
            .on_status("j0", Err(network_error("gone"))),
    );
    let session = ChatSession::new(api, fast_options(Arc::new(RecordingSleeper::default())));

    session.load_history().await;
    session.select_history("j0").await;

    let messages = session.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].is_error());
    assert!(!session.is_loading());
}

#[tokio::test]
async fn clear_empties_the_chat() {
    let api = Arc::new(
        ScriptedApi::new()
            .on_start(Ok("j1".to_string()))
            .on_status("j1", Ok(snapshot(json!({"status": "completed"}))))
            .on_result("j1", Ok(result(json!({"result": "Done"})))),
    );
    let session = ChatSession::new(api, fast_options(Arc::new(RecordingSleeper::default())));
    session.submit_query("q").await;

    session.clear();

    assert!(session.messages().is_empty());
    assert_eq!(session.job_context(), None);
}
