use pretty_assertions::assert_eq;
use research_core::{
    DisplayMessage, MessageKind, ProgressContext, Reconciler, StatusSnapshot,
};
use serde_json::{json, Value};

fn snapshot(value: Value) -> StatusSnapshot {
    serde_json::from_value(value).unwrap()
}

fn steps(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| json!({"message": format!("step {i}"), "timestamp": 1704067200 + i}))
        .collect()
}

fn progress_count(log: &[DisplayMessage]) -> usize {
    log.iter().filter(|m| m.is_progress()).count()
}

#[test]
fn step_count_is_monotonic_and_matches_latest_length() {
    let mut reconciler = Reconciler::new();
    let mut log = Vec::new();

    for len in [1usize, 3, 3, 2, 5] {
        reconciler.apply("j1", &snapshot(json!({"status": "in_progress", "steps": steps(len)})), None, &mut log);
    }

    assert_eq!(reconciler.step_count(), 5);
    assert_eq!(progress_count(&log), 5);
    let texts: Vec<&str> = log.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(texts, vec!["step 0", "step 1", "step 2", "step 3", "step 4"]);
    assert_eq!(
        log[0].timestamp.as_deref(),
        Some("2024-01-01T00:00:00.000Z")
    );
}

#[test]
fn messages_with_same_id_are_shown_once() {
    let mut reconciler = Reconciler::new();
    let mut log = Vec::new();
    let first = snapshot(json!({
        "status": "in_progress",
        "messages": [{"id": "m1", "role": "assistant", "content": "hello"}]
    }));
    let second = snapshot(json!({
        "status": "in_progress",
        "messages": [
            {"id": "m1", "role": "assistant", "content": "hello again"},
            {"id": "m2", "role": "user", "content": "question"}
        ]
    }));

    reconciler.apply("j1", &first, None, &mut log);
    let report = reconciler.apply("j1", &second, None, &mut log);

    assert_eq!(report.messages_appended, 1);
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].body, "hello");
    assert_eq!(log[0].kind, MessageKind::Ai);
    assert_eq!(log[1].kind, MessageKind::User);
    assert_eq!(log[1].message_id.as_deref(), Some("m2"));
}

#[test]
fn id_less_records_are_appended_on_every_tick() {
    let mut reconciler = Reconciler::new();
    let mut log = Vec::new();
    let tick = snapshot(json!({"messages": [{"role": "assistant", "content": "anon"}]}));
    reconciler.apply("j1", &tick, None, &mut log);
    let report = reconciler.apply("j1", &tick, None, &mut log);

    assert_eq!(report.messages_appended, 1);
    assert_eq!(log.len(), 2);
    assert!(log.iter().all(|m| m.message_id.is_none()));
    assert_eq!(reconciler.shown_count(), 0);
}

#[test]
fn repeated_bodies_without_ids_are_all_kept() {
    let mut reconciler = Reconciler::new();
    let mut log = Vec::new();
    let tick = snapshot(json!({"messages": [
        {"role": "assistant", "content": "OK"},
        {"role": "user", "content": "next"},
        {"role": "assistant", "content": "OK"}
    ]}));
    reconciler.apply("j1", &tick, None, &mut log);

    let bodies: Vec<&str> = log.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, vec!["OK", "next", "OK"]);
}

#[test]
fn foreign_job_messages_are_dropped_but_progress_and_notices_stay() {
    let mut log = vec![
        DisplayMessage::ai("old answer", Some("j0".to_string())),
        DisplayMessage::user("my question", None),
        DisplayMessage::live_progress(ProgressContext::running(
            "j0".to_string(),
            Default::default(),
            None,
        )),
        DisplayMessage::error("earlier failure", None),
    ];
    let mut reconciler = Reconciler::new();
    let report = reconciler.apply(
        "j1",
        &snapshot(json!({"messages": [{"id": "n1", "content": "new"}]})),
        None,
        &mut log,
    );

    assert_eq!(report.messages_dropped, 1);
    let bodies: Vec<&str> = log.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(
        bodies,
        vec![
            "my question",
            "Deep research in progress...",
            "❌ earlier failure",
            "new"
        ]
    );
}

#[test]
fn missing_messages_leave_the_log_untouched() {
    let mut log = vec![DisplayMessage::ai("kept", Some("j0".to_string()))];
    let mut reconciler = Reconciler::new();
    let report = reconciler.apply("j1", &snapshot(json!({"status": "queued", "messages": null})), None, &mut log);
    assert_eq!(report.messages_dropped, 0);
    assert_eq!(log.len(), 1);
}

#[test]
fn assistant_messages_carry_citation_lookups() {
    let mut log = Vec::new();
    let mut reconciler = Reconciler::new();
    reconciler.apply(
        "j1",
        &snapshot(json!({"messages": [
            {"id": "u", "role": "user", "content": "q"},
            {"id": "a", "role": "assistant", "content": "See【1:0†src】",
             "annotations": [{"url": "https://src", "title": "Src"}]}
        ]})),
        None,
        &mut log,
    );

    assert!(log[0].citations.is_none());
    let html = log[1].render_html(None);
    assert!(html.contains(r#"href="https://src""#), "{html}");
    assert_eq!(reconciler.latest_annotations().len(), 1);
    assert!(reconciler.latest_references().is_empty());
}
