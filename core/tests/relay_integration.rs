//! End-to-end relay tests against throwaway shell-script engines.
//!
//! Each test writes a small script standing in for the engine CLI and points
//! the launcher at it via `bin = /bin/sh`, so the full spawn/drain/exit path
//! runs against a real child process.
#![cfg(unix)]

use std::time::{Duration, Instant};

use procrelay_core::config::EngineConfig;
use procrelay_core::error::RelayError;
use procrelay_core::relay::{relay_query, BufferSink, ChannelSink};
use procrelay_core::request::QueryRequest;
use procrelay_core::skills::list_skills;
use procrelay_core::sync::{run_sync_query, SyncReply};
use tempfile::TempDir;
use tokio::sync::mpsc;

fn engine_with_script(script: &str) -> (EngineConfig, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.sh");
    std::fs::write(&path, script).unwrap();
    let cfg = EngineConfig {
        bin: "/bin/sh".into(),
        entry: path.to_string_lossy().into_owned(),
        default_timeout_secs: 120,
    };
    (cfg, dir)
}

#[tokio::test]
async fn forwards_events_in_order_and_injects_user_id() {
    let (cfg, _dir) = engine_with_script(
        r#"
echo '{"type":"start"}'
echo '{"type":"progress","step":"lookup"}'
echo '{"type":"result","text":"Chiefs"}'
"#,
    );
    let req = QueryRequest::new("Who won the Super Bowl?");
    let mut sink = BufferSink::new();
    let outcome = relay_query(&cfg, &req, &mut sink).await.unwrap();

    assert_eq!(outcome.exit_code, 0);
    assert!(!outcome.error_event_seen);

    let events = sink.into_events();
    let kinds: Vec<&str> = events.iter().map(|e| e.kind.as_str()).collect();
    assert_eq!(kinds, vec!["start", "progress", "result"]);
    for ev in &events {
        assert_eq!(
            ev.fields.get("user_id"),
            Some(&serde_json::json!("api-anonymous"))
        );
    }
}

#[tokio::test]
async fn malformed_and_non_object_lines_become_debug_events() {
    let (cfg, _dir) = engine_with_script(
        r#"
echo '{"type":"start"}'
echo 'garbage line'
echo '42'
echo ''
echo '{"type":"result","text":"ok"}'
"#,
    );
    let req = QueryRequest::new("q");
    let mut sink = BufferSink::new();
    relay_query(&cfg, &req, &mut sink).await.unwrap();

    let kinds: Vec<String> = sink.into_events().iter().map(|e| e.kind.clone()).collect();
    // Empty line produced no event; the two bad lines were wrapped.
    assert_eq!(kinds, vec!["start", "debug", "debug", "result"]);
}

#[tokio::test]
async fn final_unterminated_line_is_still_emitted() {
    let (cfg, _dir) = engine_with_script(r#"printf '{"type":"result","text":"partial"}'"#);
    let req = QueryRequest::new("q");
    let mut sink = BufferSink::new();
    relay_query(&cfg, &req, &mut sink).await.unwrap();

    let events = sink.into_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, "result");
    assert_eq!(events[0].text(), Some("partial"));
}

#[tokio::test]
async fn nonzero_exit_synthesizes_exactly_one_error_event() {
    let (cfg, _dir) = engine_with_script(
        r#"
echo '{"type":"start"}'
echo 'model unreachable' >&2
exit 1
"#,
    );
    let req = QueryRequest::new("q");
    let mut sink = BufferSink::new();
    let outcome = relay_query(&cfg, &req, &mut sink).await.unwrap();

    assert_eq!(outcome.exit_code, 1);
    assert!(outcome.error_event_seen);

    let events = sink.into_events();
    assert_eq!(events.len(), 2);
    let err = &events[1];
    assert!(err.is_error());
    assert_eq!(err.error_message(), Some("model unreachable"));
    assert_eq!(err.returncode(), Some(1));
}

#[tokio::test]
async fn nonzero_exit_with_empty_stderr_uses_generic_message() {
    let (cfg, _dir) = engine_with_script("exit 9");
    let req = QueryRequest::new("q");
    let mut sink = BufferSink::new();
    relay_query(&cfg, &req, &mut sink).await.unwrap();

    let events = sink.into_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].error_message(), Some("Exit code 9"));
}

#[tokio::test]
async fn engine_error_event_suppresses_the_synthesized_duplicate() {
    let (cfg, _dir) = engine_with_script(
        r#"
echo '{"type":"error","error":"rate limited"}'
exit 1
"#,
    );
    let req = QueryRequest::new("q");
    let mut sink = BufferSink::new();
    relay_query(&cfg, &req, &mut sink).await.unwrap();

    let events = sink.into_events();
    // No second terminal error appended.
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].error_message(), Some("rate limited"));
}

#[tokio::test]
async fn timeout_kills_the_child_and_returns_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("still-alive");
    let script = format!(
        "echo '{{\"type\":\"start\"}}'\nsleep 2\ntouch {}\n",
        marker.display()
    );
    let path = dir.path().join("engine.sh");
    std::fs::write(&path, script).unwrap();
    let cfg = EngineConfig {
        bin: "/bin/sh".into(),
        entry: path.to_string_lossy().into_owned(),
        default_timeout_secs: 120,
    };

    let mut req = QueryRequest::new("q");
    req.timeout = Some(1);

    let started = Instant::now();
    let mut sink = BufferSink::new();
    let err = relay_query(&cfg, &req, &mut sink).await.unwrap_err();

    assert!(matches!(err, RelayError::Timeout { secs: 1 }));
    assert_eq!(err.to_string(), "Query timed out after 1s");
    assert!(started.elapsed() < Duration::from_secs(2));

    // Had the child survived the kill it would touch the marker shortly.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(!marker.exists(), "engine process was not killed on timeout");
}

#[tokio::test]
async fn sink_disconnect_kills_the_child_silently() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("still-alive");
    let script = format!(
        concat!(
            "echo '{{\"type\":\"start\"}}'\n",
            "echo '{{\"type\":\"progress\"}}'\n",
            "sleep 2\n",
            "touch {}\n",
            "echo '{{\"type\":\"result\",\"text\":\"late\"}}'\n",
        ),
        marker.display()
    );
    let path = dir.path().join("engine.sh");
    std::fs::write(&path, script).unwrap();
    let cfg = EngineConfig {
        bin: "/bin/sh".into(),
        entry: path.to_string_lossy().into_owned(),
        default_timeout_secs: 120,
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let req = QueryRequest::new("q");
    let relay = tokio::spawn(async move {
        let mut sink = ChannelSink::new(tx);
        relay_query(&cfg, &req, &mut sink).await
    });

    // Consume the first two events, then walk away mid-stream.
    assert!(rx.recv().await.is_some());
    assert!(rx.recv().await.is_some());
    drop(rx);

    let started = Instant::now();
    let err = relay.await.unwrap().unwrap_err();
    assert!(matches!(err, RelayError::Disconnected));
    assert!(started.elapsed() < Duration::from_secs(2));

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(!marker.exists(), "engine process survived the disconnect");
}

#[tokio::test]
async fn absurd_request_timeout_does_not_panic_the_relay() {
    let (cfg, _dir) = engine_with_script(r#"echo '{"type":"result","text":"ok"}'"#);
    let mut req = QueryRequest::new("q");
    req.timeout = Some(u64::MAX);

    let mut sink = BufferSink::new();
    let outcome = relay_query(&cfg, &req, &mut sink).await.unwrap();
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(sink.into_events()[0].text(), Some("ok"));
}

#[tokio::test]
async fn launch_failure_surfaces_as_spawn_error() {
    let cfg = EngineConfig {
        bin: "/nonexistent/engine-bin".into(),
        entry: "index.js".into(),
        default_timeout_secs: 120,
    };
    let mut sink = BufferSink::new();
    let err = relay_query(&cfg, &QueryRequest::new("q"), &mut sink)
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Spawn { .. }));
}

// Scenario coverage for the buffered responder.

#[tokio::test]
async fn sync_success_takes_last_result_text() {
    let (cfg, _dir) = engine_with_script(
        r#"
echo '{"type":"start"}'
echo '{"type":"result","text":"Chiefs"}'
"#,
    );
    let report = run_sync_query(&cfg, &QueryRequest::new("Who won the Super Bowl?"))
        .await
        .unwrap();

    assert_eq!(report.user_id, "api-anonymous");
    assert_eq!(
        report.reply,
        SyncReply::Success {
            text: "Chiefs".into()
        }
    );
}

#[tokio::test]
async fn sync_nonzero_exit_reports_stderr_and_returncode() {
    let (cfg, _dir) = engine_with_script(
        r#"
echo 'model unreachable' >&2
exit 1
"#,
    );
    let report = run_sync_query(&cfg, &QueryRequest::new("q")).await.unwrap();

    assert_eq!(
        report.reply,
        SyncReply::Failure {
            error: "model unreachable".into(),
            returncode: Some(1),
            stdout: None,
        }
    );
}

#[tokio::test]
async fn sync_timeout_discards_partial_events() {
    let (cfg, _dir) = engine_with_script(
        r#"
echo '{"type":"start"}'
sleep 30
"#,
    );
    let mut req = QueryRequest::new("q");
    req.timeout = Some(1);

    let started = Instant::now();
    let report = run_sync_query(&cfg, &req).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(report.reply, SyncReply::Timeout { secs: 1 });
}

#[tokio::test]
async fn sync_plain_text_engine_falls_back_to_raw_stdout() {
    // Bare text lines are wrapped as debug events; the reduction sees
    // neither result nor error and falls back to raw stdout.
    let (cfg, _dir) = engine_with_script("echo 'just words'");
    let report = run_sync_query(&cfg, &QueryRequest::new("q")).await.unwrap();
    assert_eq!(
        report.reply,
        SyncReply::Success {
            text: "just words".into()
        }
    );
}

#[tokio::test]
async fn skills_list_parses_dashed_names() {
    let (cfg, _dir) = engine_with_script(
        r#"
echo 'Installed skills:'
echo '- nfl'
echo '- nba'
"#,
    );
    let skills = list_skills(&cfg).await.unwrap();
    assert_eq!(skills, vec!["nfl".to_string(), "nba".to_string()]);
}

#[tokio::test]
async fn skills_list_is_not_stalled_by_noisy_stderr() {
    // Well past the OS pipe buffer, so an undrained captured stderr would
    // block the child before it ever printed the names.
    let (cfg, _dir) = engine_with_script(
        r#"
i=0
while [ $i -lt 3000 ]; do
  echo 'diagnostic chatter from the engine that nobody asked for, repeated' >&2
  i=$((i+1))
done
echo '- nfl'
"#,
    );
    let started = Instant::now();
    let skills = list_skills(&cfg).await.unwrap();
    assert_eq!(skills, vec!["nfl".to_string()]);
    assert!(started.elapsed() < Duration::from_secs(5));
}
