//! Call and event counters recorded by page sessions.

use std::sync::Arc;

use binder_console::{metrics, MemorySurface, PageProfile, PageSession, PageVariant, PushEvent, ScriptedBinder};
use prometheus::Registry;
use serde_json::json;
use serial_test::serial;
use tokio::time::{sleep, Duration};

#[tokio::test]
#[serial]
async fn sessions_count_calls_failures_and_events() -> anyhow::Result<()> {
    metrics::reset();
    let binder = ScriptedBinder::new();
    binder.reply("alsacore", "ping", json!("pong"));
    let profile = PageProfile::from_address("http://localhost:1234/", PageVariant::Audio);
    let session = PageSession::new(profile, Arc::new(binder.clone()), Arc::new(MemorySurface::new()));
    session.connect().await?;

    session.call_binder("alsacore", "ping", json!({})).await?;
    session.call_binder("alsacore", "missing", json!({})).await?;
    binder.push(PushEvent::new("alsacore/ping", json!(1))).await;
    while session.renderer().next_event_index() == 0 {
        sleep(Duration::from_millis(5)).await;
    }

    let snapshot = metrics::snapshot();
    assert_eq!(snapshot.calls, 2);
    assert_eq!(snapshot.call_success, 1);
    assert_eq!(snapshot.call_failures, 1);
    assert_eq!(snapshot.events, 1);
    Ok(())
}

#[test]
#[serial]
fn counters_register_with_prometheus() {
    let registry = Registry::new();
    metrics::register_metrics(&registry);
    metrics::record_call("UNICENS");
    let names: Vec<String> = registry
        .gather()
        .iter()
        .map(|family| family.get_name().to_string())
        .collect();
    assert!(names.iter().any(|name| name == "binder_calls_total"));
}
