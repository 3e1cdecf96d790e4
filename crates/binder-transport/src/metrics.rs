use std::sync::atomic::{AtomicU64, Ordering};

use lazy_static::lazy_static;
use prometheus::{core::Collector, IntCounter, IntCounterVec, Registry};
use tracing::error;

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct BinderMetricsSnapshot {
    pub calls: u64,
    pub call_success: u64,
    pub call_failures: u64,
    pub events: u64,
}

static CALLS: AtomicU64 = AtomicU64::new(0);
static CALL_SUCCESS: AtomicU64 = AtomicU64::new(0);
static CALL_FAILURES: AtomicU64 = AtomicU64::new(0);
static EVENTS: AtomicU64 = AtomicU64::new(0);

lazy_static! {
    static ref BINDER_CALLS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("binder_calls_total", "Total binder calls issued"),
        &["api"]
    )
    .unwrap();
    static ref BINDER_CALL_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "binder_call_failures_total",
            "Total binder calls resolved as failures"
        ),
        &["api"]
    )
    .unwrap();
    static ref BINDER_EVENTS_TOTAL: IntCounter =
        IntCounter::new("binder_events_total", "Total pushed events rendered").unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register binder metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, BINDER_CALLS_TOTAL.clone());
    register(registry, BINDER_CALL_FAILURES_TOTAL.clone());
    register(registry, BINDER_EVENTS_TOTAL.clone());
}

/// Labelled by API namespace only; verbs are operator-typed and unbounded.
pub fn record_call(api: &str) {
    CALLS.fetch_add(1, Ordering::Relaxed);
    BINDER_CALLS_TOTAL.with_label_values(&[api]).inc();
}

pub fn record_call_success() {
    CALL_SUCCESS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_call_failure(api: &str) {
    CALL_FAILURES.fetch_add(1, Ordering::Relaxed);
    BINDER_CALL_FAILURES_TOTAL.with_label_values(&[api]).inc();
}

pub fn record_event() {
    EVENTS.fetch_add(1, Ordering::Relaxed);
    BINDER_EVENTS_TOTAL.inc();
}

pub fn snapshot() -> BinderMetricsSnapshot {
    BinderMetricsSnapshot {
        calls: CALLS.load(Ordering::Relaxed),
        call_success: CALL_SUCCESS.load(Ordering::Relaxed),
        call_failures: CALL_FAILURES.load(Ordering::Relaxed),
        events: EVENTS.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    CALLS.store(0, Ordering::Relaxed);
    CALL_SUCCESS.store(0, Ordering::Relaxed);
    CALL_FAILURES.store(0, Ordering::Relaxed);
    EVENTS.store(0, Ordering::Relaxed);
}
