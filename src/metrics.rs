use anyhow::{Context, Result};
use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::time::Duration;

use crate::todos::{ResolvedByAction, TodoAction};

/// Metric name prefix for all to-do engine metrics
const PREFIX: &str = "todo_engine";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref TODOS_CREATED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_todos_created_total"), "To-dos created, by action"),
        &["action"]
    ).expect("Failed to create todos_created_total metric");

    pub static ref TODOS_RESOLVED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_todos_resolved_total"), "To-dos marked done, by mechanism"),
        &["resolved_by"]
    ).expect("Failed to create todos_resolved_total metric");

    pub static ref TODOS_RESTORED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_todos_restored_total"), "Done to-dos restored to pending"),
        &["source"]
    ).expect("Failed to create todos_restored_total metric");

    pub static ref EVENTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_events_total"), "Events handled, by kind and result"),
        &["event", "status"]
    ).expect("Failed to create events_total metric");

    pub static ref EVENT_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_event_duration_seconds"),
            "Time spent classifying and persisting one event"
        )
        .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        &["event"]
    ).expect("Failed to create event_duration_seconds metric");
}

/// Registers every metric. Safe to call more than once.
pub fn init_metrics() {
    let _ = REGISTRY.register(Box::new(TODOS_CREATED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(TODOS_RESOLVED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(TODOS_RESTORED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(EVENTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(EVENT_DURATION_SECONDS.clone()));
}

pub fn record_todo_created(action: TodoAction) {
    TODOS_CREATED_TOTAL
        .with_label_values(&[action.as_str()])
        .inc();
}

pub fn record_todos_resolved(resolved_by: ResolvedByAction, count: usize) {
    if count > 0 {
        TODOS_RESOLVED_TOTAL
            .with_label_values(&[resolved_by.as_str()])
            .inc_by(count as f64);
    }
}

pub fn record_todos_restored(source: &str, count: usize) {
    if count > 0 {
        TODOS_RESTORED_TOTAL
            .with_label_values(&[source])
            .inc_by(count as f64);
    }
}

pub fn record_event(event: &str, success: bool, duration: Duration) {
    let status = if success { "ok" } else { "error" };
    EVENTS_TOTAL.with_label_values(&[event, status]).inc();
    EVENT_DURATION_SECONDS
        .with_label_values(&[event])
        .observe(duration.as_secs_f64());
}

/// Prometheus text exposition of the registry.
pub fn encode_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics output is not UTF-8")
}
