use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, TextEncoder};

static ACTIVE_CONNECTIONS: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::new(
        "chat_fanout_active_connections",
        "WebSocket connections currently open",
    )
    .expect("failed to create chat_fanout_active_connections");
    prometheus::default_registry()
        .register(Box::new(gauge.clone()))
        .expect("failed to register chat_fanout_active_connections");
    gauge
});

static JOINS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("chat_fanout_joins_total", "Room join attempts by outcome"),
        &["outcome"],
    )
    .expect("failed to create chat_fanout_joins_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register chat_fanout_joins_total");
    counter
});

static MESSAGES_PERSISTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "chat_fanout_messages_persisted_total",
        "Messages written through the ingest pipeline",
    )
    .expect("failed to create chat_fanout_messages_persisted_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register chat_fanout_messages_persisted_total");
    counter
});

static DELIVERIES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "chat_fanout_deliveries_total",
        "Messages handed to joined connections",
    )
    .expect("failed to create chat_fanout_deliveries_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register chat_fanout_deliveries_total");
    counter
});

static DROPPED_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "chat_fanout_dropped_events_total",
            "Inbound events dropped without fanout, by reason",
        ),
        &["reason"],
    )
    .expect("failed to create chat_fanout_dropped_events_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register chat_fanout_dropped_events_total");
    counter
});

pub fn connection_opened() {
    ACTIVE_CONNECTIONS.inc();
}

pub fn connection_closed() {
    ACTIVE_CONNECTIONS.dec();
}

pub fn join_attempt(accepted: bool) {
    let outcome = if accepted { "accepted" } else { "rejected" };
    JOINS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn message_fanned_out(deliveries: usize) {
    MESSAGES_PERSISTED_TOTAL.inc();
    DELIVERIES_TOTAL.inc_by(deliveries as u64);
}

pub fn event_dropped(reason: &str) {
    DROPPED_EVENTS_TOTAL.with_label_values(&[reason]).inc();
}

/// GET /metrics
pub async fn metrics_handler() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
