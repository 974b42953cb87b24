// src/metrics.rs
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder,
};
use std::net::ToSocketAddrs;
use std::thread;

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static FEED_BYTES: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("feed_bytes", "Bytes received from the market-data feed").expect("feed_bytes");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static FEED_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("feed_events", "Events decoded from the feed").expect("feed_events");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static FEED_SKIPPED: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("feed_frames_skipped", "Unknown or undersized frames skipped")
        .expect("feed_frames_skipped");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static FEED_DROPS: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("feed_drops", "Events dropped due to backpressure").expect("feed_drops");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static BOOK_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("book_events", "Events applied to the books").expect("book_events");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static ADDS_REJECTED: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("adds_rejected", "Add orders rejected (capacity, instrument, retired ref)")
        .expect("adds_rejected");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static SNAPSHOTS: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("snapshots_published", "Book snapshots handed to the pipeline")
        .expect("snapshots_published");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static CYCLES: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("pipeline_cycles", "Completed decision cycles").expect("pipeline_cycles");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static CYCLES_SKIPPED: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("pipeline_cycles_skipped", "Cycles skipped (warm-up, degeneracy, no allocation)")
        .expect("pipeline_cycles_skipped");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static BATCHES_SENT: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("batches_sent", "Outbound order batches written to the venue")
        .expect("batches_sent");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static LIVE_ORDERS: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new("book_live_orders", "Active orders across all instruments").expect("book_live_orders");
    REGISTRY.register(Box::new(g.clone())).ok();
    g
});

static PORTFOLIO_VALUE: Lazy<Gauge> = Lazy::new(|| {
    let g = Gauge::new("portfolio_value_dollars", "Portfolio value at the last completed cycle")
        .expect("portfolio_value_dollars");
    REGISTRY.register(Box::new(g.clone())).ok();
    g
});

static CYCLE_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    // Buckets in seconds: 1us .. 10ms
    let buckets = vec![1e-6, 2e-6, 5e-6, 1e-5, 2e-5, 5e-5, 1e-4, 2e-4, 5e-4, 1e-3, 1e-2];
    let h = Histogram::with_opts(
        HistogramOpts::new("cycle_latency_seconds", "Snapshot-to-batch pipeline latency").buckets(buckets),
    )
    .expect("cycle_latency");
    REGISTRY.register(Box::new(h.clone())).ok();
    h
});

pub fn inc_feed_bytes(n: usize) { FEED_BYTES.inc_by(n as u64); }
pub fn inc_feed_events(n: u64) { FEED_EVENTS.inc_by(n); }
pub fn inc_feed_skipped(n: u64) { FEED_SKIPPED.inc_by(n); }
pub fn inc_feed_drop() { FEED_DROPS.inc(); }

pub fn inc_book_events() { BOOK_EVENTS.inc(); }
pub fn inc_add_rejected() { ADDS_REJECTED.inc(); }
pub fn inc_snapshots() { SNAPSHOTS.inc(); }

pub fn inc_cycles() { CYCLES.inc(); }
pub fn inc_cycles_skipped() { CYCLES_SKIPPED.inc(); }
pub fn inc_batches_sent() { BATCHES_SENT.inc(); }

pub fn set_live_orders(n: usize) { LIVE_ORDERS.set(n as i64); }
pub fn set_portfolio_value(v: f64) { PORTFOLIO_VALUE.set(v); }

pub fn observe_cycle_ns(ns: u64) {
    CYCLE_LATENCY.observe(ns as f64 / 1_000_000_000.0);
}

pub fn spawn_http<A: ToSocketAddrs + Send + 'static>(addr: A) -> thread::JoinHandle<()> {
    let addr_string = addr
        .to_socket_addrs()
        .ok()
        .and_then(|mut it| it.next())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "0.0.0.0:9100".to_string());

    thread::spawn(move || {
        let server = tiny_http::Server::http(&addr_string).expect("start metrics http");
        log::info!("prometheus metrics listening on http://{addr_string}/metrics");
        let encoder = TextEncoder::new();
        loop {
            if let Ok(req) = server.recv() {
                if req.url() == "/metrics" {
                    let metric_families = REGISTRY.gather();
                    let mut buf = Vec::with_capacity(16 * 1024);
                    encoder.encode(&metric_families, &mut buf).ok();
                    let resp = tiny_http::Response::from_data(buf)
                        .with_status_code(200)
                        .with_header(
                            tiny_http::Header::from_bytes(
                                &b"Content-Type"[..],
                                &b"text/plain; version=0.0.4"[..],
                            )
                            .unwrap(),
                        );
                    let _ = req.respond(resp);
                } else {
                    let _ = req.respond(tiny_http::Response::empty(404));
                }
            }
        }
    })
}
