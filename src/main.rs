// src/main.rs
mod codec;
mod config;
mod covariance;
mod engine;
mod estimator;
mod fills;
mod ladder;
mod metrics;
mod net;
mod orderbook;
mod ordergen;
mod pipeline;
mod rx;
mod solver;
mod util;

use crate::config::{AppConfig, WeightingCfg};
use crate::engine::book_loop;
use crate::estimator::{PriceEstimator, Weighting};
use crate::orderbook::{BookEngine, BookSnapshot};
use crate::pipeline::{decide_loop, DecisionPipeline};
use crate::rx::rx_loop;
use crate::util::{pin_to_core_if_set, BarrierFlag};
use crossbeam::queue::ArrayQueue;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn weighting(cfg: WeightingCfg) -> Weighting {
    match cfg {
        WeightingCfg::Raw => Weighting::Raw,
        WeightingCfg::Scaled => Weighting::Scaled,
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let cfg = AppConfig::from_file(&cfg_path)?;
    info!("loaded config: {:?}", cfg);

    let shutdown = Arc::new(BarrierFlag::default());
    {
        let s = shutdown.clone();
        ctrlc::set_handler(move || {
            s.raise();
        })?;
    }

    // Metrics HTTP
    let _metrics_handle = cfg.metrics.as_ref().map(|m| metrics::spawn_http(m.bind.clone()));

    // Queues between stages
    let q_events = Arc::new(ArrayQueue::new(cfg.general.event_queue_capacity));
    let (snapshot_tx, snapshot_rx) =
        crossbeam_channel::bounded::<BookSnapshot>(cfg.pipeline.snapshot_queue_capacity);

    // Outbound path
    let (batch_tx, venue_handle) = net::spawn_venue_sender(
        cfg.venue.endpoint.clone(),
        Duration::from_millis(cfg.venue.reconnect_ms),
        cfg.venue.batch_queue_capacity,
        shutdown.clone(),
    );

    // Fills log (optional)
    let (fills_tx, fills_handle) = match &cfg.fills {
        Some(f) => {
            let (tx, handle) = fills::spawn(PathBuf::from(&f.path));
            (Some(tx), Some(handle))
        }
        None => (None, None),
    };

    // Book state and pipeline
    let engine = BookEngine::new(
        &cfg.instruments,
        cfg.book.registry_capacity,
        cfg.book.publish_threshold,
    );
    let pipeline = DecisionPipeline::new(
        PriceEstimator::new(weighting(cfg.pipeline.sizing_weighting)),
        PriceEstimator::new(weighting(cfg.pipeline.wire_weighting)),
        cfg.instruments.len(),
        cfg.instruments.iter().map(|i| i.padded_symbol()).collect(),
        cfg.pipeline.initial_cash,
    );

    // RX thread
    let rx_shutdown = shutdown.clone();
    let rx_queue = q_events.clone();
    let feed_endpoint = cfg.feed.endpoint.clone();
    let feed_reconnect = Duration::from_millis(cfg.feed.reconnect_ms);
    let rx_core = cfg.cpu.rx_core;
    let t_rx = thread::Builder::new().name("rx".into()).spawn(move || {
        pin_to_core_if_set(rx_core);
        if let Err(e) = rx_loop(&feed_endpoint, feed_reconnect, rx_queue, rx_shutdown) {
            error!("rx failed: {e:?}");
        }
    })?;

    // Book thread (sole writer of book state)
    let book_shutdown = shutdown.clone();
    let book_core = cfg.cpu.book_core;
    let spin_loops = cfg.general.spin_loops_per_yield;
    let t_book = thread::Builder::new().name("book".into()).spawn(move || {
        pin_to_core_if_set(book_core);
        if let Err(e) = book_loop(q_events, engine, snapshot_tx, book_shutdown, spin_loops) {
            error!("book failed: {e:?}");
        }
    })?;

    // Decision thread
    let decide_shutdown = shutdown.clone();
    let decide_core = cfg.cpu.decide_core;
    let t_decide = thread::Builder::new().name("decide".into()).spawn(move || {
        pin_to_core_if_set(decide_core);
        if let Err(e) = decide_loop(snapshot_rx, batch_tx, fills_tx, pipeline, decide_shutdown) {
            error!("decide failed: {e:?}");
        }
    })?;

    // Join (log panics explicitly to aid diagnosis in production)
    if t_rx.join().is_err() { error!("rx thread panicked"); }
    if t_book.join().is_err() { error!("book thread panicked"); }
    if t_decide.join().is_err() { error!("decide thread panicked"); }
    venue_handle.join();
    if let Some(h) = fills_handle { h.join(); }
    info!("clean shutdown");
    Ok(())
}
