// src/engine.rs
// The book writer: the single thread allowed to mutate book state. Events
// are applied in strict arrival order; snapshots are taken here so they are
// consistent across all instruments and both sides.

use crate::codec::Event;
use crate::metrics;
use crate::orderbook::{AddReject, BookEngine, BookSnapshot};
use crate::util::{adaptive_wait, BarrierFlag};
use crossbeam::queue::ArrayQueue;
use crossbeam_channel::Sender;
use log::{debug, info, warn};
use std::sync::Arc;

pub fn book_loop(
    q_in: Arc<ArrayQueue<Event>>,
    mut engine: BookEngine,
    snapshot_tx: Sender<BookSnapshot>,
    shutdown: Arc<BarrierFlag>,
    spin_loops_per_yield: u32,
) -> anyhow::Result<()> {
    let mut processed: u64 = 0;
    let mut published: u64 = 0;
    let mut idle_iters: u32 = 0;

    while !shutdown.is_raised() {
        if let Some(ev) = q_in.pop() {
            processed += 1;
            metrics::inc_book_events();

            let applied = engine.apply(&ev);
            if let Some(reject) = applied.add_rejected {
                metrics::inc_add_rejected();
                match reject {
                    AddReject::Capacity => warn!("add rejected: order ref beyond registry capacity"),
                    AddReject::UnknownInstrument => debug!("add rejected: unknown instrument"),
                    AddReject::RetiredRef => debug!("add rejected: retired order ref"),
                }
            }

            if applied.snapshot_due {
                let snap = engine.snapshot();
                published += 1;
                metrics::inc_snapshots();
                metrics::set_live_orders(engine.registry().active_count());
                if snapshot_tx.try_send(snap).is_err() {
                    warn!("snapshot dropped: pipeline is behind");
                }
                info!(
                    "events={} snapshots={} live_orders={}",
                    processed,
                    published,
                    engine.registry().active_count()
                );
            }
        } else {
            adaptive_wait(&mut idle_iters, spin_loops_per_yield);
        }
    }
    Ok(())
}
