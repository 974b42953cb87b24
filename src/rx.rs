// src/rx.rs
// Market-data ingest: one TCP connection to the feed, incremental framing,
// decoded events pushed onto the bounded queue feeding the book writer.
// Backpressure drops the event and counts it; the book never blocks the
// socket.

use crate::codec::{Event, StreamFramer};
use crate::metrics;
use crate::util::BarrierFlag;
use crossbeam::queue::ArrayQueue;
use log::{info, warn};
use std::io::Read;
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

pub fn rx_loop(
    endpoint: &str,
    reconnect: Duration,
    q_out: Arc<ArrayQueue<Event>>,
    shutdown: Arc<BarrierFlag>,
) -> anyhow::Result<()> {
    let mut events: Vec<Event> = Vec::with_capacity(1024);
    let mut buf = vec![0u8; 64 * 1024];

    while !shutdown.is_raised() {
        let mut stream = match TcpStream::connect(endpoint) {
            Ok(s) => s,
            Err(e) => {
                warn!("feed connect to {endpoint} failed: {e}; retrying");
                sleep_interruptible(reconnect, &shutdown);
                continue;
            }
        };
        stream.set_nodelay(true).ok();
        // short timeout so shutdown is noticed on a quiet feed
        stream
            .set_read_timeout(Some(Duration::from_millis(100)))
            .ok();
        info!("feed connected to {endpoint}");

        let mut framer = StreamFramer::new();
        loop {
            if shutdown.is_raised() {
                return Ok(());
            }
            match stream.read(&mut buf) {
                Ok(0) => {
                    info!("feed closed the connection; reconnecting");
                    break;
                }
                Ok(n) => {
                    metrics::inc_feed_bytes(n);
                    framer.extend(&buf[..n]);
                    events.clear();
                    let stats = framer.drain_into(&mut events);
                    metrics::inc_feed_events(stats.decoded as u64);
                    if stats.skipped > 0 {
                        metrics::inc_feed_skipped(stats.skipped as u64);
                    }
                    for ev in events.drain(..) {
                        if q_out.push(ev).is_err() {
                            metrics::inc_feed_drop();
                        }
                    }
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => {
                    warn!("feed read failed: {e}; reconnecting");
                    break;
                }
            }
        }
        sleep_interruptible(reconnect, &shutdown);
    }
    Ok(())
}

fn sleep_interruptible(total: Duration, shutdown: &BarrierFlag) {
    let step = Duration::from_millis(50);
    let mut slept = Duration::ZERO;
    while slept < total && !shutdown.is_raised() {
        std::thread::sleep(step);
        slept += step;
    }
}
