// src/net.rs
// Outbound side: a dedicated sender thread owning the TCP connection to the
// execution venue. Batches arrive fully framed and word-reversed; this layer
// only moves bytes and handles reconnection.

use crate::metrics;
use crate::util::BarrierFlag;
use crossbeam_channel::{Receiver, Sender};
use log::{info, warn};
use std::io::Write;
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub struct VenueSender {
    join: thread::JoinHandle<()>,
}

impl VenueSender {
    pub fn join(self) {
        let _ = self.join.join();
    }
}

pub fn spawn_venue_sender(
    endpoint: String,
    reconnect: Duration,
    capacity: usize,
    shutdown: Arc<BarrierFlag>,
) -> (Sender<Vec<u8>>, VenueSender) {
    let (tx, rx) = crossbeam_channel::bounded::<Vec<u8>>(capacity);
    let join = thread::Builder::new()
        .name("venue-tx".into())
        .spawn(move || run_sender(endpoint, reconnect, rx, shutdown))
        .expect("spawn venue sender");
    (tx, VenueSender { join })
}

fn run_sender(
    endpoint: String,
    reconnect: Duration,
    rx: Receiver<Vec<u8>>,
    shutdown: Arc<BarrierFlag>,
) {
    let mut conn: Option<TcpStream> = None;
    let mut last_attempt = std::time::Instant::now() - reconnect;

    while !shutdown.is_raised() {
        let batch = match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(b) => b,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        };

        if conn.is_none() && last_attempt.elapsed() >= reconnect {
            last_attempt = std::time::Instant::now();
            match TcpStream::connect(&endpoint) {
                Ok(s) => {
                    s.set_nodelay(true).ok();
                    info!("venue connected to {endpoint}");
                    conn = Some(s);
                }
                Err(e) => warn!("venue connect to {endpoint} failed: {e}"),
            }
        }

        match conn.as_mut() {
            Some(stream) => match stream.write_all(&batch).and_then(|_| stream.flush()) {
                Ok(()) => metrics::inc_batches_sent(),
                Err(e) => {
                    warn!("venue write failed: {e}; dropping batch and reconnecting");
                    conn = None;
                }
            },
            None => warn!("venue unavailable; batch of {} bytes dropped", batch.len()),
        }
    }
}
