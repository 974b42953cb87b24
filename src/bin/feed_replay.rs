// src/bin/feed_replay.rs
// Serve a recorded event file over TCP with the live feed's framing:
// [u16 BE length][record], repeated. One client at a time; useful for
// bring-up and demos against a captured or generated stream.

use std::fs::File;
use std::io::{Read, Write};
use std::net::TcpListener;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("usage: feed_replay <event_file> <bind_addr> [msgs_per_sec]");
        std::process::exit(2);
    }
    let path = &args[1];
    let bind = &args[2];
    let mps: u64 = if args.len() > 3 { args[3].parse()? } else { 0 };
    let nanos_per_msg = if mps == 0 { 0 } else { 1_000_000_000u64 / mps };

    let mut data = Vec::new();
    File::open(path)?.read_to_end(&mut data)?;
    log::info!("loaded {} bytes from {path}", data.len());

    let listener = TcpListener::bind(bind)?;
    log::info!("listening on {bind}");

    loop {
        let (mut conn, addr) = listener.accept()?;
        conn.set_nodelay(true).ok();
        log::info!("client connected: {addr}");

        let mut off = 0usize;
        let mut sent = 0u64;
        while off + 2 <= data.len() {
            let len = u16::from_be_bytes([data[off], data[off + 1]]) as usize;
            if off + 2 + len > data.len() {
                log::warn!("truncated record at offset {off}; stopping");
                break;
            }
            let frame = &data[off..off + 2 + len];
            if let Err(e) = conn.write_all(frame) {
                log::info!("client went away after {sent} messages: {e}");
                break;
            }
            off += 2 + len;
            sent += 1;
            if nanos_per_msg > 0 {
                std::thread::sleep(std::time::Duration::from_nanos(nanos_per_msg));
            }
        }
        log::info!("replay finished: {sent} messages");
    }
}
