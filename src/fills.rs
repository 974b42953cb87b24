// src/fills.rs
// Append-only fills log for the monitoring consumer. One CSV row per emitted
// order leg; writes happen on a dedicated thread so the decision loop never
// touches the filesystem.

use crossbeam_channel::{Receiver, Sender};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::thread;

pub const CSV_HEADER: &str = "Timestamp,Portfolio,Symbol,Side,Quantity,Price";

#[derive(Debug, Clone)]
pub struct FillRow {
    pub timestamp: f64,
    pub portfolio_value: f64,
    pub symbol: String,
    pub side: char,
    pub quantity: u64,
    pub price: f64,
}

impl FillRow {
    pub fn to_csv(&self) -> String {
        format!(
            "{:.6},{:.4},{},{},{},{:.4}",
            self.timestamp, self.portfolio_value, self.symbol, self.side, self.quantity, self.price
        )
    }
}

pub struct FillsWriter {
    join: thread::JoinHandle<()>,
}

impl FillsWriter {
    pub fn join(self) {
        let _ = self.join.join();
    }
}

pub fn spawn(path: PathBuf) -> (Sender<Vec<FillRow>>, FillsWriter) {
    let (tx, rx) = crossbeam_channel::bounded::<Vec<FillRow>>(64);
    let join = thread::Builder::new()
        .name("fills-writer".into())
        .spawn(move || run_writer(path, rx))
        .expect("spawn fills writer");
    (tx, FillsWriter { join })
}

fn run_writer(path: PathBuf, rx: Receiver<Vec<FillRow>>) {
    log::info!("fills writer started -> {:?}", path);
    let mut file = match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(f) => f,
        Err(e) => {
            log::error!("cannot open fills log {:?}: {e}", path);
            // drain silently so senders never block on a dead writer
            while rx.recv().is_ok() {}
            return;
        }
    };

    let empty = file.metadata().map(|m| m.len() == 0).unwrap_or(false);
    if empty {
        let _ = writeln!(file, "{CSV_HEADER}");
    }

    while let Ok(rows) = rx.recv() {
        for row in &rows {
            if let Err(e) = writeln!(file, "{}", row.to_csv()) {
                log::error!("fills write failed: {e}");
            }
        }
        let _ = file.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_formats_like_the_consumer_expects() {
        let row = FillRow {
            timestamp: 1_700_000_000.25,
            portfolio_value: 10_000.0,
            symbol: "AMD_".into(),
            side: 'B',
            quantity: 16,
            price: 150.0,
        };
        assert_eq!(row.to_csv(), "1700000000.250000,10000.0000,AMD_,B,16,150.0000");
    }
}
